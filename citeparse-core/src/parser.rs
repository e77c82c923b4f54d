//! # Parser de Citações: Orquestrador com Eventos Observáveis
//!
//! Coordena todos os módulos (tokenizador, features, CRF/Viterbi, montagem,
//! normalização) e, no modo streaming, emite eventos em cada passo via um
//! canal Rust (`mpsc`).
//!
//! ## Fluxo
//!
//! ```text
//! string → tokens → linhas de features → labels (CRF) → campos → normalização → Citation
//! ```
//!
//! ## Concorrência
//!
//! O modelo, o dicionário e as tabelas de referência são imutáveis e
//! compartilhados via `Arc`. Em lote ([`CitationParser::parse_batch`]) cada
//! worker do rayon cria a própria sessão [`CrfTagger`] e cada citação tem o
//! próprio cache de features.

use std::io::{BufRead, Write};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::{assemble_fields, FieldMap};
use crate::citation::Citation;
use crate::config::{load_config, ParserSettings};
use crate::crf::{CrfModel, CrfTagger};
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::normalizer::Normalizer;
use crate::preprocessor::{normalize_cite_text, segment_citations, SegmentedCitation};
use crate::referent::{classify, ReferenceTables, Referent};
use crate::sequence::FeatureSequenceBuilder;
use crate::tagger::{tag_sequence, Label, SequenceTagger, TaggedToken};
use crate::tokenizer::Token;

/// Eventos emitidos durante o processamento de uma citação.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ParseEvent {
    /// **Passo 1**: Tokenização concluída.
    TokenizationDone { tokens: Vec<Token>, total: usize },
    /// **Passo 2**: Features de um token, na ordem configurada.
    FeaturesComputed {
        token_index: usize,
        token_text: String,
        features: Vec<(String, String)>,
    },
    /// **Passo 3**: Label atribuído a um token.
    TagAssigned {
        token_index: usize,
        token_text: String,
        label: Label,
        confidence: f64,
    },
    /// **Passo 4**: Trechos por label, antes da normalização.
    FieldsAssembled { fields: FieldMap },
    /// **Conclusão**: campos normalizados e estatísticas.
    Done {
        fields: FieldMap,
        tagged_tokens: Vec<TaggedToken>,
        total_tokens: usize,
        processing_ms: u64,
    },
    /// **Falha**: erro irrecuperável nesta citação.
    Error { message: String },
}

/// O parser principal.
pub struct CitationParser {
    builder: FeatureSequenceBuilder,
    model: Arc<CrfModel>,
    normalizer: Normalizer,
    tables: Arc<ReferenceTables>,
}

impl CitationParser {
    /// Monta o parser; o modelo precisa conhecer exatamente as features do builder.
    ///
    /// Só a ordem de features é conferida: o alfabeto de labels é o do próprio
    /// modelo. Para exigir um conjunto de labels use [`from_settings`](Self::from_settings).
    pub fn new(model: CrfModel, builder: FeatureSequenceBuilder) -> Result<Self> {
        model.validate_features(&builder.order().names())?;
        Ok(Self {
            builder,
            model: Arc::new(model),
            normalizer: Normalizer::new(),
            tables: Arc::new(ReferenceTables::builtin()),
        })
    }

    /// Carrega dicionário, tabelas e modelo conforme a configuração validada.
    pub fn from_settings(settings: &ParserSettings) -> Result<Self> {
        let dictionary = match &settings.dictionary_path {
            Some(path) => Dictionary::from_path(path)?,
            None => Dictionary::builtin(),
        };
        let tables = ReferenceTables::from_paths(
            settings.journal_abbreviations_path.as_deref(),
            settings.country_codes_path.as_deref(),
        )?;
        let model = CrfModel::load(&settings.model_path)?;
        model.validate(&settings.labels, &settings.feature_order.names())?;

        info!(
            model = %settings.model_path.display(),
            features = settings.feature_order.len(),
            dictionary = dictionary.len(),
            "parser de citações pronto"
        );

        let builder = FeatureSequenceBuilder::new(settings.feature_order.clone(), Arc::new(dictionary));
        Ok(Self {
            builder,
            model: Arc::new(model),
            normalizer: Normalizer::new(),
            tables: Arc::new(tables),
        })
    }

    /// Cascata de arquivos TOML → settings → parser.
    pub fn from_config() -> Result<Self> {
        let settings = load_config()?.resolve()?;
        Self::from_settings(&settings)
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_tables(mut self, tables: ReferenceTables) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn builder(&self) -> &FeatureSequenceBuilder {
        &self.builder
    }

    pub fn model(&self) -> &CrfModel {
        &self.model
    }

    /// Nova sessão de tagging sobre o modelo compartilhado.
    pub fn tagger(&self) -> CrfTagger {
        CrfTagger::new(Arc::clone(&self.model))
    }

    /// Campos normalizados de uma citação.
    pub fn parse_string(&self, text: &str) -> Result<FieldMap> {
        let mut tagger = self.tagger();
        self.parse_with(&mut tagger, text)
    }

    /// Como [`parse_string`](Self::parse_string), reaproveitando uma sessão.
    pub fn parse_with<T: SequenceTagger + ?Sized>(&self, tagger: &mut T, text: &str) -> Result<FieldMap> {
        self.run(tagger, text, None).map(|(fields, _)| fields)
    }

    pub fn parse_citation(&self, text: &str) -> Result<Citation> {
        self.parse_string(text).map(|fields| Citation::from_fields(&fields))
    }

    /// Tipo de obra e metadados da citação.
    pub fn classify(&self, citation: &Citation) -> Referent {
        classify(citation, &self.tables)
    }

    /// Processa uma citação enviando eventos de progresso pelo canal.
    ///
    /// # Fluxo de Eventos
    /// 1. `TokenizationDone`
    /// 2. `FeaturesComputed` (um por token)
    /// 3. `TagAssigned` (um por token)
    /// 4. `FieldsAssembled`
    /// 5. `Done` ou `Error`
    pub fn parse_streaming(&self, text: &str, tx: mpsc::Sender<ParseEvent>) {
        let start = Instant::now();
        let mut tagger = self.tagger();
        match self.run(&mut tagger, text, Some(&tx)) {
            Ok((fields, tagged_tokens)) => {
                let _ = tx.send(ParseEvent::Done {
                    fields,
                    total_tokens: tagged_tokens.len(),
                    tagged_tokens,
                    processing_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(e) => {
                warn!(error = %e, "falha ao processar citação");
                let _ = tx.send(ParseEvent::Error { message: e.to_string() });
            }
        }
    }

    /// Processa várias citações em paralelo, preservando a ordem.
    pub fn parse_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Result<Citation>> {
        let start = Instant::now();
        let results: Vec<Result<Citation>> = texts
            .par_iter()
            .map_init(
                || self.tagger(),
                |tagger, text| {
                    self.parse_with(tagger, text.as_ref())
                        .map(|fields| Citation::from_fields(&fields))
                },
            )
            .collect();
        info!(
            citations = results.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lote processado"
        );
        results
    }

    /// Segmenta uma seção de referências e processa cada citação, levando o marcador.
    pub fn parse_reference_section(&self, section: &str) -> Vec<Result<Citation>> {
        let segments: Vec<SegmentedCitation> = segment_citations(&normalize_cite_text(section));
        segments
            .par_iter()
            .map_init(
                || self.tagger(),
                |tagger, segment| {
                    let fields = self.parse_with(tagger, &segment.text)?;
                    let citation = Citation::from_fields(&fields);
                    Ok(match (segment.marker_type, &segment.marker) {
                        (Some(marker_type), Some(marker)) => citation.with_marker(marker_type, marker.as_str()),
                        _ => citation,
                    })
                },
            )
            .collect()
    }

    /// Converte um corpus anotado (uma citação por linha) em linhas do toolkit de CRF.
    ///
    /// Uma linha por token, linha em branco entre sequências. Aborta na primeira
    /// linha com marcação inválida. Retorna o número de sequências escritas.
    pub fn write_training_data<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<usize> {
        let mut sequences = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let seq = self.builder.build_training(line.trim())?;
            for row in &seq.rows {
                writeln!(writer, "{}", row.to_line())?;
            }
            writeln!(writer)?;
            sequences += 1;
        }
        writer.flush()?;
        info!(sequences, "dados de treino escritos");
        Ok(sequences)
    }

    fn run<T: SequenceTagger + ?Sized>(
        &self,
        tagger: &mut T,
        text: &str,
        tx: Option<&mpsc::Sender<ParseEvent>>,
    ) -> Result<(FieldMap, Vec<TaggedToken>)> {
        let text = text.trim();

        // === Passo 1 e 2: tokens e features ===
        let seq = self.builder.build(text);
        if let Some(tx) = tx {
            let _ = tx.send(ParseEvent::TokenizationDone {
                tokens: seq.words.clone(),
                total: seq.len(),
            });
            let names = self.builder.order().names();
            for (i, row) in seq.rows.iter().enumerate() {
                let _ = tx.send(ParseEvent::FeaturesComputed {
                    token_index: i,
                    token_text: row.token.clone(),
                    features: names.iter().cloned().zip(row.values.iter().cloned()).collect(),
                });
            }
        }

        // === Passo 3: CRF ===
        let tagged = tag_sequence(tagger, &seq)?;
        if let Some(tx) = tx {
            for (i, t) in tagged.iter().enumerate() {
                let _ = tx.send(ParseEvent::TagAssigned {
                    token_index: i,
                    token_text: t.token.text.clone(),
                    label: t.label,
                    confidence: t.confidence,
                });
            }
        }

        // === Passo 4: montagem e normalização ===
        let labels: Vec<Label> = tagged.iter().map(|t| t.label).collect();
        let mut fields = assemble_fields(text, &seq.words, &labels);
        if let Some(tx) = tx {
            let _ = tx.send(ParseEvent::FieldsAssembled { fields: fields.clone() });
        }
        self.normalizer.normalize_fields(&mut fields);
        fields.ensure_lists();

        debug!(tokens = tagged.len(), fields = fields.len(), "citação processada");
        Ok((fields, tagged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::AUTHORS;
    use crate::error::CiteError;
    use crate::features::FeatureOrder;
    use crate::preprocessor::MarkerType;
    use std::io::Cursor;

    const FEATURES: [&str; 3] = ["capitalization", "numbers", "toklcnp"];
    const SMITH: &str = "Smith, J. On Widgets. 1999. 12-19.";

    fn model() -> CrfModel {
        let mut model = CrfModel::new(FEATURES.iter().map(|f| f.to_string()).collect());
        model.set_emission("toklcnp", "smith", Label::Author, 5.0);
        model.set_emission("toklcnp", "j", Label::Author, 5.0);
        model.set_emission("toklcnp", "on", Label::Title, 5.0);
        model.set_emission("toklcnp", "widgets", Label::Title, 5.0);
        model.set_emission("numbers", "year", Label::Date, 5.0);
        model.set_emission("numbers", "possiblePage", Label::Pages, 5.0);
        model
    }

    fn parser() -> CitationParser {
        let builder = FeatureSequenceBuilder::new(
            FeatureOrder::from_names(&FEATURES).unwrap(),
            Arc::new(Dictionary::builtin()),
        );
        CitationParser::new(model(), builder)
            .unwrap()
            .with_normalizer(Normalizer::with_current_year(2024))
    }

    #[test]
    fn test_parse_string_fields() {
        let fields = parser().parse_string(SMITH).unwrap();
        assert_eq!(fields.list(AUTHORS), ["J Smith"]);
        assert_eq!(fields.text("title"), Some("On Widgets"));
        assert_eq!(fields.text("year"), Some("1999"));
        assert_eq!(fields.text("pages"), Some("12--19"));
        assert_eq!(fields.raw_string(), SMITH);
    }

    #[test]
    fn test_parse_citation_record() {
        let citation = parser().parse_citation(&format!("  {SMITH}\n")).unwrap();
        assert_eq!(citation.raw_string, SMITH);
        assert_eq!(citation.year, Some(1999));
        assert!(citation.is_valid());
    }

    #[test]
    fn test_empty_input() {
        let fields = parser().parse_string("   ").unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.raw_string(), "");
        assert!(fields.list(AUTHORS).is_empty());
        assert!(!Citation::from_fields(&fields).is_valid());
    }

    #[test]
    fn test_model_feature_mismatch() {
        let builder = FeatureSequenceBuilder::new(FeatureOrder::default(), Arc::new(Dictionary::default()));
        assert!(matches!(
            CitationParser::new(model(), builder),
            Err(CiteError::ModelMismatch(_))
        ));
    }

    #[test]
    fn test_new_accepts_model_with_own_labels() {
        let features: Vec<String> = FEATURES.iter().map(|f| f.to_string()).collect();
        let model = CrfModel::with_labels(vec![Label::Author, Label::Title], features);
        let builder = FeatureSequenceBuilder::new(
            FeatureOrder::from_names(&FEATURES).unwrap(),
            Arc::new(Dictionary::default()),
        );
        let parser = CitationParser::new(model, builder).unwrap();
        assert_eq!(parser.model().labels, vec![Label::Author, Label::Title]);
    }

    #[test]
    fn test_streaming_events() {
        let (tx, rx) = mpsc::channel();
        parser().parse_streaming(SMITH, tx);
        let events: Vec<ParseEvent> = rx.try_iter().collect();

        assert!(matches!(&events[0], ParseEvent::TokenizationDone { total: 6, .. }));
        let features = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::FeaturesComputed { .. }))
            .count();
        assert_eq!(features, 6);
        assert!(events
            .iter()
            .any(|e| matches!(e, ParseEvent::TagAssigned { label: Label::Date, .. })));
        match events.last().unwrap() {
            ParseEvent::Done { total_tokens, fields, .. } => {
                assert_eq!(*total_tokens, 6);
                assert_eq!(fields.text("year"), Some("1999"));
            }
            other => panic!("último evento deveria ser Done, veio {other:?}"),
        }
    }

    #[test]
    fn test_streaming_event_json_shape() {
        let event = ParseEvent::Error {
            message: "x".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["data"]["message"], "x");
    }

    #[test]
    fn test_batch_preserves_order() {
        let texts = vec![SMITH.to_string(), String::new(), "On Widgets.".to_string()];
        let results = parser().parse_batch(&texts);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().year, Some(1999));
        assert!(!results[1].as_ref().unwrap().is_valid());
        assert_eq!(results[2].as_ref().unwrap().title.as_deref(), Some("On Widgets"));
    }

    #[test]
    fn test_reference_section_carries_markers() {
        let section = "[1] Smith, J. On Widgets.\n1999. 12-19.\n\n 3 \n[2] On Widgets.";
        let results = parser().parse_reference_section(section);
        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.marker.as_deref(), Some("[1]"));
        assert_eq!(first.marker_type, Some(MarkerType::Square));
        assert_eq!(first.pages.as_deref(), Some("12--19"));
        assert_eq!(results[1].as_ref().unwrap().marker.as_deref(), Some("[2]"));
    }

    #[test]
    fn test_write_training_data() {
        let corpus = "<author>Smith, J.</author> <title>On Widgets.</title>\n\n<date>1999.</date>\n";
        let mut out = Vec::new();
        let n = parser().write_training_data(Cursor::new(corpus), &mut out).unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Smith, InitCap nonNum smith author");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "1999. others year 1999 date");
    }

    #[test]
    fn test_write_training_data_aborts_on_bad_markup() {
        let corpus = "<author>Smith</author>\n<author>Jones</title>\n";
        let err = parser()
            .write_training_data(Cursor::new(corpus), Vec::new())
            .unwrap_err();
        match err {
            CiteError::Training { line, .. } => assert_eq!(line, "<author>Jones</title>"),
            other => panic!("esperava erro de treino, veio {other:?}"),
        }
    }
}
