//! # Labels de Citação e Sessão do Tagger
//!
//! Define o conjunto **fechado** de labels estruturais que o tagger atribui a
//! cada token, e o contrato estreito pelo qual o pipeline conversa com qualquer
//! tagger sequencial.
//!
//! ## Labels
//!
//! | Label         | Exemplo                                   |
//! |---------------|-------------------------------------------|
//! | `author`      | W. H. Enright.                            |
//! | `title`       | Improving the efficiency of ...           |
//! | `journal`     | ACM Trans. Math. Softw.,                  |
//! | `booktitle`   | Proceedings of the 5th Workshop ...       |
//! | `volume`      | 4(2),                                     |
//! | `pages`       | 127-136,                                  |
//! | `date`        | June 1978.                                |
//! | `editor`, `institution`, `location`, `note`, `publisher`, `tech` | |
//!
//! `year` e `number` **não** são labels: são chaves produzidas pela
//! normalização a partir de `date` e `volume`.
//!
//! ## Sessão
//!
//! [`SequenceTagger`] espelha a API de sessão dos toolkits clássicos de CRF:
//! `clear` → `add` (uma linha de features por token) → `parse` → `label(i)`.
//! Uma sessão não guarda memória entre sequências.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaggerError};
use crate::sequence::FeatureSequence;
use crate::tokenizer::Token;

/// Label estrutural de um token de citação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Author,
    Booktitle,
    Date,
    Editor,
    Institution,
    Journal,
    Location,
    Note,
    Pages,
    Publisher,
    Tech,
    Title,
    Volume,
}

impl Label {
    /// Número total de labels
    pub const COUNT: usize = 13;

    /// Todos os labels em ordem alfabética
    pub fn all() -> [Label; 13] {
        [
            Label::Author,
            Label::Booktitle,
            Label::Date,
            Label::Editor,
            Label::Institution,
            Label::Journal,
            Label::Location,
            Label::Note,
            Label::Pages,
            Label::Publisher,
            Label::Tech,
            Label::Title,
            Label::Volume,
        ]
    }

    /// Nome usado na marcação de treino e no mapa de campos.
    pub fn name(&self) -> &'static str {
        match self {
            Label::Author => "author",
            Label::Booktitle => "booktitle",
            Label::Date => "date",
            Label::Editor => "editor",
            Label::Institution => "institution",
            Label::Journal => "journal",
            Label::Location => "location",
            Label::Note => "note",
            Label::Pages => "pages",
            Label::Publisher => "publisher",
            Label::Tech => "tech",
            Label::Title => "title",
            Label::Volume => "volume",
        }
    }

    /// Índice na ordem de [`Label::all`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Label::all().into_iter().find(|l| l.name() == name)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Token com o label atribuído pelo tagger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: Token,
    pub label: Label,
    /// Confiança do tagger neste label (0.0 a 1.0)
    pub confidence: f64,
}

/// Contrato de uma sessão de tagging sequencial.
///
/// Implementações precisam ser baratas de criar: o pipeline cria uma sessão
/// por worker e a reutiliza chamando [`clear`](SequenceTagger::clear) antes de
/// cada sequência.
pub trait SequenceTagger {
    /// Descarta as linhas e o resultado da sequência anterior.
    fn clear(&mut self);

    /// Adiciona a linha de features de um token (sem o texto do token).
    fn add(&mut self, row: &[String]) -> std::result::Result<(), TaggerError>;

    /// Decodifica a sequência acumulada.
    fn parse(&mut self) -> std::result::Result<(), TaggerError>;

    /// Número de linhas adicionadas desde o último `clear`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label decodificado do token `i` (após `parse`).
    fn label(&self, i: usize) -> Option<Label>;

    /// Confiança do label do token `i`.
    fn confidence(&self, _i: usize) -> f64 {
        1.0
    }
}

/// Roda uma sequência completa pelo tagger e devolve um label por linha.
pub fn tag_sequence<T: SequenceTagger + ?Sized>(
    tagger: &mut T,
    seq: &FeatureSequence,
) -> Result<Vec<TaggedToken>> {
    tagger.clear();
    if seq.is_empty() {
        return Ok(Vec::new());
    }

    for row in &seq.rows {
        tagger.add(&row.values)?;
    }
    tagger.parse()?;

    if tagger.len() != seq.len() {
        return Err(TaggerError::DecodeFailed(format!(
            "tagger devolveu {} labels para {} tokens",
            tagger.len(),
            seq.len()
        ))
        .into());
    }

    seq.words
        .iter()
        .enumerate()
        .map(|(i, token)| -> Result<TaggedToken> {
            let label = tagger
                .label(i)
                .ok_or_else(|| TaggerError::DecodeFailed(format!("sem label para o token {i}")))?;
            Ok(TaggedToken {
                token: token.clone(),
                label,
                confidence: tagger.confidence(i),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::error::CiteError;
    use crate::features::FeatureOrder;
    use crate::sequence::FeatureSequenceBuilder;
    use std::sync::Arc;

    /// Tagger fixo: rotula tudo como `title`, rejeita linhas vazias.
    struct ConstantTagger {
        rows: usize,
        parsed: bool,
    }

    impl SequenceTagger for ConstantTagger {
        fn clear(&mut self) {
            self.rows = 0;
            self.parsed = false;
        }

        fn add(&mut self, row: &[String]) -> std::result::Result<(), TaggerError> {
            if row.is_empty() {
                return Err(TaggerError::RowRejected {
                    index: self.rows,
                    expected: 1,
                    found: 0,
                });
            }
            self.rows += 1;
            Ok(())
        }

        fn parse(&mut self) -> std::result::Result<(), TaggerError> {
            self.parsed = true;
            Ok(())
        }

        fn len(&self) -> usize {
            self.rows
        }

        fn label(&self, i: usize) -> Option<Label> {
            (self.parsed && i < self.rows).then_some(Label::Title)
        }
    }

    #[test]
    fn test_label_roundtrip_names() {
        for label in Label::all() {
            assert_eq!(Label::from_name(label.name()), Some(label));
        }
        assert_eq!(Label::from_name("year"), None);
        assert_eq!(Label::from_name("number"), None);
        assert_eq!(Label::Volume.index(), Label::COUNT - 1);
    }

    #[test]
    fn test_label_serde_lowercase() {
        let json = serde_json::to_string(&Label::Booktitle).unwrap();
        assert_eq!(json, "\"booktitle\"");
    }

    #[test]
    fn test_tag_sequence_one_label_per_token() {
        let builder = FeatureSequenceBuilder::new(FeatureOrder::default(), Arc::new(Dictionary::default()));
        let seq = builder.build("On Widgets and Gadgets");
        let mut tagger = ConstantTagger { rows: 0, parsed: false };
        let tagged = tag_sequence(&mut tagger, &seq).unwrap();
        assert_eq!(tagged.len(), 4);
        assert!(tagged.iter().all(|t| t.label == Label::Title));
        assert_eq!(tagged[3].token.text, "Gadgets");
        assert!((tagged[0].confidence - 1.0).abs() < 1e-9);

        // Sessão reaproveitada não acumula linhas
        let again = tag_sequence(&mut tagger, &builder.build("Two words")).unwrap();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_rejected_row_is_distinguishable() {
        let builder = FeatureSequenceBuilder::new(
            FeatureOrder::from_names(&["toklcnp"]).unwrap(),
            Arc::new(Dictionary::default()),
        );
        let mut seq = builder.build("a b");
        seq.rows[1].values.clear();
        let mut tagger = ConstantTagger { rows: 0, parsed: false };
        let err = tag_sequence(&mut tagger, &seq).unwrap_err();
        assert!(matches!(
            err,
            CiteError::Tagger(TaggerError::RowRejected { index: 1, .. })
        ));
    }
}
