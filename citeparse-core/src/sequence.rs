//! # Sequências de Features
//!
//! Transforma uma string de citação em uma sequência de linhas
//! `[token, feat_1, …, feat_N]`, uma por token, prontas para o tagger.
//!
//! ## Linhas de treino
//!
//! No modo treino a string vem anotada (`<author>W. H. Enright.</author> <title>…`).
//! Um scanner de dois estados percorre os tokens:
//!
//! ```text
//!   Outside ──<nome>──▶ Inside(nome)
//!   Inside(nome) ──</nome>──▶ Outside
//! ```
//!
//! Qualquer outra transição é um [`MarkupError`] e a linha inteira é rejeitada.
//! Os marcadores nunca viram linhas; cada token entre eles recebe o label da tag
//! que o envolve.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dictionary::Dictionary;
use crate::error::{CiteError, MarkupError, Result};
use crate::features::{extract_features, FeatureOrder};
use crate::tagger::Label;
use crate::tokenizer::{prepare_token_data, Marker, Token, TokenizerMode};

/// Linha de features de um token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureRow {
    /// Texto original do token (não é enviado ao tagger).
    pub token: String,
    /// Valores das features na ordem configurada.
    pub values: Vec<String>,
    /// Label verdadeiro (só em modo treino).
    pub label: Option<Label>,
}

impl FeatureRow {
    /// Linha no formato do toolkit de CRF: campos separados por espaço,
    /// label por último quando presente.
    pub fn to_line(&self) -> String {
        let mut fields: Vec<&str> = Vec::with_capacity(self.values.len() + 2);
        fields.push(&self.token);
        fields.extend(self.values.iter().map(String::as_str));
        if let Some(label) = &self.label {
            fields.push(label.name());
        }
        fields.join(" ")
    }
}

/// Sequência de linhas de uma citação, com os tokens (e offsets) correspondentes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSequence {
    pub rows: Vec<FeatureRow>,
    /// `words[i]` é o token da linha `rows[i]`.
    pub words: Vec<Token>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Labels verdadeiros, se todas as linhas tiverem um.
    pub fn labels(&self) -> Option<Vec<Label>> {
        self.rows.iter().map(|r| r.label).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    Inside(Label),
}

/// Atribui a cada token (não marcador) o label da tag que o envolve.
pub fn scan_markup(tokens_and_tags: &[Token]) -> std::result::Result<Vec<Label>, MarkupError> {
    let mut state = ScanState::Outside;
    let mut labels = Vec::with_capacity(tokens_and_tags.len());

    for token in tokens_and_tags {
        state = match (state, Marker::parse(&token.text)) {
            (ScanState::Outside, Some(Marker::Open(name))) => {
                let label = Label::from_name(&name).ok_or(MarkupError::UnknownLabel(name))?;
                ScanState::Inside(label)
            }
            (ScanState::Inside(open), Some(Marker::Open(inner))) => {
                return Err(MarkupError::NestedTag {
                    open: open.name().to_string(),
                    inner,
                });
            }
            (ScanState::Outside, Some(Marker::Close(name))) => {
                return Err(MarkupError::UnexpectedClose(name));
            }
            (ScanState::Inside(open), Some(Marker::Close(close))) => {
                if open.name() != close {
                    return Err(MarkupError::TagMismatch {
                        open: open.name().to_string(),
                        close,
                    });
                }
                ScanState::Outside
            }
            (ScanState::Outside, None) => {
                return Err(MarkupError::UntaggedToken(token.text.clone()));
            }
            (ScanState::Inside(label), None) => {
                labels.push(label);
                ScanState::Inside(label)
            }
        };
    }

    match state {
        ScanState::Inside(open) => Err(MarkupError::Unterminated(open.name().to_string())),
        ScanState::Outside => Ok(labels),
    }
}

/// Constrói sequências de features com uma ordem e um dicionário fixos.
#[derive(Debug, Clone)]
pub struct FeatureSequenceBuilder {
    order: FeatureOrder,
    dictionary: Arc<Dictionary>,
}

impl FeatureSequenceBuilder {
    pub fn new(order: FeatureOrder, dictionary: Arc<Dictionary>) -> Self {
        Self { order, dictionary }
    }

    pub fn order(&self) -> &FeatureOrder {
        &self.order
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Sequência de inferência: sem labels, marcadores não têm significado.
    pub fn build(&self, text: &str) -> FeatureSequence {
        let seq = prepare_token_data(text, TokenizerMode::Inference);
        let features = extract_features(&seq, &self.dictionary, &self.order);
        let rows: Vec<FeatureRow> = seq
            .tokens
            .iter()
            .zip(features)
            .map(|(token, values)| FeatureRow {
                token: token.clone(),
                values,
                label: None,
            })
            .collect();
        debug!(tokens = rows.len(), features = self.order.len(), "sequência de features construída");
        FeatureSequence { rows, words: seq.words }
    }

    /// Sequência de treino a partir de uma linha anotada.
    pub fn build_training(&self, line: &str) -> Result<FeatureSequence> {
        let seq = prepare_token_data(line, TokenizerMode::Training);
        let labels = scan_markup(&seq.tokens_and_tags).map_err(|kind| CiteError::Training {
            line: line.to_string(),
            kind,
        })?;
        let features = extract_features(&seq, &self.dictionary, &self.order);
        let rows = seq
            .tokens
            .iter()
            .zip(features)
            .zip(labels)
            .map(|((token, values), label)| FeatureRow {
                token: token.clone(),
                values,
                label: Some(label),
            })
            .collect();
        Ok(FeatureSequence { rows, words: seq.words })
    }
}
