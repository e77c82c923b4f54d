//! # Pré-processamento de Seções de Referências
//!
//! Recebe o texto de uma seção de referências inteira (uma citação pode ocupar
//! várias linhas) e o divide em citações individuais.
//!
//! ## Marcadores
//!
//! | Tipo          | Exemplo        |
//! |---------------|----------------|
//! | `SQUARE`      | `[12] Smith…`  |
//! | `PAREN`       | `(12) Smith…`  |
//! | `NAKEDNUMDOT` | `12. Smith…`   |
//! | `NAKEDNUM`    | `12 Smith…`    |
//!
//! O tipo é adivinhado pela primeira linha. Cada linha que começa com o
//! marcador abre uma nova citação; as demais são continuação da anterior. Sem
//! marcador reconhecível, cada linha é uma citação.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static JUNK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s0-9]*$").unwrap());
static HYPHEN_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s-$").unwrap());

static SQUARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\[.+?\])\s*(.*)$").unwrap());
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\(.+?\))\s*(.*)$").unwrap());
static NAKED_NUM_DOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([0-9]+\.)\s*(.*)$").unwrap());
static NAKED_NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([0-9]+)\s+(.*)$").unwrap());

/// Estilo de marcador que abre cada citação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarkerType {
    Square,
    Paren,
    #[serde(rename = "NAKEDNUM")]
    NakedNum,
    #[serde(rename = "NAKEDNUMDOT")]
    NakedNumDot,
}

impl MarkerType {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerType::Square => "SQUARE",
            MarkerType::Paren => "PAREN",
            MarkerType::NakedNum => "NAKEDNUM",
            MarkerType::NakedNumDot => "NAKEDNUMDOT",
        }
    }

    /// Regex `^marcador resto$` com dois grupos.
    fn line_regex(&self) -> &'static Regex {
        match self {
            MarkerType::Square => &SQUARE_RE,
            MarkerType::Paren => &PAREN_RE,
            MarkerType::NakedNum => &NAKED_NUM_RE,
            MarkerType::NakedNumDot => &NAKED_NUM_DOT_RE,
        }
    }

    /// Separa uma linha em (marcador, resto), se ela começar com este marcador.
    pub fn split_line<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let caps = self.line_regex().captures(line)?;
        let marker = caps.get(1)?.as_str();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        Some((marker, rest))
    }
}

impl std::fmt::Display for MarkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Uma citação isolada de uma seção de referências.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedCitation {
    pub marker_type: Option<MarkerType>,
    pub marker: Option<String>,
    pub text: String,
}

/// Remove linhas vazias ou só com números (números de página, rodapés).
pub fn normalize_cite_text(cite_text: &str) -> String {
    cite_text
        .lines()
        .filter(|line| !JUNK_LINE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Adivinha o marcador pela primeira linha não vazia.
pub fn guess_marker_type(cite_text: &str) -> Option<MarkerType> {
    let first = cite_text.lines().find(|l| !l.trim().is_empty())?;
    [
        MarkerType::Square,
        MarkerType::Paren,
        MarkerType::NakedNumDot,
        MarkerType::NakedNum,
    ]
    .into_iter()
    .find(|mt| mt.split_line(first).is_some())
}

/// Divide a seção em citações.
pub fn segment_citations(cite_text: &str) -> Vec<SegmentedCitation> {
    let citations = match guess_marker_type(cite_text) {
        Some(marker_type) => split_citations_by_marker(cite_text, marker_type),
        None => split_unmarked_citations(cite_text),
    };
    debug!(citations = citations.len(), "seção de referências segmentada");
    citations
}

fn split_unmarked_citations(cite_text: &str) -> Vec<SegmentedCitation> {
    cite_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| SegmentedCitation {
            marker_type: None,
            marker: None,
            text: l.to_string(),
        })
        .collect()
}

fn split_citations_by_marker(cite_text: &str, marker_type: MarkerType) -> Vec<SegmentedCitation> {
    let mut citations = Vec::new();
    let mut current: Option<SegmentedCitation> = None;

    for line in cite_text.lines() {
        if let Some((marker, rest)) = marker_type.split_line(line) {
            citations.extend(current.take());
            current = Some(SegmentedCitation {
                marker_type: Some(marker_type),
                marker: Some(marker.to_string()),
                text: rest.trim_end().to_string(),
            });
            continue;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let citation = current.get_or_insert_with(|| SegmentedCitation {
            marker_type: None,
            marker: None,
            text: String::new(),
        });
        if HYPHEN_END_RE.is_match(&citation.text) {
            // "Im -" + "proving" → "Im proving"
            citation.text.pop();
        } else if !citation.text.is_empty() {
            citation.text.push(' ');
        }
        citation.text.push_str(line);
    }

    citations.extend(current);
    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_number_lines() {
        let text = "[1] Smith, J.\n   \n  17 \nOn Widgets.";
        assert_eq!(normalize_cite_text(text), "[1] Smith, J.\nOn Widgets.");
    }

    #[test]
    fn test_guess_marker_type() {
        assert_eq!(guess_marker_type("[12] Smith"), Some(MarkerType::Square));
        assert_eq!(guess_marker_type("(3) Smith"), Some(MarkerType::Paren));
        assert_eq!(guess_marker_type("12. Smith"), Some(MarkerType::NakedNumDot));
        assert_eq!(guess_marker_type("12 Smith"), Some(MarkerType::NakedNum));
        assert_eq!(guess_marker_type("\n  Smith, J. On Widgets."), None);
    }

    #[test]
    fn test_segment_square_markers() {
        let text = "[1] W. H. Enright. Improving the\nefficiency of matrix operations.\n[2] J. Smith. On Widgets. 1999.";
        let cites = segment_citations(text);
        assert_eq!(cites.len(), 2);
        assert_eq!(cites[0].marker.as_deref(), Some("[1]"));
        assert_eq!(cites[0].marker_type, Some(MarkerType::Square));
        assert_eq!(
            cites[0].text,
            "W. H. Enright. Improving the efficiency of matrix operations."
        );
        assert_eq!(cites[1].text, "J. Smith. On Widgets. 1999.");
    }

    #[test]
    fn test_hyphen_continuation() {
        let text = "1. Smith. Im -\nproving things.";
        let cites = segment_citations(text);
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].marker.as_deref(), Some("1."));
        assert_eq!(cites[0].text, "Smith. Im proving things.");
    }

    #[test]
    fn test_unmarked_lines() {
        let cites = segment_citations("Smith. On Widgets.\nJones. On Gadgets.\n");
        assert_eq!(cites.len(), 2);
        assert!(cites.iter().all(|c| c.marker.is_none()));
        assert_eq!(cites[1].text, "Jones. On Gadgets.");
    }

    #[test]
    fn test_marker_type_serde_names() {
        assert_eq!(serde_json::to_string(&MarkerType::NakedNumDot).unwrap(), "\"NAKEDNUMDOT\"");
        assert_eq!(serde_json::to_string(&MarkerType::Square).unwrap(), "\"SQUARE\"");
    }
}
