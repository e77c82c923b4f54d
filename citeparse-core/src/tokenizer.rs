//! # Tokenizador de Citações
//!
//! Divide a string da citação em tokens separados por espaços em branco.
//! Cada token preserva sua posição original (offset em bytes), o que permite ao
//! montador de campos reinserir exatamente o espaço que seguia cada token.
//!
//! ## Visões paralelas
//!
//! A partir dos tokens, [`prepare_token_data`] produz quatro sequências alinhadas:
//!
//! 1. **tokens_and_tags**: tokens originais, incluindo marcadores de treino (`<author>`).
//! 2. **tokens**: os mesmos tokens sem os marcadores.
//! 3. **stripped**: tokens sem pontuação (`[^\w]` removido). Um token só de pontuação vira `EMPTY`.
//! 4. **lower**: `stripped` em minúsculas.
//!
//! ## Modos
//!
//! - **Inference**: nada é separado; um `<x>` no meio do texto é apenas um token.
//! - **Training**: marcadores colados em palavras (`<author>Smith,`) são separados
//!   em tokens próprios para que o scanner de marcação os enxergue.
//!
//! ```rust
//! use citeparse_core::tokenizer::{prepare_token_data, TokenizerMode};
//!
//! let data = prepare_token_data("<author>Smith, J.</author>", TokenizerMode::Training);
//! assert_eq!(data.tokens, vec!["Smith,", "J."]);
//! assert_eq!(data.stripped, vec!["Smith", "J"]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Valor usado quando um token não tem nenhum caractere de palavra.
pub const EMPTY_TOKEN: &str = "EMPTY";

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-z]+>").unwrap());
static OPEN_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([a-z]+)>$").unwrap());
static CLOSE_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^</([a-z]+)>$").unwrap());

/// Um token extraído da string da citação.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Smith,", "127-136").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

/// Como tratar marcadores `<label>` no texto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    /// Texto cru vindo do usuário: marcadores não têm significado.
    #[default]
    Inference,
    /// Linha do corpus anotado: marcadores são separados das palavras.
    Training,
}

/// Marcador de treino reconhecido em um token isolado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Open(String),
    Close(String),
}

impl Marker {
    /// Reconhece `<nome>` / `</nome>` ocupando o token inteiro.
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(caps) = OPEN_TAG_RE.captures(token) {
            return Some(Marker::Open(caps[1].to_string()));
        }
        CLOSE_TAG_RE
            .captures(token)
            .map(|caps| Marker::Close(caps[1].to_string()))
    }
}

/// As quatro visões paralelas de uma citação.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSequence {
    /// Tokens originais, incluindo marcadores (modo treino).
    pub tokens_and_tags: Vec<Token>,
    /// Tokens sem marcadores, com offsets.
    pub words: Vec<Token>,
    /// Texto de `words`.
    pub tokens: Vec<String>,
    /// `tokens` sem pontuação (`EMPTY` quando nada sobra).
    pub stripped: Vec<String>,
    /// `stripped` em minúsculas.
    pub lower: Vec<String>,
}

impl TokenSequence {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Tokeniza por espaços em branco, sem tratar marcadores.
pub fn tokenize(text: &str) -> Vec<Token> {
    tokenize_with_mode(text, TokenizerMode::Inference)
}

/// Tokeniza com o modo especificado.
pub fn tokenize_with_mode(text: &str, mode: TokenizerMode) -> Vec<Token> {
    let mut tokens = match mode {
        TokenizerMode::Inference => tokenize_whitespace(text),
        TokenizerMode::Training => split_markup(tokenize_whitespace(text)),
    };

    // Re-indexa os tokens
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Constrói as quatro visões paralelas usadas pelas features.
pub fn prepare_token_data(text: &str, mode: TokenizerMode) -> TokenSequence {
    let tokens_and_tags = tokenize_with_mode(text, mode);

    let mut words: Vec<Token> = match mode {
        TokenizerMode::Training => tokens_and_tags
            .iter()
            .filter(|t| Marker::parse(&t.text).is_none())
            .cloned()
            .collect(),
        TokenizerMode::Inference => tokens_and_tags.clone(),
    };
    for (i, word) in words.iter_mut().enumerate() {
        word.index = i;
    }

    let tokens: Vec<String> = words.iter().map(|t| t.text.clone()).collect();
    let stripped: Vec<String> = tokens.iter().map(|t| strip_punctuation(t)).collect();
    let lower = stripped
        .iter()
        .map(|t| {
            if t == EMPTY_TOKEN {
                EMPTY_TOKEN.to_string()
            } else {
                t.to_lowercase()
            }
        })
        .collect();

    TokenSequence {
        tokens_and_tags,
        words,
        tokens,
        stripped,
        lower,
    }
}

/// Remove tudo que não é caractere de palavra; devolve `EMPTY` se nada sobrar.
pub fn strip_punctuation(token: &str) -> String {
    let stripped: String = token
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if stripped.is_empty() {
        EMPTY_TOKEN.to_string()
    } else {
        stripped
    }
}

fn tokenize_whitespace(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();

    for (byte_pos, ch) in text.char_indices() {
        if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
        } else {
            if current_text.is_empty() {
                current_start = byte_pos;
            }
            current_text.push(ch);
        }
    }

    flush_token(&mut tokens, &mut current_text, current_start, text.len());
    tokens
}

/// Separa marcadores colados: `J.</author>` -> `J.`, `</author>`.
fn split_markup(tokens: Vec<Token>) -> Vec<Token> {
    let mut expanded = Vec::with_capacity(tokens.len());

    for token in tokens {
        let mut last = 0;
        for m in MARKUP_RE.find_iter(&token.text) {
            if m.start() > last {
                push_token(
                    &mut expanded,
                    token.text[last..m.start()].to_string(),
                    token.start + last,
                    token.start + m.start(),
                );
            }
            push_token(
                &mut expanded,
                m.as_str().to_string(),
                token.start + m.start(),
                token.start + m.end(),
            );
            last = m.end();
        }
        if last == 0 {
            expanded.push(token);
        } else if last < token.text.len() {
            push_token(
                &mut expanded,
                token.text[last..].to_string(),
                token.start + last,
                token.end,
            );
        }
    }

    expanded
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        tokens.push(Token {
            text: text.clone(),
            start,
            end,
            index: 0, // será atribuído depois
        });
        text.clear();
    }
}

fn push_token(tokens: &mut Vec<Token>, text: String, start: usize, end: usize) {
    tokens.push(Token {
        text,
        start,
        end,
        index: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_whitespace_runs() {
        let tokens = tokenize("  W. H.  Enright.\tImproving ");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["W.", "H.", "Enright.", "Improving"]);
        assert_eq!(tokens[2].start, 9);
        assert_eq!(tokens[3].index, 3);
    }

    #[test]
    fn test_offsets_point_into_text() {
        let text = "A B  C";
        for token in tokenize(text) {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(strip_punctuation("Enright."), "Enright");
        assert_eq!(strip_punctuation("4(2),"), "42");
        assert_eq!(strip_punctuation("--"), EMPTY_TOKEN);
    }

    #[test]
    fn test_lowercase_view_keeps_empty_marker() {
        let data = prepare_token_data("ACM ,", TokenizerMode::Inference);
        assert_eq!(data.lower, vec!["acm", "EMPTY"]);
    }

    #[test]
    fn test_training_mode_splits_markers() {
        let data = prepare_token_data(
            "<author>Smith, J.</author> <title>On Widgets</title>",
            TokenizerMode::Training,
        );
        let all: Vec<&str> = data.tokens_and_tags.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            all,
            vec!["<author>", "Smith,", "J.", "</author>", "<title>", "On", "Widgets", "</title>"]
        );
        assert_eq!(data.tokens, vec!["Smith,", "J.", "On", "Widgets"]);
        assert_eq!(data.words[3].index, 3);
    }

    #[test]
    fn test_inference_mode_keeps_angle_brackets() {
        let data = prepare_token_data("<author>Smith", TokenizerMode::default());
        assert_eq!(data.tokens, vec!["<author>Smith"]);
        assert_eq!(TokenizerMode::default(), TokenizerMode::Inference);
    }

    #[test]
    fn test_marker_parse() {
        assert_eq!(Marker::parse("<title>"), Some(Marker::Open("title".into())));
        assert_eq!(Marker::parse("</title>"), Some(Marker::Close("title".into())));
        assert_eq!(Marker::parse("<Title>"), None);
        assert_eq!(Marker::parse("title"), None);
    }
}
