//! # Montagem de Campos
//!
//! Junta tokens consecutivos com o mesmo label em um único trecho de texto por
//! label. Cada token leva consigo exatamente o espaço em branco que o seguia na
//! string original, de modo que a concatenação de todos os trechos, na ordem
//! dos tokens, reproduz a entrada.
//!
//! ```text
//! W.      H.      Enright.   Improving   the
//! author  author  author     title       title
//!
//! author → "W. H. Enright.   "
//! title  → "Improving the"
//! ```
//!
//! Trechos não-adjacentes do mesmo label são concatenados.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tagger::Label;
use crate::tokenizer::Token;

/// Chave sempre presente com a string de entrada.
pub const RAW_STRING: &str = "raw_string";
/// Lista de autores normalizados.
pub const AUTHORS: &str = "authors";
/// Lista de contextos de citação (sempre presente, possivelmente vazia).
pub const CONTEXTS: &str = "contexts";

/// Valor de um campo: texto ou lista de textos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }
}

/// Mapa nome do campo → valor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Valor textual do campo, se houver.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(FieldValue::as_text)
    }

    /// Valor em lista do campo (vazio se ausente ou textual).
    pub fn list(&self, key: &str) -> &[String] {
        self.0.get(key).and_then(FieldValue::as_list).unwrap_or(&[])
    }

    pub fn raw_string(&self) -> &str {
        self.text(RAW_STRING).unwrap_or("")
    }

    pub fn insert_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), FieldValue::Text(value.into()));
    }

    pub fn insert_list(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), FieldValue::List(values));
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Cópia das chaves atuais (para iterar enquanto o mapa é alterado).
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Garante `authors` e `contexts` como listas.
    pub fn ensure_lists(&mut self) {
        for key in [AUTHORS, CONTEXTS] {
            if !matches!(self.get(key), Some(FieldValue::List(_))) {
                self.insert_list(key, Vec::new());
            }
        }
    }
}

/// Agrupa os tokens por label, preservando o espaço que segue cada token.
///
/// `words[i]` recebe `labels[i]`; offsets são relativos a `raw`.
pub fn assemble_fields(raw: &str, words: &[Token], labels: &[Label]) -> FieldMap {
    let mut spans: BTreeMap<String, String> = BTreeMap::new();

    for (i, (token, label)) in words.iter().zip(labels).enumerate() {
        let end = words.get(i + 1).map(|next| next.start).unwrap_or(raw.len());
        let text = raw.get(token.start..end).unwrap_or(&token.text);
        spans.entry(label.name().to_string()).or_default().push_str(text);
    }

    let mut fields = FieldMap::new();
    for (key, text) in spans {
        fields.insert_text(key, text);
    }
    fields.insert_text(RAW_STRING, raw);
    fields
}
