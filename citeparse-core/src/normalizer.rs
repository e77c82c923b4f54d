//! # Normalização de Campos
//!
//! Depois da montagem, cada campo passa por uma regra própria, escolhida por
//! nome em uma tabela. Campos sem regra usam a regra padrão, que remove
//! caracteres não-alfanuméricos das pontas.
//!
//! | Campo    | Regra                                                         |
//! |----------|---------------------------------------------------------------|
//! | `author` | separa e normaliza nomes → lista `authors` ("First Middle Last") |
//! | `date`   | primeiro ano de 4 dígitos plausível → `year` e `date`          |
//! | `volume` | "23(2)" → `volume` = 23, `number` = 2                          |
//! | `pages`  | "127-136" → "127--136"                                         |
//! | outros   | remove pontuação das pontas                                    |
//!
//! As chaves são copiadas antes de rodar as regras: cada regra roda uma única
//! vez por chave, mesmo que crie chaves novas (`year`, `number`, `authors`).
//! A normalização nunca falha; entradas estranhas passam inalteradas.
//!
//! ## Heurística de autores
//!
//! ```text
//! "Smith, J. and Jones, A.B."
//!   → reparo: remove "et al.", apartes entre parênteses/colchetes, junta partículas
//!   → tokens: [Smith,] [J.] [and] [Jones,] [A.B.]
//!   → grupos: [Smith, J.] [Jones, A.B.]
//!   → nomes:  "J Smith", "A B Jones"
//! ```

use std::collections::HashMap;

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::assembler::{FieldMap, FieldValue, AUTHORS, CONTEXTS, RAW_STRING};

static LEADING_JUNK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^A-Za-z0-9]+").unwrap());
static TRAILING_JUNK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+$").unwrap());

static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)et\.? al\.?.*$").unwrap());
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());
static LEAD_CLOSE_PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^.*?\)\.?").unwrap());
static OPEN_PAREN_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\(.*$").unwrap());
static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
static LEAD_CLOSE_BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^.*?\]\.?").unwrap());
static OPEN_BRACKET_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\[.*$").unwrap());
static AUTHOR_JUNK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[:"<>/?{}\[\]+=()*^%$#@!~_]"#).unwrap());
static PARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(van|von|der|den|de|di|le|el)\s").unwrap());
static SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(jr|sr|ph\.?d|m\.?d|esq)\.?,?$").unwrap());
static ROMAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[IVX][IVX]+\.?,?$").unwrap());
static CONJUNCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(&|and)$").unwrap());

static COMMA_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+),\s*(.+)$").unwrap());
static DOT_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.-").unwrap());
static NAME_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.]").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").unwrap());
static ROTATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s][^\s]+(\s+[^\s]|\s+[^\s]-[^\s])+$").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").unwrap());
static TWO_NUMBERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)[^0-9]+([0-9]+)").unwrap());
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static PAGE_RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)[^0-9]+?([0-9]+)").unwrap());

/// Informações disponíveis para uma regra.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Chave sendo normalizada
    pub key: &'a str,
    pub current_year: i32,
}

/// Regra de normalização de um campo.
pub type NormalizeFn = fn(&mut FieldMap, &NormalizeContext<'_>);

/// Tabela campo → regra, com regra padrão para o resto.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: HashMap<String, NormalizeFn>,
    fallback: NormalizeFn,
    current_year: i32,
}

impl Normalizer {
    /// Tabela padrão, usando o ano corrente do relógio local.
    pub fn new() -> Self {
        Self::with_current_year(chrono::Local::now().year())
    }

    pub fn with_current_year(current_year: i32) -> Self {
        let mut rules: HashMap<String, NormalizeFn> = HashMap::new();
        rules.insert("author".to_string(), normalize_author);
        rules.insert("date".to_string(), normalize_date);
        rules.insert("volume".to_string(), normalize_volume);
        rules.insert("pages".to_string(), normalize_pages);
        Self {
            rules,
            fallback: normalize_default,
            current_year,
        }
    }

    /// Registra (ou substitui) a regra de um campo.
    pub fn register(&mut self, key: impl Into<String>, rule: NormalizeFn) {
        self.rules.insert(key.into(), rule);
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Aplica a regra de cada chave presente, uma vez por chave.
    pub fn normalize_fields(&self, fields: &mut FieldMap) {
        let keys = fields.keys();
        for key in &keys {
            if key == RAW_STRING || key == AUTHORS || key == CONTEXTS {
                continue;
            }
            let rule = self.rules.get(key.as_str()).copied().unwrap_or(self.fallback);
            let ctx = NormalizeContext {
                key,
                current_year: self.current_year,
            };
            rule(fields, &ctx);
        }
        debug!(fields = keys.len(), "campos normalizados");
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove caracteres não-alfanuméricos das pontas de um campo textual.
pub fn normalize_default(fields: &mut FieldMap, ctx: &NormalizeContext<'_>) {
    if let Some(text) = fields.text(ctx.key) {
        let cleaned = strip_edges(text);
        fields.insert_text(ctx.key, cleaned);
    }
}

fn strip_edges(text: &str) -> String {
    let text = LEADING_JUNK_RE.replace(text, "");
    TRAILING_JUNK_RE.replace(&text, "").into_owned()
}

// === Datas ===

/// Primeiro ano de 4 dígitos não muito no futuro vira `year` e `date`.
pub fn normalize_date(fields: &mut FieldMap, ctx: &NormalizeContext<'_>) {
    let Some(text) = fields.text(ctx.key) else {
        return;
    };
    let year = YEAR_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| *y <= ctx.current_year + 3);
    match year {
        Some(year) => {
            fields.insert_text("year", year.to_string());
            fields.insert_text(ctx.key, year.to_string());
        }
        None => {
            fields.remove(ctx.key);
        }
    }
}

// === Volume e páginas ===

/// "23(2)" → volume 23, number 2; um único número → volume.
pub fn normalize_volume(fields: &mut FieldMap, ctx: &NormalizeContext<'_>) {
    let Some(text) = fields.text(ctx.key) else {
        return;
    };
    let two = TWO_NUMBERS_RE
        .captures(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()));
    let single = NUMBER_RE.find(text).map(|m| m.as_str().to_string());
    match (two, single) {
        (Some((volume, number)), _) => {
            fields.insert_text(ctx.key, volume);
            fields.insert_text("number", number);
        }
        (None, Some(volume)) => fields.insert_text(ctx.key, volume),
        (None, None) => {}
    }
}

/// Intervalo de páginas no formato "início--fim".
pub fn normalize_pages(fields: &mut FieldMap, ctx: &NormalizeContext<'_>) {
    let Some(text) = fields.text(ctx.key) else {
        return;
    };
    if let Some(pages) = normalize_pages_text(text) {
        fields.insert_text(ctx.key, pages);
    }
}

/// `None` quando o texto não tem nenhum número.
pub fn normalize_pages_text(text: &str) -> Option<String> {
    if let Some(caps) = PAGE_RANGE_RE.captures(text) {
        return Some(format!("{}--{}", &caps[1], &caps[2]));
    }
    NUMBER_RE.find(text).map(|m| m.as_str().to_string())
}

// === Autores ===

/// Gera a lista `authors` a partir do campo `author`.
pub fn normalize_author(fields: &mut FieldMap, ctx: &NormalizeContext<'_>) {
    let Some(text) = fields.text(ctx.key) else {
        return;
    };
    let authors = split_authors(text);
    fields.insert_list(AUTHORS, authors);
}

/// Separa o texto de autores em nomes normalizados.
pub fn split_authors(author_text: &str) -> Vec<String> {
    let tokens = repair_and_tokenize_author_text(author_text);
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut begin = true;

    for tok in tokens {
        if CONJUNCTION_RE.is_match(&tok) {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            begin = true;
            continue;
        }
        if begin {
            current.push(tok);
            begin = false;
            continue;
        }
        let ends_with_comma = tok.ends_with(',');
        current.push(tok);
        if ends_with_comma {
            groups.push(std::mem::take(&mut current));
            begin = true;
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
        .iter()
        .map(|g| normalize_author_name(g))
        .filter(|name| !name.is_empty() && name != "-")
        .collect()
}

/// Conserta notações estranhas e devolve os tokens de nomes.
pub fn repair_and_tokenize_author_text(author_text: &str) -> Vec<String> {
    let mut text = ET_AL_RE.replace(author_text, "").into_owned();
    for re in [
        &*PAREN_RE,
        &*LEAD_CLOSE_PAREN_RE,
        &*OPEN_PAREN_TAIL_RE,
        &*BRACKET_RE,
        &*LEAD_CLOSE_BRACKET_RE,
        &*OPEN_BRACKET_TAIL_RE,
    ] {
        text = re.replace_all(&text, "").into_owned();
    }
    let text = text.replace(';', ",").replace(',', ", ").replace(':', " ");
    let text = AUTHOR_JUNK_RE.replace_all(&text, "");
    let text = join_multi_word_names(&text);

    let original: Vec<&str> = text.split_whitespace().collect();
    let midpoint = original.len() / 2;
    let mut tokens: Vec<String> = Vec::new();

    for (i, tok) in original.iter().enumerate() {
        let mut last = false;
        if !tok.chars().any(|c| c.is_ascii_alphabetic() || c == '&') {
            // Lixo antes da metade: descarta o que veio antes
            if i < midpoint {
                tokens.clear();
                continue;
            }
            last = true;
        }
        let after_comma = tokens.last().map(|t| t.ends_with(',')).unwrap_or(false);
        if (SUFFIX_RE.is_match(tok) && after_comma) || ROMAN_RE.is_match(tok) {
            continue;
        }
        tokens.push(tok.to_string());
        if last {
            break;
        }
    }
    tokens
}

/// "Jon de Groote" → "Jon de_Groote"
pub fn join_multi_word_names(text: &str) -> String {
    PARTICLE_RE.replace_all(text, "${1}_").into_owned()
}

/// Normaliza um nome para "First Middle Last", sem pontuação.
pub fn normalize_author_name(tokens: &[String]) -> String {
    if tokens.is_empty() {
        return String::new();
    }
    let mut name = tokens.join(" ");
    if let Some(caps) = COMMA_NAME_RE.captures(&name) {
        name = format!("{} {}", &caps[1], &caps[2]);
    }
    let name = DOT_DASH_RE.replace_all(&name, "-");
    let name = NAME_PUNCT_RE.replace_all(&name, " ");
    let name = MULTI_SPACE_RE.replace_all(&name, " ");
    let name = name.trim();

    if ROTATE_RE.is_match(name) {
        let mut parts: Vec<&str> = name.split_whitespace().collect();
        parts.rotate_left(1);
        return parts.join(" ");
    }
    name.to_string()
}
