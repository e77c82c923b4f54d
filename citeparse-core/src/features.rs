//! # Features por Token para o CRF de Citações
//!
//! Para cada token, calcula um conjunto fixo de features categóricas (strings
//! curtas) que o CRF usa para decidir o label. As features capturam
//! informações ortográficas, numéricas, de posição e de dicionário.
//!
//! ## Registro de features
//!
//! Cada [`Feature`] aponta para uma função com a assinatura
//! `(visões dos tokens, cache da sequência, índice) → valor`. A configuração
//! escolhe um subconjunto e a ordem de saída por nome; nomes desconhecidos são
//! erro fatal de configuração.
//!
//! ## Ordem de avaliação
//!
//! Algumas features guardam estado intermediário no [`SequenceCache`]
//! (`possible_chapter` depende de `possible_editor`; as features de dicionário
//! dependem de `a_is_in_dict`). Por isso as features são **avaliadas** sempre em
//! ordem alfabética e apenas **emitidas** na ordem configurada.
//!
//! ## Features implementadas
//!
//! - Forma: `last_char`, `first_N_chars` (1–5), `last_N_chars` (1–4), `capitalization`
//! - Números: `numbers`
//! - Contexto da sequência: `possible_editor`, `possible_chapter`, `is_proceeding`
//! - Contexto local: `is_in`, `is_et_al`, `location`, `punct`
//! - Dicionário: `a_is_in_dict`, `publisherName`, `placeName`, `monthName`,
//!   `lastName`, `femaleName`, `maleName`
//! - Identidade: `toklcnp`

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::dictionary::{DictFlag, Dictionary};
use crate::error::{CiteError, Result};
use crate::tokenizer::TokenSequence;

const EDITOR_CUES: &[&str] = &["ed", "editor", "editors", "eds", "edited"];
const PROCEEDING_CUES: &[&str] = &["proc", "proceeding", "proceedings"];
/// Separadores `.;,)` e aspas que antecedem um "In" de capítulo.
const SEPARATORS_AND_QUOTES: &str = ".;,)\"'\u{201d}\u{2019}\u{b4}\u{2018}\u{201c}`";

static PAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]-[0-9]").unwrap());
static YEAR_IN_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^0-9]*(19|20)[0-9][0-9][^0-9]*$").unwrap());
static VOLUME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]\([0-9]+\)").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(19|20)[0-9][0-9]$").unwrap());
static ORDINAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(th|st|nd|rd)$").unwrap());
static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[.,;]\s*in[:\s]").unwrap());

static LEAD_QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^["'`]"#).unwrap());
static END_QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'`][^s]?$"#).unwrap());
static MULTI_HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-.*-").unwrap());
static CONT_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-,:;]$").unwrap());
static STOP_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[!?."']$"#).unwrap());
static BRACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[(\[{<].+[)\]}>].?$").unwrap());
static PUNCT_VOLUME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2,5}\([0-9]{2,5}\).?$").unwrap());

/// Visões da sequência que toda função de feature recebe.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    /// Tokens originais sem marcadores de treino.
    pub tokens: &'a [String],
    /// Tokens sem pontuação.
    pub stripped: &'a [String],
    /// Tokens sem pontuação, em minúsculas.
    pub lower: &'a [String],
    pub dictionary: &'a Dictionary,
}

impl<'a> FeatureInput<'a> {
    pub fn new(seq: &'a TokenSequence, dictionary: &'a Dictionary) -> Self {
        Self {
            tokens: &seq.tokens,
            stripped: &seq.stripped,
            lower: &seq.lower,
            dictionary,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Estado memoizado por sequência. Criado vazio para cada nova citação.
#[derive(Debug, Clone, Default)]
pub struct SequenceCache {
    possible_editor: Option<bool>,
    possible_chapter: Option<bool>,
    is_proceeding: Option<bool>,
    /// (índice do token, máscara do dicionário)
    dict_status: Option<(usize, u8)>,
}

impl SequenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Assinatura comum a todas as features.
pub type FeatureFn = fn(&FeatureInput<'_>, &mut SequenceCache, usize) -> String;

/// Identificador de cada feature registrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AIsInDict,
    Capitalization,
    FemaleName,
    First1Char,
    First2Chars,
    First3Chars,
    First4Chars,
    First5Chars,
    IsEtAl,
    IsIn,
    IsProceeding,
    LastName,
    Last1Char,
    Last2Chars,
    Last3Chars,
    Last4Chars,
    LastChar,
    Location,
    MaleName,
    MonthName,
    Numbers,
    PlaceName,
    PossibleChapter,
    PossibleEditor,
    PublisherName,
    Punct,
    Toklcnp,
}

impl Feature {
    /// Número total de features registradas
    pub const COUNT: usize = 27;

    pub fn all() -> [Feature; 27] {
        [
            Feature::AIsInDict,
            Feature::Capitalization,
            Feature::FemaleName,
            Feature::First1Char,
            Feature::First2Chars,
            Feature::First3Chars,
            Feature::First4Chars,
            Feature::First5Chars,
            Feature::IsEtAl,
            Feature::IsIn,
            Feature::IsProceeding,
            Feature::LastName,
            Feature::Last1Char,
            Feature::Last2Chars,
            Feature::Last3Chars,
            Feature::Last4Chars,
            Feature::LastChar,
            Feature::Location,
            Feature::MaleName,
            Feature::MonthName,
            Feature::Numbers,
            Feature::PlaceName,
            Feature::PossibleChapter,
            Feature::PossibleEditor,
            Feature::PublisherName,
            Feature::Punct,
            Feature::Toklcnp,
        ]
    }

    /// Nome usado na configuração e no artefato do modelo.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::AIsInDict => "a_is_in_dict",
            Feature::Capitalization => "capitalization",
            Feature::FemaleName => "femaleName",
            Feature::First1Char => "first_1_char",
            Feature::First2Chars => "first_2_chars",
            Feature::First3Chars => "first_3_chars",
            Feature::First4Chars => "first_4_chars",
            Feature::First5Chars => "first_5_chars",
            Feature::IsEtAl => "is_et_al",
            Feature::IsIn => "is_in",
            Feature::IsProceeding => "is_proceeding",
            Feature::LastName => "lastName",
            Feature::Last1Char => "last_1_char",
            Feature::Last2Chars => "last_2_chars",
            Feature::Last3Chars => "last_3_chars",
            Feature::Last4Chars => "last_4_chars",
            Feature::LastChar => "last_char",
            Feature::Location => "location",
            Feature::MaleName => "maleName",
            Feature::MonthName => "monthName",
            Feature::Numbers => "numbers",
            Feature::PlaceName => "placeName",
            Feature::PossibleChapter => "possible_chapter",
            Feature::PossibleEditor => "possible_editor",
            Feature::PublisherName => "publisherName",
            Feature::Punct => "punct",
            Feature::Toklcnp => "toklcnp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Feature::all().into_iter().find(|f| f.name() == name)
    }

    /// Função registrada para esta feature.
    pub fn function(&self) -> FeatureFn {
        match self {
            Feature::AIsInDict => a_is_in_dict,
            Feature::Capitalization => capitalization,
            Feature::FemaleName => female_name,
            Feature::First1Char => first_1_char,
            Feature::First2Chars => first_2_chars,
            Feature::First3Chars => first_3_chars,
            Feature::First4Chars => first_4_chars,
            Feature::First5Chars => first_5_chars,
            Feature::IsEtAl => is_et_al,
            Feature::IsIn => is_in,
            Feature::IsProceeding => is_proceeding,
            Feature::LastName => last_name,
            Feature::Last1Char => last_1_char,
            Feature::Last2Chars => last_2_chars,
            Feature::Last3Chars => last_3_chars,
            Feature::Last4Chars => last_4_chars,
            Feature::LastChar => last_char,
            Feature::Location => location,
            Feature::MaleName => male_name,
            Feature::MonthName => month_name,
            Feature::Numbers => numbers,
            Feature::PlaceName => place_name,
            Feature::PossibleChapter => possible_chapter,
            Feature::PossibleEditor => possible_editor,
            Feature::PublisherName => publisher_name,
            Feature::Punct => punct,
            Feature::Toklcnp => toklcnp,
        }
    }

    pub fn compute(&self, input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
        (self.function())(input, cache, idx)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordem de saída configurada + ordem (alfabética) de avaliação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOrder {
    output: Vec<Feature>,
    evaluation: Vec<Feature>,
}

impl FeatureOrder {
    /// Registro completo em ordem alfabética.
    pub fn alphabetical() -> Self {
        let mut all = Feature::all().to_vec();
        all.sort_by_key(|f| f.name());
        Self::from_features(all)
    }

    /// Valida uma lista de nomes contra o registro.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(CiteError::Config("feature_order vazio".to_string()));
        }
        let mut seen = HashSet::new();
        let mut output = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let feature = Feature::from_name(name)
                .ok_or_else(|| CiteError::Config(format!("feature desconhecida: {name}")))?;
            if !seen.insert(feature) {
                return Err(CiteError::Config(format!("feature repetida: {name}")));
            }
            output.push(feature);
        }
        Ok(Self::from_features(output))
    }

    fn from_features(output: Vec<Feature>) -> Self {
        let mut evaluation = output.clone();
        evaluation.sort_by_key(|f| f.name());
        Self { output, evaluation }
    }

    pub fn output(&self) -> &[Feature] {
        &self.output
    }

    pub fn evaluation(&self) -> &[Feature] {
        &self.evaluation
    }

    pub fn names(&self) -> Vec<String> {
        self.output.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Avalia em ordem alfabética e devolve os valores na ordem de saída.
    pub fn compute_row(&self, input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> Vec<String> {
        let mut values: HashMap<Feature, String> = HashMap::with_capacity(self.evaluation.len());
        for feature in &self.evaluation {
            values.insert(*feature, feature.compute(input, cache, idx));
        }
        self.output
            .iter()
            .map(|f| values.remove(f).unwrap_or_default())
            .collect()
    }
}

impl Default for FeatureOrder {
    fn default() -> Self {
        Self::alphabetical()
    }
}

/// Gera as linhas de features para toda a sequência, com um cache novo.
///
/// O índice `i` do retorno corresponde ao token `i` de `seq.tokens`.
pub fn extract_features(seq: &TokenSequence, dictionary: &Dictionary, order: &FeatureOrder) -> Vec<Vec<String>> {
    let input = FeatureInput::new(seq, dictionary);
    let mut cache = SequenceCache::new();
    (0..input.len())
        .map(|i| order.compute_row(&input, &mut cache, i))
        .collect()
}

// === Forma do token ===

fn last_char(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    match input.tokens[idx].chars().last() {
        Some(c) if c.is_ascii_lowercase() => "a".to_string(),
        Some(c) if c.is_ascii_uppercase() => "A".to_string(),
        Some(c) if c.is_ascii_digit() => "0".to_string(),
        Some(c) => c.to_string(),
        None => String::new(),
    }
}

fn first_chars(token: &str, n: usize) -> String {
    token.graphemes(true).take(n).collect()
}

fn last_chars(token: &str, n: usize) -> String {
    let graphemes: Vec<&str> = token.graphemes(true).collect();
    graphemes[graphemes.len().saturating_sub(n)..].concat()
}

fn first_1_char(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    first_chars(&input.tokens[idx], 1)
}

fn first_2_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    first_chars(&input.tokens[idx], 2)
}

fn first_3_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    first_chars(&input.tokens[idx], 3)
}

fn first_4_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    first_chars(&input.tokens[idx], 4)
}

fn first_5_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    first_chars(&input.tokens[idx], 5)
}

fn last_1_char(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    last_chars(&input.tokens[idx], 1)
}

fn last_2_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    last_chars(&input.tokens[idx], 2)
}

fn last_3_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    last_chars(&input.tokens[idx], 3)
}

fn last_4_chars(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    last_chars(&input.tokens[idx], 4)
}

fn toklcnp(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    input.lower[idx].clone()
}

fn capitalization(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let chars: Vec<char> = input.stripped[idx].chars().collect();
    let class = if chars.len() == 1 && chars[0].is_ascii_uppercase() {
        "singleCap"
    } else if chars.len() >= 2 && chars[0].is_ascii_uppercase() && chars[1].is_ascii_lowercase() {
        "InitCap"
    } else if !chars.is_empty() && chars.iter().all(|c| c.is_ascii_uppercase()) {
        "AllCap"
    } else {
        "others"
    };
    class.to_string()
}

fn numbers(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let token = &input.tokens[idx];
    let stripped = &input.stripped[idx];
    let all_digits = !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit());

    let class = if PAGE_RE.is_match(token) {
        "possiblePage"
    } else if YEAR_IN_TOKEN_RE.is_match(token) {
        "year"
    } else if VOLUME_RE.is_match(token) {
        "possibleVol"
    } else if YEAR_RE.is_match(stripped) {
        "year"
    } else if all_digits {
        match stripped.len() {
            1 => "1dig",
            2 => "2dig",
            3 => "3dig",
            _ => "4+dig",
        }
    } else if ORDINAL_RE.is_match(stripped) {
        "ordinal"
    } else if stripped.chars().any(|c| c.is_ascii_digit()) {
        "hasDig"
    } else {
        "nonNum"
    };
    class.to_string()
}

// === Contexto da sequência (memoizado) ===

fn has_editor(input: &FeatureInput<'_>, cache: &mut SequenceCache) -> bool {
    *cache
        .possible_editor
        .get_or_insert_with(|| input.lower.iter().any(|t| EDITOR_CUES.contains(&t.as_str())))
}

fn possible_editor(input: &FeatureInput<'_>, cache: &mut SequenceCache, _idx: usize) -> String {
    if has_editor(input, cache) {
        "possibleEditors".to_string()
    } else {
        "noEditors".to_string()
    }
}

// Editor presente + "In" precedido de pontuação: provável capítulo de livro
fn possible_chapter(input: &FeatureInput<'_>, cache: &mut SequenceCache, _idx: usize) -> String {
    let chapter = match cache.possible_chapter {
        Some(v) => v,
        None => {
            let v = has_editor(input, cache) && CHAPTER_RE.is_match(&input.tokens.join(" "));
            cache.possible_chapter = Some(v);
            v
        }
    };
    if chapter {
        "possibleChapter".to_string()
    } else {
        "noChapter".to_string()
    }
}

fn is_proceeding(input: &FeatureInput<'_>, cache: &mut SequenceCache, _idx: usize) -> String {
    let proc = *cache.is_proceeding.get_or_insert_with(|| {
        input
            .lower
            .iter()
            .any(|t| PROCEEDING_CUES.contains(&t.trim()))
    });
    if proc {
        "isProc".to_string()
    } else {
        "noProc".to_string()
    }
}

// === Contexto local ===

fn is_in(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let in_book = idx > 0
        && idx + 1 < input.len()
        && input.stripped[idx + 1]
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
        && input.lower[idx] == "in"
        && input.tokens[idx - 1]
            .chars()
            .any(|c| SEPARATORS_AND_QUOTES.contains(c));
    if in_book {
        "inBook".to_string()
    } else {
        "notInBook".to_string()
    }
}

fn is_et_al(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let lc = input.lower;
    let after_et = idx > 0 && lc[idx - 1] == "et" && lc[idx] == "al";
    let before_al = idx + 1 < lc.len() && lc[idx] == "et" && lc[idx + 1] == "al";
    if after_et || before_al {
        "isEtAl".to_string()
    } else {
        "noEtAl".to_string()
    }
}

/// Posição relativa em 11 baldes (0..=10).
fn location(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let bucket = ((idx as f64 / input.len() as f64) * 10.0).round() as u32;
    bucket.to_string()
}

fn punct(input: &FeatureInput<'_>, _cache: &mut SequenceCache, idx: usize) -> String {
    let token = &input.tokens[idx];
    let class = if LEAD_QUOTE_RE.is_match(token) {
        "leadQuote"
    } else if END_QUOTE_RE.is_match(token) {
        "endQuote"
    } else if MULTI_HYPHEN_RE.is_match(token) {
        "multiHyphen"
    } else if CONT_PUNCT_RE.is_match(token) {
        "contPunct"
    } else if STOP_PUNCT_RE.is_match(token) {
        "stopPunct"
    } else if BRACES_RE.is_match(token) {
        "braces"
    } else if PUNCT_VOLUME_RE.is_match(token) {
        "possibleVol"
    } else {
        "others"
    };
    class.to_string()
}

// === Dicionário ===

fn dict_status(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> u8 {
    match cache.dict_status {
        Some((cached_idx, mask)) if cached_idx == idx => mask,
        _ => {
            let mask = input.dictionary.lookup(&input.lower[idx]);
            cache.dict_status = Some((idx, mask));
            mask
        }
    }
}

fn a_is_in_dict(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_status(input, cache, idx).to_string()
}

fn dict_feature(
    input: &FeatureInput<'_>,
    cache: &mut SequenceCache,
    idx: usize,
    flag: DictFlag,
    name: &str,
) -> String {
    if dict_status(input, cache, idx) & flag.bit() > 0 {
        name.to_string()
    } else {
        let mut chars = name.chars();
        let capitalized: String = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .into_iter()
            .chain(chars)
            .collect();
        format!("no{capitalized}")
    }
}

fn publisher_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::PublisherName, "publisherName")
}

fn place_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::PlaceName, "placeName")
}

fn month_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::MonthName, "monthName")
}

fn last_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::LastName, "lastName")
}

fn female_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::FemaleName, "femaleName")
}

fn male_name(input: &FeatureInput<'_>, cache: &mut SequenceCache, idx: usize) -> String {
    dict_feature(input, cache, idx, DictFlag::MaleName, "maleName")
}
