//! # Classificação do Referente
//!
//! Decide que tipo de obra uma [`Citation`] descreve e preenche os metadados
//! correspondentes (chaves no estilo OpenURL):
//!
//! ```text
//! booktitle?        → book          (au, btitle, atitle, pub, place, spage/epage, genre…)
//! journal?          → journal       (au, atitle, jtitle|stitle, volume, quarter, genre…)
//! tech ~ phd|dissertation → dissertation (au, title, inst, co, degree…)
//! tech ~ patent     → patent        (inventor, title, assignee, number, cc…)
//! senão             → unknown
//! ```
//!
//! As tabelas de abreviações de periódicos e de códigos de país são imutáveis,
//! construídas uma vez e compartilhadas.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::citation::Citation;
use crate::error::{CiteError, Result};

const BUILTIN_JOURNAL_ABBREVIATIONS: &str = include_str!("../resources/journal_abbreviations.txt");
const BUILTIN_COUNTRY_CODES: &str = include_str!("../resources/country_codes.txt");

static PAGE_SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^0-9]*([0-9]+)--([0-9]+)[^0-9]*$").unwrap());
static PROCEEDINGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(proceeding|conference|proc[. ])").unwrap());
static PREPRINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)pre[ -]?print").unwrap());
static DISSERTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(p\.?h\.?d\.?)|(dissertation)").unwrap());
static DEGREE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)p\.?h\.?d").unwrap());
static PATENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)patent").unwrap());
static PATENT_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9][ ,.-]*)+").unwrap());
static NON_LETTERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z]+").unwrap());

/// Tabelas auxiliares da classificação.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    journal_abbreviations: Option<Regex>,
    country_codes: HashSet<String>,
}

impl ReferenceTables {
    /// Tabelas embutidas no crate.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_JOURNAL_ABBREVIATIONS, BUILTIN_COUNTRY_CODES)
            .unwrap_or_else(|_| Self::empty())
    }

    /// Tabelas vazias: nenhum título é abreviação, nenhum código de país.
    pub fn empty() -> Self {
        Self {
            journal_abbreviations: None,
            country_codes: HashSet::new(),
        }
    }

    /// Carrega tabelas externas; `None` usa a tabela embutida.
    pub fn from_paths(journal_abbreviations: Option<&Path>, country_codes: Option<&Path>) -> Result<Self> {
        let journals = match journal_abbreviations {
            Some(path) => std::fs::read_to_string(path)?,
            None => BUILTIN_JOURNAL_ABBREVIATIONS.to_string(),
        };
        let countries = match country_codes {
            Some(path) => std::fs::read_to_string(path)?,
            None => BUILTIN_COUNTRY_CODES.to_string(),
        };
        Self::parse(&journals, &countries)
    }

    /// Uma entrada por linha; linhas vazias e `#` são ignoradas.
    pub fn parse(journal_abbreviations: &str, country_codes: &str) -> Result<Self> {
        let abbreviations: Vec<String> = entries(journal_abbreviations).map(regex::escape).collect();
        let journal_abbreviations = if abbreviations.is_empty() {
            None
        } else {
            let pattern = format!("(?i)[^A-Za-z](?:{})[^A-Za-z]", abbreviations.join("|"));
            Some(Regex::new(&pattern).map_err(|e| CiteError::Config(format!("abreviações inválidas: {e}")))?)
        };
        let country_codes: HashSet<String> = entries(country_codes).map(str::to_string).collect();
        debug!(
            abbreviations = abbreviations.len(),
            country_codes = country_codes.len(),
            "tabelas de referência carregadas"
        );
        Ok(Self {
            journal_abbreviations,
            country_codes,
        })
    }

    /// O título parece uma abreviação de periódico ("ACM Trans. Math. Softw.")?
    pub fn is_abbreviated_journal(&self, journal: &str) -> bool {
        self.journal_abbreviations
            .as_ref()
            .map(|re| re.is_match(&format!(" {journal} ")))
            .unwrap_or(false)
    }

    pub fn is_country_code(&self, code: &str) -> bool {
        self.country_codes.contains(code)
    }
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::builtin()
    }
}

fn entries(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// Tipo de obra referenciada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferentFormat {
    Book,
    Journal,
    Dissertation,
    Patent,
    Unknown,
}

impl ReferentFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ReferentFormat::Book => "book",
            ReferentFormat::Journal => "journal",
            ReferentFormat::Dissertation => "dissertation",
            ReferentFormat::Patent => "patent",
            ReferentFormat::Unknown => "unknown",
        }
    }
}

/// Formato + metadados (chave → valores).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referent {
    pub format: ReferentFormat,
    pub metadata: BTreeMap<String, Vec<String>>,
}

impl Referent {
    fn new(format: ReferentFormat) -> Self {
        Self {
            format,
            metadata: BTreeMap::new(),
        }
    }

    /// Primeiro valor da chave.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.metadata.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn set(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), vec![value.to_string()]);
        }
    }

    fn set_list(&mut self, key: &str, values: &[String]) {
        if !values.is_empty() {
            self.metadata.insert(key.to_string(), values.to_vec());
        }
    }

    fn set_year(&mut self, key: &str, year: Option<u32>) {
        self.set(key, year.map(|y| y.to_string()).as_deref());
    }

    /// "127--136" → spage/epage; qualquer outra forma fica em `pages`.
    fn set_pages(&mut self, pages: Option<&str>) {
        let Some(pages) = pages else {
            return;
        };
        match PAGE_SPAN_RE.captures(pages) {
            Some(caps) => {
                self.set("spage", Some(&caps[1]));
                self.set("epage", Some(&caps[2]));
            }
            None => self.set("pages", Some(pages)),
        }
    }
}

/// Classifica a citação e monta os metadados do referente.
pub fn classify(citation: &Citation, tables: &ReferenceTables) -> Referent {
    if citation.booktitle.is_some() {
        return to_book(citation);
    }
    if let Some(journal) = &citation.journal {
        return to_journal(citation, journal, tables);
    }
    if let Some(tech) = &citation.tech {
        if DISSERTATION_RE.is_match(tech) {
            return to_dissertation(citation, tech);
        }
        if PATENT_RE.is_match(tech) {
            return to_patent(citation, tech, tables);
        }
    }
    Referent::new(ReferentFormat::Unknown)
}

fn has_title_or_pages(citation: &Citation) -> bool {
    citation.title.is_some() || citation.pages.is_some()
}

fn to_book(citation: &Citation) -> Referent {
    let mut r = Referent::new(ReferentFormat::Book);
    r.set_list("au", &citation.authors);
    r.set("btitle", citation.booktitle.as_deref());
    r.set_pages(citation.pages.as_deref());
    r.set("atitle", citation.title.as_deref());
    r.set("pub", citation.publisher.as_deref());
    r.set_year("date", citation.year);
    r.set("place", citation.location.as_deref());
    r.set("corp", citation.institution.as_deref());

    let in_proceedings = citation
        .booktitle
        .as_deref()
        .map(|b| PROCEEDINGS_RE.is_match(b))
        .unwrap_or(false);
    let genre = match (in_proceedings, has_title_or_pages(citation)) {
        (true, true) => "proceeding",
        (true, false) => "conference",
        (false, true) => "bookitem",
        (false, false) => "book",
    };
    r.set("genre", Some(genre));
    r
}

fn to_journal(citation: &Citation, journal: &str, tables: &ReferenceTables) -> Referent {
    let mut r = Referent::new(ReferentFormat::Journal);
    r.set("atitle", citation.title.as_deref());
    if tables.is_abbreviated_journal(journal) {
        r.set("stitle", Some(journal));
    } else {
        r.set("jtitle", Some(journal));
    }
    r.set_list("au", &citation.authors);
    r.set("corp", citation.institution.as_deref());
    r.set_year("date", citation.year);
    r.set("quarter", citation.number.as_deref());
    r.set("volume", citation.volume.as_deref());
    r.set_pages(citation.pages.as_deref());

    let preprint = citation
        .tech
        .as_deref()
        .map(|t| PREPRINT_RE.is_match(t))
        .unwrap_or(false);
    let genre = if preprint {
        "preprint"
    } else if has_title_or_pages(citation) {
        "article"
    } else if citation.number.is_some() || citation.volume.is_some() {
        "issue"
    } else {
        "journal"
    };
    r.set("genre", Some(genre));
    r
}

fn to_dissertation(citation: &Citation, tech: &str) -> Referent {
    let mut r = Referent::new(ReferentFormat::Dissertation);
    // Um único autor no formato; junta todos por garantia
    let au = citation.authors.join(" ");
    if !au.trim().is_empty() {
        r.set("au", Some(&au));
    }
    r.set("title", citation.title.as_deref());
    r.set("inst", citation.institution.as_deref());
    r.set_year("date", citation.year);
    r.set("co", citation.location.as_deref());
    r.set("degree", DEGREE_RE.find(tech).map(|m| m.as_str()));
    r
}

fn to_patent(citation: &Citation, tech: &str, tables: &ReferenceTables) -> Referent {
    let mut r = Referent::new(ReferentFormat::Patent);
    r.set_list("inventor", &citation.authors);
    r.set("title", citation.title.as_deref());
    r.set("assignee", citation.institution.as_deref());
    r.set_year("pubdate", citation.year);

    // "1 234 56", "1-23-423", "1.231.32", "5,123,456"
    let number = PATENT_NUMBER_RE
        .find(tech)
        .map(|m| m.as_str().trim())
        .filter(|n| !n.is_empty());
    r.set("number", number);

    let cc = NON_LETTERS_RE
        .split(tech)
        .find(|tok| tables.is_country_code(tok));
    r.set("cc", cc);
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ReferenceTables {
        ReferenceTables::builtin()
    }

    #[test]
    fn test_book_in_proceedings() {
        let c = Citation {
            authors: vec!["J Smith".into()],
            title: Some("On Widgets".into()),
            booktitle: Some("Proceedings of the 5th Workshop".into()),
            pages: Some("12--19".into()),
            year: Some(1999),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.format, ReferentFormat::Book);
        assert_eq!(r.get("genre"), Some("proceeding"));
        assert_eq!(r.get("spage"), Some("12"));
        assert_eq!(r.get("epage"), Some("19"));
        assert_eq!(r.get("date"), Some("1999"));
        assert_eq!(r.values("au"), ["J Smith"]);
    }

    #[test]
    fn test_book_genres() {
        let book = Citation {
            booktitle: Some("Big Book".into()),
            ..Default::default()
        };
        assert_eq!(classify(&book, &tables()).get("genre"), Some("book"));
        let conference = Citation {
            booktitle: Some("Conference on Things".into()),
            ..Default::default()
        };
        assert_eq!(classify(&conference, &tables()).get("genre"), Some("conference"));
        let item = Citation {
            booktitle: Some("Big Book".into()),
            pages: Some("pp. xi".into()),
            ..Default::default()
        };
        let r = classify(&item, &tables());
        assert_eq!(r.get("genre"), Some("bookitem"));
        assert_eq!(r.get("pages"), Some("pp. xi"));
    }

    #[test]
    fn test_journal_abbreviation_uses_stitle() {
        let c = Citation {
            title: Some("Improving the efficiency".into()),
            journal: Some("ACM Trans. Math. Softw".into()),
            volume: Some("4".into()),
            number: Some("2".into()),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.format, ReferentFormat::Journal);
        assert_eq!(r.get("stitle"), Some("ACM Trans. Math. Softw"));
        assert!(r.get("jtitle").is_none());
        assert_eq!(r.get("quarter"), Some("2"));
        assert_eq!(r.get("genre"), Some("article"));
    }

    #[test]
    fn test_journal_full_title_and_genres() {
        let c = Citation {
            journal: Some("Journal of Widgets".into()),
            volume: Some("3".into()),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.get("jtitle"), Some("Journal of Widgets"));
        assert_eq!(r.get("genre"), Some("issue"));

        let preprint = Citation {
            journal: Some("Journal of Widgets".into()),
            tech: Some("Preprint".into()),
            ..Default::default()
        };
        assert_eq!(classify(&preprint, &tables()).get("genre"), Some("preprint"));

        let bare = Citation {
            journal: Some("Journal of Widgets".into()),
            ..Default::default()
        };
        assert_eq!(classify(&bare, &tables()).get("genre"), Some("journal"));
    }

    #[test]
    fn test_dissertation() {
        let c = Citation {
            authors: vec!["J Smith".into()],
            title: Some("On Widgets".into()),
            tech: Some("PhD thesis".into()),
            institution: Some("MIT".into()),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.format, ReferentFormat::Dissertation);
        assert_eq!(r.get("degree"), Some("PhD"));
        assert_eq!(r.get("inst"), Some("MIT"));
        assert_eq!(r.get("au"), Some("J Smith"));
    }

    #[test]
    fn test_patent() {
        let c = Citation {
            authors: vec!["J Smith".into(), "K Jones".into()],
            tech: Some("US Patent 5,123,456".into()),
            year: Some(1994),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.format, ReferentFormat::Patent);
        assert_eq!(r.get("cc"), Some("US"));
        assert_eq!(r.get("number"), Some("5,123,456"));
        assert_eq!(r.values("inventor").len(), 2);
        assert_eq!(r.get("pubdate"), Some("1994"));
    }

    #[test]
    fn test_unknown() {
        let c = Citation {
            title: Some("On Widgets".into()),
            ..Default::default()
        };
        let r = classify(&c, &tables());
        assert_eq!(r.format, ReferentFormat::Unknown);
        assert!(r.metadata.is_empty());
    }

    #[test]
    fn test_custom_tables() {
        let tables = ReferenceTables::parse("Widget J.\n", "# códigos\nBR\n").unwrap();
        assert!(tables.is_abbreviated_journal("Widget J."));
        assert!(!tables.is_abbreviated_journal("ACM Trans."));
        assert!(tables.is_country_code("BR"));
        assert!(!ReferenceTables::empty().is_abbreviated_journal("Widget J."));
    }
}
