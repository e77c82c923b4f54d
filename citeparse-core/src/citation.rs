//! # Registro de Citação
//!
//! Forma tipada do mapa de campos normalizado. Só as colunas conhecidas são
//! mantidas; `author` (texto cru) e `date` são descartados em favor de
//! `authors` e `year`.
//!
//! ## Validade
//!
//! Uma citação é considerada válida quando tem:
//!
//! - autores **e** ano, ou
//! - local ou booktitle **e** ano, ou
//! - título.
//!
//! ## XML
//!
//! [`Citation::to_xml`] gera:
//!
//! ```xml
//! <citation valid="true">
//!   <authors><author>W H Enright</author></authors>
//!   <title>…</title> … <year>1978</year>
//!   <raw_string>…</raw_string>
//! </citation>
//! ```

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use crate::assembler::{FieldMap, AUTHORS, CONTEXTS, RAW_STRING};
use crate::error::{CiteError, Result};
use crate::preprocessor::MarkerType;

/// Registro estruturado de uma citação.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub raw_string: String,
    pub authors: Vec<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub publisher: Option<String>,
    pub location: Option<String>,
    pub booktitle: Option<String>,
    pub journal: Option<String>,
    pub pages: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub contexts: Vec<String>,
    pub tech: Option<String>,
    pub institution: Option<String>,
    pub editor: Option<String>,
    pub note: Option<String>,
    pub marker_type: Option<MarkerType>,
    pub marker: Option<String>,
}

impl Citation {
    /// Constrói o registro a partir de um mapa já normalizado.
    ///
    /// Campos textuais vazios viram `None`; chaves desconhecidas são ignoradas.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let text = |key: &str| {
            fields
                .text(key)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            raw_string: fields.text(RAW_STRING).unwrap_or_default().to_string(),
            authors: fields.list(AUTHORS).to_vec(),
            title: text("title"),
            year: fields.text("year").and_then(|y| y.trim().parse().ok()),
            publisher: text("publisher"),
            location: text("location"),
            booktitle: text("booktitle"),
            journal: text("journal"),
            pages: text("pages"),
            volume: text("volume"),
            number: text("number"),
            contexts: fields.list(CONTEXTS).to_vec(),
            tech: text("tech"),
            institution: text("institution"),
            editor: text("editor"),
            note: text("note"),
            marker_type: None,
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker_type: MarkerType, marker: impl Into<String>) -> Self {
        self.marker_type = Some(marker_type);
        self.marker = Some(marker.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        let has_year = self.year.is_some();
        (!self.authors.is_empty() && has_year)
            || ((self.location.is_some() || self.booktitle.is_some()) && has_year)
            || self.title.is_some()
    }

    /// Campos simples na ordem em que aparecem no XML.
    fn xml_fields(&self) -> [(&'static str, Option<String>); 13] {
        [
            ("title", self.title.clone()),
            ("journal", self.journal.clone()),
            ("booktitle", self.booktitle.clone()),
            ("editor", self.editor.clone()),
            ("volume", self.volume.clone()),
            ("publisher", self.publisher.clone()),
            ("institution", self.institution.clone()),
            ("location", self.location.clone()),
            ("number", self.number.clone()),
            ("pages", self.pages.clone()),
            ("year", self.year.map(|y| y.to_string())),
            ("tech", self.tech.clone()),
            ("note", self.note.clone()),
        ]
    }

    /// Serializa o registro como XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        let valid = if self.is_valid() { "true" } else { "false" };
        emit(&mut writer, Event::Start(BytesStart::new("citation").with_attributes([("valid", valid)])))?;

        emit(&mut writer, Event::Start(BytesStart::new("authors")))?;
        for author in &self.authors {
            write_element(&mut writer, "author", author)?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("authors")))?;

        for (name, value) in self.xml_fields() {
            if let Some(value) = value {
                write_element(&mut writer, name, &value)?;
            }
        }

        if !self.contexts.is_empty() {
            emit(&mut writer, Event::Start(BytesStart::new("contexts")))?;
            for context in &self.contexts {
                write_element(&mut writer, "context", context)?;
            }
            emit(&mut writer, Event::End(BytesEnd::new("contexts")))?;
        }

        if let Some(marker) = &self.marker {
            write_element(&mut writer, "marker", marker)?;
        }
        write_element(&mut writer, "raw_string", &self.raw_string)?;
        emit(&mut writer, Event::End(BytesEnd::new("citation")))?;

        String::from_utf8(writer.into_inner().into_inner()).map_err(|e| CiteError::Xml(e.to_string()))
    }
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| CiteError::Xml(e.to_string()))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enright_fields() -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert_text(RAW_STRING, "W. H. Enright. Improving the efficiency. 1978.");
        fields.insert_text("author", "W. H. Enright.");
        fields.insert_list(AUTHORS, vec!["W H Enright".to_string()]);
        fields.insert_text("title", "Improving the efficiency");
        fields.insert_text("date", "1978");
        fields.insert_text("year", "1978");
        fields.insert_text("volume", "4");
        fields.insert_text("number", "2");
        fields.insert_text("shoe_size", "42");
        fields.insert_list(CONTEXTS, vec![]);
        fields
    }

    #[test]
    fn test_from_fields_keeps_columns() {
        let citation = Citation::from_fields(&enright_fields());
        assert_eq!(citation.authors, vec!["W H Enright"]);
        assert_eq!(citation.year, Some(1978));
        assert_eq!(citation.volume.as_deref(), Some("4"));
        assert_eq!(citation.number.as_deref(), Some("2"));
        assert!(citation.journal.is_none());
        assert!(citation.contexts.is_empty());
    }

    #[test]
    fn test_validity_rules() {
        let mut c = Citation::default();
        assert!(!c.is_valid());
        c.year = Some(1999);
        assert!(!c.is_valid());
        c.authors = vec!["J Smith".into()];
        assert!(c.is_valid());

        let c = Citation {
            booktitle: Some("Proc. X".into()),
            year: Some(2001),
            ..Default::default()
        };
        assert!(c.is_valid());

        let c = Citation {
            title: Some("On Widgets".into()),
            ..Default::default()
        };
        assert!(c.is_valid());
    }

    #[test]
    fn test_empty_text_is_absent() {
        let mut fields = FieldMap::new();
        fields.insert_text("title", "");
        assert!(Citation::from_fields(&fields).title.is_none());
    }

    #[test]
    fn test_to_xml_layout() {
        let citation = Citation::from_fields(&enright_fields()).with_marker(MarkerType::Square, "[1]");
        let xml = citation.to_xml().unwrap();
        assert!(xml.starts_with(r#"<citation valid="true"><authors><author>W H Enright</author></authors>"#));
        let title = xml.find("<title>").unwrap();
        let volume = xml.find("<volume>").unwrap();
        let number = xml.find("<number>").unwrap();
        let year = xml.find("<year>").unwrap();
        assert!(title < volume && volume < number && number < year);
        assert!(xml.contains("<marker>[1]</marker>"));
        assert!(!xml.contains("<contexts>"));
        assert!(xml.ends_with("</raw_string></citation>"));
    }

    #[test]
    fn test_to_xml_escapes_text() {
        let citation = Citation {
            raw_string: "Smith & Jones <1999>".into(),
            ..Default::default()
        };
        let xml = citation.to_xml().unwrap();
        assert!(xml.contains(r#"valid="false""#));
        assert!(xml.contains("Smith &amp; Jones &lt;1999&gt;"));
    }

    #[test]
    fn test_json_roundtrip_shape() {
        let citation = Citation::from_fields(&enright_fields());
        let json = serde_json::to_value(&citation).unwrap();
        assert_eq!(json["year"], 1978);
        assert_eq!(json["authors"][0], "W H Enright");
    }
}
