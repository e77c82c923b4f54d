//! Fluxo completo: modelo em disco → parser → registro → classificação.

use std::io::Cursor;

use citeparse_core::{
    CiteError, CitationParser, CrfModel, FeatureOrder, Label, MarkerType, ParserSettings, ReferentFormat,
};
use tempfile::tempdir;

const FEATURES: [&str; 3] = ["capitalization", "numbers", "toklcnp"];
const ARTICLE: &str = "Smith, J. On Widgets. ACM Trans. Gadgets, 4(2), 12-19, 1999.";

fn trained_model() -> CrfModel {
    let mut model = CrfModel::new(FEATURES.iter().map(|f| f.to_string()).collect());
    for word in ["smith", "j"] {
        model.set_emission("toklcnp", word, Label::Author, 5.0);
    }
    for word in ["on", "widgets"] {
        model.set_emission("toklcnp", word, Label::Title, 5.0);
    }
    for word in ["acm", "trans", "gadgets"] {
        model.set_emission("toklcnp", word, Label::Journal, 5.0);
    }
    model.set_emission("numbers", "possibleVol", Label::Volume, 5.0);
    model.set_emission("numbers", "possiblePage", Label::Pages, 5.0);
    model.set_emission("numbers", "year", Label::Date, 5.0);
    model
}

fn parser_from_disk() -> CitationParser {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.json");
    trained_model().save(&path).unwrap();

    let settings = ParserSettings {
        model_path: path,
        feature_order: FeatureOrder::from_names(&FEATURES).unwrap(),
        ..Default::default()
    };
    CitationParser::from_settings(&settings).unwrap()
}

#[test]
fn test_article_end_to_end() {
    let parser = parser_from_disk();
    let citation = parser.parse_citation(ARTICLE).unwrap();

    assert_eq!(citation.authors, vec!["J Smith"]);
    assert_eq!(citation.title.as_deref(), Some("On Widgets"));
    assert_eq!(citation.journal.as_deref(), Some("ACM Trans. Gadgets"));
    assert_eq!(citation.volume.as_deref(), Some("4"));
    assert_eq!(citation.number.as_deref(), Some("2"));
    assert_eq!(citation.pages.as_deref(), Some("12--19"));
    assert_eq!(citation.year, Some(1999));
    assert!(citation.is_valid());

    let referent = parser.classify(&citation);
    assert_eq!(referent.format, ReferentFormat::Journal);
    assert_eq!(referent.get("stitle"), Some("ACM Trans. Gadgets"));
    assert_eq!(referent.get("genre"), Some("article"));
    assert_eq!(referent.get("spage"), Some("12"));
    assert_eq!(referent.get("epage"), Some("19"));
    assert_eq!(referent.get("date"), Some("1999"));
    assert_eq!(referent.values("au"), ["J Smith"]);
}

#[test]
fn test_xml_and_json_output() {
    let citation = parser_from_disk().parse_citation(ARTICLE).unwrap();

    let xml = citation.to_xml().unwrap();
    assert!(xml.starts_with(r#"<citation valid="true">"#));
    assert!(xml.contains("<journal>ACM Trans. Gadgets</journal>"));
    assert!(xml.contains(&format!("<raw_string>{ARTICLE}</raw_string>")));

    let json = serde_json::to_value(&citation).unwrap();
    assert_eq!(json["pages"], "12--19");
    assert_eq!(json["year"], 1999);
}

#[test]
fn test_reference_section() {
    let section = "[1] Smith, J. On Widgets. ACM Trans.\nGadgets, 4(2), 12-19, 1999.\n\n  12\n[2] Smith, J. On Widgets. 1999.";
    let citations: Vec<_> = parser_from_disk()
        .parse_reference_section(section)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(citations.len(), 2);
    assert!(citations.iter().all(|c| c.marker_type == Some(MarkerType::Square)));
    assert_eq!(citations[0].raw_string, ARTICLE);
    assert_eq!(citations[1].marker.as_deref(), Some("[2]"));
    assert!(citations[1].journal.is_none());
}

#[test]
fn test_missing_model_is_reported() {
    let dir = tempdir().unwrap();
    let settings = ParserSettings {
        model_path: dir.path().join("nope.json"),
        ..Default::default()
    };
    assert!(matches!(
        CitationParser::from_settings(&settings),
        Err(CiteError::ModelNotFound(_))
    ));
}

#[test]
fn test_model_trained_with_other_features_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.json");
    trained_model().save(&path).unwrap();

    let settings = ParserSettings {
        model_path: path,
        feature_order: FeatureOrder::from_names(&["numbers", "capitalization", "toklcnp"]).unwrap(),
        ..Default::default()
    };
    assert!(matches!(
        CitationParser::from_settings(&settings),
        Err(CiteError::ModelMismatch(_))
    ));
}

#[test]
fn test_training_data_feeds_back_into_rows() {
    let parser = parser_from_disk();
    let corpus = "<author>Smith, J.</author> <title>On Widgets.</title> <date>1999.</date>\n";
    let mut out = Vec::new();
    assert_eq!(parser.write_training_data(Cursor::new(corpus), &mut out).unwrap(), 1);

    let text = String::from_utf8(out).unwrap();
    let rows: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.split(' ').count() == FEATURES.len() + 2));
    assert_eq!(rows[4], "1999. others year 1999 date");
}
