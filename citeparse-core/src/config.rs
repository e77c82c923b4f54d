//! # Configuração
//!
//! Arquivo TOML opcional, em cascata:
//!
//! 1. `<config_dir>/citeparse/config.toml` (plataforma)
//! 2. `.citeparse.toml` no diretório atual (sobrepõe o anterior)
//!
//! ```toml
//! [model]
//! path = "resources/model.json"
//! labels = ["author", "title", "date"]
//!
//! [features]
//! feature_order = ["toklcnp", "capitalization", "numbers"]
//!
//! [resources]
//! dictionary_path = "dict/parscit_dict.txt"
//! ```
//!
//! Todos os campos são opcionais. [`ConfigFile::resolve`] valida nomes de
//! labels e features e devolve os [`ParserSettings`] prontos; nomes
//! desconhecidos são erro fatal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CiteError, Result};
use crate::features::FeatureOrder;
use crate::tagger::Label;

/// Caminho padrão do artefato do modelo.
pub const DEFAULT_MODEL_PATH: &str = "resources/model.json";

/// Estrutura do TOML em disco.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub model: Option<ModelConfig>,
    pub features: Option<FeaturesConfig>,
    pub resources: Option<ResourcesConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: Option<String>,
    /// Alfabeto de labels esperado no modelo (padrão: todos).
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub feature_order: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    pub dictionary_path: Option<String>,
    pub journal_abbreviations_path: Option<String>,
    pub country_codes_path: Option<String>,
}

/// Configuração validada.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub model_path: PathBuf,
    pub labels: Vec<Label>,
    pub feature_order: FeatureOrder,
    pub dictionary_path: Option<PathBuf>,
    pub journal_abbreviations_path: Option<PathBuf>,
    pub country_codes_path: Option<PathBuf>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels: Label::all().to_vec(),
            feature_order: FeatureOrder::default(),
            dictionary_path: None,
            journal_abbreviations_path: None,
            country_codes_path: None,
        }
    }
}

impl ConfigFile {
    /// Valida e resolve os valores padrão.
    pub fn resolve(&self) -> Result<ParserSettings> {
        let model = self.model.clone().unwrap_or_default();
        let resources = self.resources.clone().unwrap_or_default();

        let labels = match &model.labels {
            Some(names) => names
                .iter()
                .map(|n| Label::from_name(n).ok_or_else(|| CiteError::Config(format!("label desconhecido: {n}"))))
                .collect::<Result<Vec<_>>>()?,
            None => Label::all().to_vec(),
        };

        let feature_order = match self.features.as_ref().and_then(|f| f.feature_order.as_ref()) {
            Some(names) => FeatureOrder::from_names(names)?,
            None => FeatureOrder::default(),
        };

        Ok(ParserSettings {
            model_path: PathBuf::from(model.path.as_deref().unwrap_or(DEFAULT_MODEL_PATH)),
            labels,
            feature_order,
            dictionary_path: resources.dictionary_path.map(PathBuf::from),
            journal_abbreviations_path: resources.journal_abbreviations_path.map(PathBuf::from),
            country_codes_path: resources.country_codes_path.map(PathBuf::from),
        })
    }
}

/// `<config_dir>/citeparse/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citeparse").join("config.toml"))
}

/// Carrega a cascata plataforma → diretório atual.
pub fn load_config() -> Result<ConfigFile> {
    let platform = match config_path() {
        Some(p) => load_from_path(&p)?,
        None => None,
    };
    let cwd = load_from_path(Path::new(".citeparse.toml"))?;

    Ok(match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    })
}

/// `Ok(None)` se o arquivo não existe; TOML inválido é erro.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&content)?;
    debug!(path = %path.display(), "configuração carregada");
    Ok(Some(config))
}

fn pick<T: Clone>(overlay: Option<&T>, base: Option<&T>) -> Option<T> {
    overlay.or(base).cloned()
}

/// Junta duas configurações: valores de `overlay` têm precedência.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bm, om) = (base.model.unwrap_or_default(), overlay.model.unwrap_or_default());
    let (bf, of) = (base.features.unwrap_or_default(), overlay.features.unwrap_or_default());
    let (br, or) = (base.resources.unwrap_or_default(), overlay.resources.unwrap_or_default());

    ConfigFile {
        model: Some(ModelConfig {
            path: pick(om.path.as_ref(), bm.path.as_ref()),
            labels: pick(om.labels.as_ref(), bm.labels.as_ref()),
        }),
        features: Some(FeaturesConfig {
            feature_order: pick(of.feature_order.as_ref(), bf.feature_order.as_ref()),
        }),
        resources: Some(ResourcesConfig {
            dictionary_path: pick(or.dictionary_path.as_ref(), br.dictionary_path.as_ref()),
            journal_abbreviations_path: pick(
                or.journal_abbreviations_path.as_ref(),
                br.journal_abbreviations_path.as_ref(),
            ),
            country_codes_path: pick(or.country_codes_path.as_ref(), br.country_codes_path.as_ref()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_resolves_defaults() {
        let settings = ConfigFile::default().resolve().unwrap();
        assert_eq!(settings.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(settings.labels.len(), Label::COUNT);
        assert_eq!(settings.feature_order.len(), Feature::COUNT);
        assert!(settings.dictionary_path.is_none());
    }

    #[test]
    fn test_resolve_validates_names() {
        let config: ConfigFile = toml::from_str(
            r#"
            [model]
            labels = ["author", "title"]
            [features]
            feature_order = ["toklcnp", "numbers"]
            "#,
        )
        .unwrap();
        let settings = config.resolve().unwrap();
        assert_eq!(settings.labels, vec![Label::Author, Label::Title]);
        assert_eq!(settings.feature_order.names(), vec!["toklcnp", "numbers"]);

        let bad: ConfigFile = toml::from_str("[features]\nfeature_order = [\"shoe_size\"]\n").unwrap();
        assert!(matches!(bad.resolve(), Err(CiteError::Config(_))));
        let bad: ConfigFile = toml::from_str("[model]\nlabels = [\"year\"]\n").unwrap();
        assert!(matches!(bad.resolve(), Err(CiteError::Config(_))));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("missing.toml")).unwrap().is_none());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\npath = \"/tmp/m.json\"\n").unwrap();
        let config = load_from_path(&path).unwrap().unwrap();
        assert_eq!(config.model.unwrap().path.as_deref(), Some("/tmp/m.json"));

        std::fs::write(&path, "[model\npath = ").unwrap();
        assert!(matches!(load_from_path(&path), Err(CiteError::Toml(_))));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base: ConfigFile = toml::from_str(
            "[model]\npath = \"base.json\"\nlabels = [\"author\"]\n[resources]\ndictionary_path = \"d.txt\"\n",
        )
        .unwrap();
        let overlay: ConfigFile = toml::from_str("[model]\npath = \"local.json\"\n").unwrap();
        let merged = merge(base, overlay);
        let model = merged.model.unwrap();
        assert_eq!(model.path.as_deref(), Some("local.json"));
        assert_eq!(model.labels, Some(vec!["author".to_string()]));
        assert_eq!(merged.resources.unwrap().dictionary_path.as_deref(), Some("d.txt"));
    }
}
