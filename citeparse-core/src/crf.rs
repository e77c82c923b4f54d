//! # CRF: Conditional Random Field Linear-Chain
//!
//! Modelo treinado que rotula citações. O artefato é um arquivo JSON com:
//!
//! - `labels`: alfabeto de labels na ordem das linhas/colunas da matriz de transição
//! - `features`: nomes das features na ordem das colunas de cada linha
//! - `emission_weights`: `"feature=valor|label"` → peso
//! - `transition_weights`: matriz `label_anterior × label_seguinte`
//!
//! ## Score
//!
//! ```text
//! score(y, x) = Σ_i [emission(y_i, x_i) + transition(y_{i-1}, y_i)]
//! emission(y, x_i) = Σ_k w["feature_k=valor_k|y"]
//! ```
//!
//! Como todas as features são categóricas, cada coluna ativa exatamente um peso
//! por label. A decodificação fica em [`crate::viterbi`].
//!
//! ## Sessão
//!
//! [`CrfTagger`] é a sessão barata usada por sequência: compartilha o modelo via
//! `Arc` e guarda apenas as linhas e o resultado da sequência atual.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CiteError, Result, TaggerError};
use crate::tagger::{Label, SequenceTagger};
use crate::viterbi::{viterbi_decode, ViterbiResult};

/// Modelo CRF com pesos aprendidos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrfModel {
    pub labels: Vec<Label>,
    pub features: Vec<String>,
    /// Pesos de emissão: ("feature=valor" + "|" + label) → f64
    pub emission_weights: HashMap<String, f64>,
    /// Pesos de transição: indexed by [prev_label_idx][next_label_idx]
    pub transition_weights: Vec<Vec<f64>>,
}

impl CrfModel {
    /// Modelo com pesos zerados sobre o alfabeto completo de labels.
    pub fn new(features: Vec<String>) -> Self {
        Self::with_labels(Label::all().to_vec(), features)
    }

    pub fn with_labels(labels: Vec<Label>, features: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            features,
            emission_weights: HashMap::new(),
            transition_weights: vec![vec![0.0f64; n]; n],
        }
    }

    /// Carrega o artefato. Falha cedo se o arquivo não existir ou estiver inconsistente.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CiteError::ModelNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let model: CrfModel = serde_json::from_str(&content)?;
        model.check_dimensions()?;
        info!(
            path = %path.display(),
            labels = model.labels.len(),
            features = model.features.len(),
            weights = model.emission_weights.len(),
            "modelo CRF carregado"
        );
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "modelo CRF salvo");
        Ok(())
    }

    fn check_dimensions(&self) -> Result<()> {
        let n = self.labels.len();
        if self.transition_weights.len() != n || self.transition_weights.iter().any(|row| row.len() != n) {
            return Err(CiteError::ModelMismatch(format!(
                "matriz de transição não é {n}x{n}"
            )));
        }
        Ok(())
    }

    /// Confere o alfabeto do modelo contra a configuração.
    ///
    /// Labels são comparados como conjunto; features precisam estar na mesma ordem.
    pub fn validate(&self, labels: &[Label], features: &[String]) -> Result<()> {
        let mut expected = labels.to_vec();
        expected.sort();
        let mut found = self.labels.clone();
        found.sort();
        if expected != found {
            let names = |ls: &[Label]| ls.iter().map(|l| l.name()).collect::<Vec<_>>().join(",");
            return Err(CiteError::ModelMismatch(format!(
                "labels esperados [{}], modelo tem [{}]",
                names(&expected),
                names(&found)
            )));
        }
        self.validate_features(features)
    }

    /// Só a ordem de features; o alfabeto de labels fica a cargo do modelo.
    pub fn validate_features(&self, features: &[String]) -> Result<()> {
        if self.features != features {
            return Err(CiteError::ModelMismatch(format!(
                "features esperadas [{}], modelo tem [{}]",
                features.join(","),
                self.features.join(",")
            )));
        }
        Ok(())
    }

    pub fn label_index(&self, label: Label) -> Option<usize> {
        self.labels.iter().position(|l| *l == label)
    }

    /// Score de emissão do label `label_idx` para uma linha de valores.
    pub fn emission_score(&self, row: &[String], label_idx: usize) -> f64 {
        let label = self.labels[label_idx].name();
        self.features
            .iter()
            .zip(row)
            .map(|(feature, value)| {
                let key = format!("{feature}={value}|{label}");
                self.emission_weights.get(&key).copied().unwrap_or(0.0)
            })
            .sum()
    }

    pub fn transition_score(&self, prev: usize, next: usize) -> f64 {
        self.transition_weights[prev][next]
    }

    /// Configura um peso de emissão
    pub fn set_emission(&mut self, feature: &str, value: &str, label: Label, weight: f64) {
        let key = format!("{feature}={value}|{}", label.name());
        self.emission_weights.insert(key, weight);
    }

    /// Configura um peso de transição (ignorado se algum label não estiver no modelo)
    pub fn set_transition(&mut self, from: Label, to: Label, weight: f64) {
        if let (Some(i), Some(j)) = (self.label_index(from), self.label_index(to)) {
            self.transition_weights[i][j] = weight;
        }
    }
}

/// Calcula os scores de emissão para todos os tokens e labels
pub fn compute_emission_scores(model: &CrfModel, rows: &[Vec<String>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| (0..model.labels.len()).map(|t| model.emission_score(row, t)).collect())
        .collect()
}

/// Sessão de tagging sobre um [`CrfModel`] compartilhado.
#[derive(Debug, Clone)]
pub struct CrfTagger {
    model: Arc<CrfModel>,
    rows: Vec<Vec<String>>,
    result: Option<ViterbiResult>,
}

impl CrfTagger {
    pub fn new(model: Arc<CrfModel>) -> Self {
        Self {
            model,
            rows: Vec::new(),
            result: None,
        }
    }

    pub fn model(&self) -> &CrfModel {
        &self.model
    }

    /// Score total da última sequência decodificada.
    pub fn best_score(&self) -> Option<f64> {
        self.result.as_ref().map(|r| r.best_score)
    }
}

impl SequenceTagger for CrfTagger {
    fn clear(&mut self) {
        self.rows.clear();
        self.result = None;
    }

    fn add(&mut self, row: &[String]) -> std::result::Result<(), TaggerError> {
        let expected = self.model.features.len();
        if row.len() != expected {
            return Err(TaggerError::RowRejected {
                index: self.rows.len(),
                expected,
                found: row.len(),
            });
        }
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn parse(&mut self) -> std::result::Result<(), TaggerError> {
        self.result = Some(viterbi_decode(&self.model, &self.rows)?);
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn label(&self, i: usize) -> Option<Label> {
        let result = self.result.as_ref()?;
        result.best_path.get(i).map(|&t| self.model.labels[t])
    }

    fn confidence(&self, i: usize) -> f64 {
        self.result
            .as_ref()
            .and_then(|r| r.confidences.get(i).copied())
            .unwrap_or(0.0)
    }
}
