//! # Algoritmo de Viterbi: Decodificação de Sequências CRF
//!
//! O algoritmo de Viterbi é um método de **programação dinâmica** que encontra
//! a sequência de labels mais provável de forma eficiente.
//!
//! ## Intuição
//!
//! Com 13 labels possíveis por token, uma busca exaustiva teria complexidade
//! `O(13^N)` para N tokens. O Viterbi explora que a **melhor sequência até o
//! token i com label t** depende apenas da **melhor sequência até o token i-1
//! com algum label anterior** → `O(N × T²)`.
//!
//! ## Algoritmo
//!
//! ```text
//! Inicialização: viterbi[0][t] = emission(t, x_0)
//!
//! Recursão: viterbi[i][t] = max_{t'} [viterbi[i-1][t'] + transition(t', t)] + emission(t, x_i)
//!
//! Backtracking: reconstrói o caminho ótimo de trás pra frente
//! ```
//!
//! A confiança de cada token é a softmax da coluna `viterbi[i]` avaliada no
//! label escolhido.

use serde::{Deserialize, Serialize};

use crate::crf::{compute_emission_scores, CrfModel};
use crate::error::TaggerError;

/// Resultado completo do Viterbi
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViterbiResult {
    /// Índices (em `model.labels`) do melhor caminho, um por token
    pub best_path: Vec<usize>,
    /// Score (não-normalizado) do melhor caminho
    pub best_score: f64,
    /// Confiança por token
    pub confidences: Vec<f64>,
}

/// Executa o algoritmo de Viterbi sobre as linhas de features de uma sequência
pub fn viterbi_decode(model: &CrfModel, rows: &[Vec<String>]) -> Result<ViterbiResult, TaggerError> {
    if rows.is_empty() {
        return Ok(ViterbiResult {
            best_path: vec![],
            best_score: 0.0,
            confidences: vec![],
        });
    }

    let n_tokens = rows.len();
    let n_labels = model.labels.len();
    if n_labels == 0 {
        return Err(TaggerError::DecodeFailed("modelo sem labels".to_string()));
    }

    // emission[i][t]
    let emission = compute_emission_scores(model, rows);

    // columns[i][t] = melhor score acumulado para o label t no token i
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n_tokens);
    let mut backptr: Vec<Vec<usize>> = vec![vec![0usize; n_labels]; n_tokens];

    // === Inicialização (token 0) ===
    columns.push(emission[0].clone());
    for (t, bp) in backptr[0].iter_mut().enumerate() {
        *bp = t;
    }

    // === Recursão (tokens 1..N-1) ===
    for i in 1..n_tokens {
        let prev = &columns[i - 1];
        let mut column = vec![f64::NEG_INFINITY; n_labels];

        for t in 0..n_labels {
            let mut best_prev_score = f64::NEG_INFINITY;
            let mut best_prev_label = 0;
            for (prev_t, &prev_score) in prev.iter().enumerate() {
                let score = prev_score + model.transition_score(prev_t, t);
                if score > best_prev_score {
                    best_prev_score = score;
                    best_prev_label = prev_t;
                }
            }
            column[t] = best_prev_score + emission[i][t];
            backptr[i][t] = best_prev_label;
        }

        columns.push(column);
    }

    if let Some(i) = columns.iter().position(|c| c.iter().any(|s| !s.is_finite())) {
        return Err(TaggerError::DecodeFailed(format!(
            "score não finito no token {i}"
        )));
    }

    // === Backtracking ===
    let (mut best_last, best_score) = best_in_slice(&columns[n_tokens - 1]);
    let mut best_path = vec![0usize; n_tokens];
    best_path[n_tokens - 1] = best_last;
    for i in (0..n_tokens - 1).rev() {
        best_last = backptr[i + 1][best_last];
        best_path[i] = best_last;
    }

    let confidences = columns
        .iter()
        .zip(&best_path)
        .map(|(column, &t)| scores_to_probs(column)[t])
        .collect();

    Ok(ViterbiResult {
        best_path,
        best_score,
        confidences,
    })
}

/// Retorna (índice, valor) do máximo em um slice
fn best_in_slice(scores: &[f64]) -> (usize, f64) {
    scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, &v)| (i, v))
        .unwrap_or((0, f64::NEG_INFINITY))
}

/// Converte scores Viterbi em probabilidades softmax (para confiança)
pub fn scores_to_probs(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return vec![];
    }
    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max_score).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    exps.iter().map(|e| e / sum).collect()
}
