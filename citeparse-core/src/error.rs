//! # Taxonomia de Erros
//!
//! Separa as falhas em três famílias, porque cada uma exige uma reação diferente:
//!
//! - **Marcação de treino inválida** ([`MarkupError`]): a linha do corpus é rejeitada
//!   com a string original anexada. Nunca é ignorada em silêncio.
//! - **Falha do tagger** ([`TaggerError`]): linha de features rejeitada ou decodificação
//!   impossível. Normalmente indica alfabeto de features/labels incompatível com o modelo.
//! - **Falhas sistêmicas** (modelo ausente, configuração inválida): abortam na carga.
//!
//! Casos estranhos de normalização (páginas sem números, volume sem dígitos)
//! não são erros: o campo passa inalterado.

use std::path::PathBuf;

use thiserror::Error;

/// Resultado padrão do crate.
pub type Result<T> = std::result::Result<T, CiteError>;

/// Erro de topo do pipeline de citações.
#[derive(Error, Debug)]
pub enum CiteError {
    /// Linha de treino com marcação `<label>...</label>` malformada.
    #[error("marcação de treino inválida ({kind}) na linha: {line}")]
    Training { line: String, kind: MarkupError },

    #[error("falha no tagger: {0}")]
    Tagger(#[from] TaggerError),

    #[error("erro de configuração: {0}")]
    Config(String),

    #[error("modelo não encontrado em {}", .0.display())]
    ModelNotFound(PathBuf),

    /// O artefato existe mas o alfabeto de labels/features difere do configurado.
    #[error("modelo incompatível: {0}")]
    ModelMismatch(String),

    #[error("erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("erro de TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("erro ao serializar XML: {0}")]
    Xml(String),
}

/// Violações da gramática de marcação do corpus de treino.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("tag <{open}> fechada por </{close}>")]
    TagMismatch { open: String, close: String },

    #[error("tag <{inner}> aberta dentro de <{open}>")]
    NestedTag { open: String, inner: String },

    #[error("tag </{0}> fechada sem abertura")]
    UnexpectedClose(String),

    #[error("tag <{0}> não terminada")]
    Unterminated(String),

    #[error("token {0:?} fora de qualquer tag")]
    UntaggedToken(String),

    #[error("label desconhecido <{0}>")]
    UnknownLabel(String),
}

/// Falhas da sessão do tagger sequencial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaggerError {
    #[error("linha {index} rejeitada: esperadas {expected} features, recebidas {found}")]
    RowRejected {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("falha na decodificação da sequência: {0}")]
    DecodeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_error_mentions_line() {
        let err = CiteError::Training {
            line: "<author>Smith</title>".to_string(),
            kind: MarkupError::TagMismatch {
                open: "author".into(),
                close: "title".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("<author>Smith</title>"));
        assert!(msg.contains("</title>"));
    }

    #[test]
    fn test_tagger_error_converts() {
        let err: CiteError = TaggerError::DecodeFailed("NaN".into()).into();
        assert!(matches!(err, CiteError::Tagger(TaggerError::DecodeFailed(_))));
    }
}
