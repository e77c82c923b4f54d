//! # citeparse-core: Extração de Citações Bibliográficas com CRF
//!
//! Este crate recebe a string de uma referência bibliográfica ("W. H. Enright.
//! Improving the efficiency of matrix operations… 1978.") e devolve um registro
//! estruturado com autores, título, ano, páginas, periódico e demais campos.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui por um pipeline linear:
//!
//! 1.  **Entrada**: string de citação (ou uma seção de referências inteira, via [`preprocessor`]).
//! 2.  **Tokenização** ([`tokenizer`]): divisão por espaços, preservando offsets.
//! 3.  **Extração de Features** ([`features`], [`dictionary`]): 27 features por token,
//!     em ordem configurável ([`sequence`]).
//! 4.  **Tagging** ([`tagger`], [`crf`], [`viterbi`]): um label por token.
//! 5.  **Montagem** ([`assembler`]): trechos do texto original agrupados por label.
//! 6.  **Normalização** ([`normalizer`]): autores, ano, volume, páginas.
//! 7.  **Saída**: [`Citation`] (JSON/XML) e, opcionalmente, um [`Referent`] classificado.
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use citeparse_core::CitationParser;
//!
//! // Lê .citeparse.toml (se houver) e carrega o modelo treinado
//! let parser = CitationParser::from_config()?;
//!
//! let citation = parser.parse_citation(
//!     "W. H. Enright. Improving the efficiency of matrix operations \
//!      in the numerical solution of stiff ordinary differential equations. \
//!      ACM Trans. Math. Softw., 4(2), 127-136, June 1978.",
//! )?;
//!
//! println!("{:?} ({:?})", citation.authors, citation.year);
//! println!("{}", citation.to_xml()?);
//! # Ok::<(), citeparse_core::CiteError>(())
//! ```
//!
//! ## Módulos Principais
//!
//! - [`parser`]: orquestrador que conecta todos os estágios.
//! - [`config`]: configuração TOML em cascata.
//! - [`referent`]: classificação em livro, periódico, tese ou patente.

pub mod assembler;
pub mod citation;
pub mod config;
pub mod crf;
pub mod dictionary;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod parser;
pub mod preprocessor;
pub mod referent;
pub mod sequence;
pub mod tagger;
pub mod tokenizer;
pub mod viterbi;

pub use assembler::{FieldMap, FieldValue};
pub use citation::Citation;
pub use config::ParserSettings;
pub use crf::{CrfModel, CrfTagger};
pub use error::{CiteError, MarkupError, Result, TaggerError};
pub use features::{Feature, FeatureOrder};
pub use parser::{CitationParser, ParseEvent};
pub use preprocessor::MarkerType;
pub use referent::{ReferenceTables, Referent, ReferentFormat};
pub use tagger::{Label, SequenceTagger, TaggedToken};
pub use tokenizer::{Token, TokenizerMode};
