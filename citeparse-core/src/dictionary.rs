//! # Dicionário de Nomes, Lugares, Meses e Editoras
//!
//! Lista de palavras carregada uma única vez na inicialização e compartilhada
//! (somente leitura) entre todas as sequências. Cada palavra recebe uma máscara
//! de bits indicando a que categorias pertence:
//!
//! | Seção do arquivo  | Bit |
//! |-------------------|-----|
//! | `## Male`         | 1   |
//! | `## Female`       | 2   |
//! | `## Last`         | 4   |
//! | `## Chinese`      | 4   |
//! | `## Months`       | 8   |
//! | `## Place`        | 16  |
//! | `## Publisher`    | 32  |
//!
//! Uma palavra que aparece em várias seções acumula os bits (ex: "thomas" é
//! nome masculino e sobrenome → 5).

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;

const BUILTIN_DICT: &str = include_str!("../resources/parscit_dict.txt");

/// Categorias do dicionário e seus bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictFlag {
    MaleName,
    FemaleName,
    LastName,
    MonthName,
    PlaceName,
    PublisherName,
}

impl DictFlag {
    pub fn bit(&self) -> u8 {
        match self {
            DictFlag::MaleName => 1,
            DictFlag::FemaleName => 2,
            DictFlag::LastName => 4,
            DictFlag::MonthName => 8,
            DictFlag::PlaceName => 16,
            DictFlag::PublisherName => 32,
        }
    }

    /// Seção `## Xxx` → bit. Seções desconhecidas são comentários.
    fn from_section(line: &str) -> Option<u8> {
        let section = line.trim_start_matches('#').trim_start();
        let flag = if section.starts_with("Male") {
            DictFlag::MaleName
        } else if section.starts_with("Female") {
            DictFlag::FemaleName
        } else if section.starts_with("Last") || section.starts_with("Chinese") {
            DictFlag::LastName
        } else if section.starts_with("Months") {
            DictFlag::MonthName
        } else if section.starts_with("Place") {
            DictFlag::PlaceName
        } else if section.starts_with("Publisher") {
            DictFlag::PublisherName
        } else {
            return None;
        };
        Some(flag.bit())
    }
}

/// Dicionário imutável palavra → máscara de bits.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, u8>,
}

impl Dictionary {
    /// Dicionário embutido no crate.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_DICT)
    }

    /// Carrega uma lista externa no mesmo formato.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "carregando dicionário externo");
        Ok(Self::parse(&content))
    }

    /// Interpreta o texto da lista de palavras.
    pub fn parse(content: &str) -> Self {
        let mut entries: HashMap<String, u8> = HashMap::new();
        let mut mode: Option<u8> = None;

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("##") {
                if let Some(bit) = DictFlag::from_section(line) {
                    mode = Some(bit);
                    continue;
                }
            }
            if line.starts_with('#') {
                continue;
            }

            // Entrada pode vir como "palavra\tprobabilidade"
            let key = line.split('\t').next().unwrap_or(line).trim();
            match mode {
                Some(bit) => {
                    *entries.entry(key.to_lowercase()).or_insert(0) |= bit;
                }
                None => {
                    warn!(line = line_no + 1, entry = key, "entrada de dicionário fora de seção ignorada");
                }
            }
        }

        Self { entries }
    }

    /// Máscara da palavra (0 se ausente).
    pub fn lookup(&self, word: &str) -> u8 {
        self.entries.get(word).copied().unwrap_or(0)
    }

    pub fn contains(&self, word: &str, flag: DictFlag) -> bool {
        self.lookup(word) & flag.bit() > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
