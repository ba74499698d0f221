//! Attribute catalog: canonical six character names to (index, kind, length).
//!
//! The legacy engine resolved names against a message WDM file shipped with
//! the library. Here the same table is compiled in, and a JSON file with the
//! same entries can replace it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blocks::common::AttributeKind;
use crate::error::{Result, WdmError};

/// Longest attribute name the catalog accepts.
pub const MAX_NAME_LEN: usize = 6;
/// Highest attribute index considered by an "all" description.
pub const MAX_INDEX: u16 = 450;

pub const TSTYPE: u16 = 1;
pub const STAID: u16 = 2;
pub const TCODE: u16 = 17;
pub const TSBYR: u16 = 27;
pub const TSFILL: u16 = 32;
pub const TSSTEP: u16 = 33;
pub const TGROUP: u16 = 34;
pub const STANAM: u16 = 45;
pub const COMPFG: u16 = 83;
pub const TSFORM: u16 = 84;
pub const VBTIME: u16 = 85;
pub const IDSCEN: u16 = 288;
pub const IDCONS: u16 = 289;
pub const IDLOCN: u16 = 290;

/// Attributes reported by a default description, in output order.
pub const DEFAULT_SET: [u16; 10] = [TSSTEP, TCODE, TSFILL, IDLOCN, IDSCEN, IDCONS, TSBYR, STANAM, TSTYPE, STAID];

/// Attributes that shape how data is laid out; they cannot change once data exists.
pub const STRUCTURAL: [u16; 4] = [TCODE, TSSTEP, TSBYR, TGROUP];

/// Friendly names accepted in place of catalog names.
const ALIASES: &[(&str, &str)] = &[
    ("LOCATION", "IDLOCN"),
    ("SCENARIO", "IDSCEN"),
    ("CONSTITUENT", "IDCONS"),
    ("TSTEP", "TSSTEP"),
    ("DESCRIPTION", "STANAM"),
    ("STATID", "STAID"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub index: u16,
    pub name: String,
    pub kind: AttributeKind,
    pub len: u8,
}

impl AttributeDef {
    fn new(index: u16, name: &str, kind: AttributeKind, len: u8) -> Self {
        AttributeDef { index, name: name.to_string(), kind, len }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeCatalog {
    entries: Vec<AttributeDef>,
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AttributeCatalog {
    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        use AttributeKind::{Int, Real, String};
        let entries = vec![
            AttributeDef::new(TSTYPE, "TSTYPE", String, 4),
            AttributeDef::new(STAID, "STAID", String, 16),
            AttributeDef::new(7, "ELEV", Real, 1),
            AttributeDef::new(8, "LATDEG", Real, 1),
            AttributeDef::new(9, "LNGDEG", Real, 1),
            AttributeDef::new(10, "DAREA", Real, 1),
            AttributeDef::new(TCODE, "TCODE", Int, 1),
            AttributeDef::new(TSBYR, "TSBYR", Int, 1),
            AttributeDef::new(TSFILL, "TSFILL", Real, 1),
            AttributeDef::new(TSSTEP, "TSSTEP", Int, 1),
            AttributeDef::new(TGROUP, "TGROUP", Int, 1),
            AttributeDef::new(STANAM, "STANAM", String, 48),
            AttributeDef::new(56, "STFIPS", Int, 1),
            AttributeDef::new(COMPFG, "COMPFG", Int, 1),
            AttributeDef::new(TSFORM, "TSFORM", Int, 1),
            AttributeDef::new(VBTIME, "VBTIME", Int, 1),
            AttributeDef::new(IDSCEN, "IDSCEN", String, 8),
            AttributeDef::new(IDCONS, "IDCONS", String, 8),
            AttributeDef::new(IDLOCN, "IDLOCN", String, 8),
        ];
        AttributeCatalog { entries }
    }

    /// Builds a catalog from explicit entries, rejecting duplicates and bad names.
    pub fn from_entries(mut entries: Vec<AttributeDef>) -> Result<Self> {
        entries.sort_by_key(|e| e.index);
        for pair in entries.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(WdmError::UnknownAttribute(format!(
                    "index {} is defined twice ({} and {})",
                    pair[0].index, pair[0].name, pair[1].name
                )));
            }
        }
        for entry in &mut entries {
            entry.name = entry.name.trim().to_ascii_uppercase();
            if entry.name.is_empty() || entry.name.len() > MAX_NAME_LEN || entry.len == 0 {
                return Err(WdmError::UnknownAttribute(entry.name.clone()));
            }
        }
        Ok(AttributeCatalog { entries })
    }

    /// Loads a JSON array of [`AttributeDef`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<AttributeDef> = serde_json::from_str(&text)?;
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[AttributeDef] {
        &self.entries
    }

    pub fn by_index(&self, index: u16) -> Option<&AttributeDef> {
        self.entries.iter().find(|e| e.index == index)
    }

    /// Index lookup that reports a missing entry as [`WdmError::UnknownAttribute`].
    pub fn require_index(&self, index: u16) -> Result<&AttributeDef> {
        self.by_index(index)
            .ok_or_else(|| WdmError::UnknownAttribute(format!("index {index}")))
    }

    /// Resolves a user supplied attribute name.
    ///
    /// The name is upper-cased and aliases (LOCATION, SCENARIO, ...) are
    /// mapped before lookup. Names longer than six characters after aliasing
    /// are rejected.
    pub fn resolve(&self, name: &str) -> Result<&AttributeDef> {
        let canonical = canonical_name(name);
        if canonical.is_empty() || canonical.len() > MAX_NAME_LEN {
            return Err(WdmError::UnknownAttribute(name.to_string()));
        }
        self.entries
            .iter()
            .find(|e| e.name == canonical)
            .ok_or_else(|| WdmError::UnknownAttribute(name.to_string()))
    }

    /// Catalog entries with index in `1..=MAX_INDEX`, ascending.
    pub fn all(&self) -> impl Iterator<Item = &AttributeDef> {
        self.entries
            .iter()
            .filter(|e| (1..=MAX_INDEX).contains(&e.index))
    }
}

/// Upper-cases `name` and applies the alias table.
pub fn canonical_name(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, target)| (*target).to_string())
        .unwrap_or(upper)
}
