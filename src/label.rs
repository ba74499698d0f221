//! Typed search attributes on a data-set label.

use serde::{Deserialize, Serialize};

use crate::blocks::common::AttributeKind;
use crate::blocks::label_block::{AttributeSlot, LabelBlock};
use crate::catalog::{AttributeDef, STRUCTURAL};
use crate::error::{Result, WdmError};
use crate::retcode::{self, Retcode, OPTIONAL_ATTRIBUTE_BENIGN};

/// Value of one search attribute.
///
/// `NotPresent` marks an attribute the label does not carry; it is never
/// written, and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i32),
    Real(f32),
    Text(String),
    NotPresent,
}

impl AttributeValue {
    pub fn is_present(&self) -> bool {
        !matches!(self, AttributeValue::NotPresent)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            AttributeValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Parses `text` into a value of the type `def` declares.
    pub fn parse(def: &AttributeDef, text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let mismatch = || WdmError::AttributeTypeMismatch {
            name: def.name.clone(),
            expected: def.kind.describe(),
            value: text.to_string(),
        };
        match def.kind {
            AttributeKind::Int => trimmed.parse().map(AttributeValue::Int).map_err(|_| mismatch()),
            AttributeKind::Real => trimmed.parse().map(AttributeValue::Real).map_err(|_| mismatch()),
            AttributeKind::String => Ok(AttributeValue::Text(text.trim_end().to_string())),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Real(v) => write!(f, "{v}"),
            AttributeValue::Text(v) => f.write_str(v),
            AttributeValue::NotPresent => f.write_str("<not present>"),
        }
    }
}

/// Encodes `value` into the word-padded bytes stored in attribute space.
///
/// Strings keep their leading characters, lose trailing blanks and are right
/// padded with spaces to `def.len`; a string that does not fit is an error,
/// never truncated. Reals must be finite.
pub fn encode(def: &AttributeDef, value: &AttributeValue) -> Result<Vec<u8>> {
    let words = def.kind.words(def.len as usize);
    let mismatch = || WdmError::AttributeTypeMismatch {
        name: def.name.clone(),
        expected: def.kind.describe(),
        value: value.to_string(),
    };
    match (def.kind, value) {
        (AttributeKind::Int, AttributeValue::Int(v)) if words == 1 => Ok(v.to_le_bytes().to_vec()),
        (AttributeKind::Real, AttributeValue::Real(v)) if words == 1 => {
            if !v.is_finite() {
                return Err(mismatch());
            }
            Ok(v.to_le_bytes().to_vec())
        }
        // Integers are accepted where a real is expected.
        (AttributeKind::Real, AttributeValue::Int(v)) if words == 1 => {
            Ok((*v as f32).to_le_bytes().to_vec())
        }
        (AttributeKind::String, AttributeValue::Text(text)) => {
            let text = text.trim_end();
            if !text.is_ascii() {
                return Err(mismatch());
            }
            if text.len() > def.len as usize {
                return Err(WdmError::AttributeTooLong {
                    field: def.name.clone(),
                    value: text.to_string(),
                    max_len: def.len as usize,
                });
            }
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(4 * words, b' ');
            Ok(bytes)
        }
        _ => Err(mismatch()),
    }
}

/// Decodes attribute bytes according to the slot they were read from.
pub fn decode(slot: &AttributeSlot, bytes: &[u8]) -> Result<AttributeValue> {
    let word = |bytes: &[u8]| -> Result<[u8; 4]> {
        bytes
            .get(0..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(WdmError::TooShortBuffer {
                actual:   bytes.len(),
                expected: 4,
                file:     file!(),
                line:     line!(),
            })
    };
    Ok(match slot.kind {
        AttributeKind::Int => AttributeValue::Int(i32::from_le_bytes(word(bytes)?)),
        AttributeKind::Real => AttributeValue::Real(f32::from_le_bytes(word(bytes)?)),
        AttributeKind::String => {
            let len = (slot.len as usize).min(bytes.len());
            let text = String::from_utf8_lossy(&bytes[..len]);
            AttributeValue::Text(text.trim_end_matches([' ', '\0']).to_string())
        }
    })
}

impl LabelBlock {
    /// Reads attribute `def` from this label.
    ///
    /// # Returns
    /// The decoded value, or [`AttributeValue::NotPresent`] when the label has
    /// no slot for `def.index`.
    pub fn attribute(&self, def: &AttributeDef) -> Result<AttributeValue> {
        match self.get_raw(def.index) {
            Ok((slot, bytes)) => decode(&slot, bytes),
            Err(status) => {
                status.check(OPTIONAL_ATTRIBUTE_BENIGN, || {
                    format!("get attribute dsn={} name={}", self.dsn, def.name)
                })?;
                Ok(AttributeValue::NotPresent)
            }
        }
    }

    /// Integer attribute by index, `None` when absent.
    pub fn int_attribute(&self, index: u16) -> Result<Option<i32>> {
        self.typed_attribute(index, AttributeKind::Int, |v| v.as_int())
    }

    /// Real attribute by index, `None` when absent.
    pub fn real_attribute(&self, index: u16) -> Result<Option<f32>> {
        self.typed_attribute(index, AttributeKind::Real, |v| v.as_real())
    }

    fn typed_attribute<T>(
        &self,
        index: u16,
        kind: AttributeKind,
        pick: impl FnOnce(&AttributeValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let (slot, bytes) = match self.get_raw(index) {
            Ok(found) => found,
            Err(status) => {
                status.check(OPTIONAL_ATTRIBUTE_BENIGN, || {
                    format!("get attribute dsn={} index={index}", self.dsn)
                })?;
                return Ok(None);
            }
        };
        if slot.kind != kind {
            return Err(WdmError::engine(
                Retcode::new(retcode::TYPES_DO_NOT_MATCH),
                format!("get attribute dsn={} index={index} kind={}", self.dsn, slot.kind.describe()),
            ));
        }
        Ok(pick(&decode(&slot, bytes)?))
    }

    /// Writes attribute `def`; the label is unchanged when an error is returned.
    ///
    /// Attributes that fix the data layout (TCODE, TSSTEP, TSBYR, TGROUP)
    /// cannot be changed once the data set holds data.
    pub fn set_attribute(&mut self, def: &AttributeDef, value: &AttributeValue) -> Result<()> {
        if STRUCTURAL.contains(&def.index) && self.has_data() {
            return Err(WdmError::engine(
                Retcode::new(retcode::DATA_PRESENT),
                format!("set attribute dsn={} name={}", self.dsn, def.name),
            ));
        }
        let bytes = encode(def, value)?;
        self.put_raw(def.index, def.kind, def.len, &bytes)
            .check(&[], || format!("set attribute dsn={} name={} value={value}", self.dsn, def.name))
    }
}
