use std::collections::BTreeMap;

use serde::Serialize;

use crate::date::{TimeCode, WdmDate};
use crate::error::Result;
use crate::label::AttributeValue;

/// Which attributes [`describe_dsn`](crate::api::wdm::Wdm::describe_dsn) reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelection {
    /// The curated set; attributes the label lacks are reported as not present.
    #[default]
    Default,
    /// Every catalog attribute the label carries.
    All,
    /// Explicit names; aliases such as LOCATION are accepted.
    Names(Vec<String>),
}

impl AttributeSelection {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSelection::Names(names.into_iter().map(Into::into).collect())
    }
}

/// Attributes keyed by catalog name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Result of describing one data set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub dsn: i32,
    pub attributes: AttributeMap,
    pub tcode: Option<TimeCode>,
    /// Short frequency code of `tcode` (`D` for daily, `MS` for monthly, ...).
    pub tcode_name: Option<&'static str>,
    pub tsstep: Option<i32>,
    /// First stored value, `None` while the data set is empty.
    pub start_date: Option<WdmDate>,
    /// Last stored value.
    pub end_date: Option<WdmDate>,
    /// `start_date` as the six integer tuple stored on disk.
    pub llsdat: Option<[i32; 6]>,
    /// `end_date` as the six integer tuple stored on disk.
    pub lledat: Option<[i32; 6]>,
}

impl Description {
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(&crate::catalog::canonical_name(name))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Values read from a data set, with `None` for missing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub dsn: i32,
    /// Date of `values[0]`; `None` for an empty series.
    pub start: Option<WdmDate>,
    pub tcode: TimeCode,
    pub tsstep: i32,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Date of the last value.
    pub fn end(&self) -> Result<Option<WdmDate>> {
        match (self.start, self.values.len()) {
            (Some(start), n) if n > 0 => Ok(Some(start.advance(self.tcode, self.tsstep, n as i64 - 1)?)),
            _ => Ok(None),
        }
    }

    /// Date of every value, in order.
    pub fn dates(&self) -> Result<Vec<WdmDate>> {
        let Some(start) = self.start else {
            return Ok(Vec::new());
        };
        (0..self.values.len() as i64)
            .map(|i| start.advance(self.tcode, self.tsstep, i))
            .collect()
    }
}
