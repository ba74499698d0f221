//! Legacy WDM status codes.
//!
//! Every record-level primitive reports a numeric status: `0` is success,
//! negative values are errors and small positive values are continuation
//! signals. The engine itself works with [`WdmError`] variants, but keeps
//! this table so that failures which have no richer variant can still be
//! reported with the historical code and text.

use crate::error::{Result, WdmError};

/// A raw status code as returned by the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Retcode(i32);

/// Status codes that an optional attribute read may return without failing.
pub const OPTIONAL_ATTRIBUTE_BENIGN: &[i32] = &[ATTRIBUTE_NOT_PRESENT];

pub const SUCCESS: i32 = 0;
pub const NO_DATA: i32 = -6;
pub const BAD_DATES: i32 = -8;
pub const OUT_OF_VALID_RANGE: i32 = -14;
pub const TIME_STEP_MISMATCH: i32 = -15;
pub const TYPES_DO_NOT_MATCH: i32 = -45;
pub const OLD_DSN_MISSING: i32 = -61;
pub const NEW_DSN_EXISTS: i32 = -62;
pub const DSN_EXISTS: i32 = -71;
pub const DSN_MISSING: i32 = -81;
pub const WRONG_DSTYPE: i32 = -82;
pub const FILE_ALREADY_OPEN: i32 = -83;
pub const DSN_OUT_OF_RANGE: i32 = -84;
pub const READ_ONLY: i32 = -85;
pub const BAD_CHECK_DIGIT: i32 = -89;
pub const BAD_ATTRIBUTE_VALUE: i32 = -101;
pub const NO_ROOM_ON_LABEL: i32 = -103;
pub const DATA_PRESENT: i32 = -104;
pub const ATTRIBUTE_NOT_PRESENT: i32 = -107;
pub const NO_SPACE_FOR_ATTRIBUTE: i32 = -121;

static TABLE: &[(i32, &str)] = &[
    (-1, "non specific error on WDM file open"),
    (-4, "copy/update failed due to data overlap problem - part of source needed"),
    (-5, "copy/update failed due to data overlap problem"),
    (-6, "no data present"),
    (-8, "bad dates"),
    (-9, "data present in current group"),
    (-10, "no date in this group"),
    (-11, "no non-missing data, data has not started yet"),
    (-14, "data specified not within valid range for data set"),
    (-15, "time units and time step must match label exactly with VBTIME = 1"),
    (-20, "problem with one or more of GPGLG, DXX, NVAL, QUALVL, Ltsstep, LTUNIT"),
    (-21, "data from WDM does not match expected date"),
    (-23, "not a valid table"),
    (-24, "not a valid associated table"),
    (-25, "template already exists"),
    (-26, "can not add another table"),
    (-27, "no tables to return info about"),
    (-28, "table does not exist yet"),
    (-30, "more than whole table"),
    (-31, "more than whole extension"),
    (-32, "data header does not match"),
    (-33, "problems with row/space specs"),
    (-36, "missing needed following data for a get"),
    (-37, "no data present"),
    (-38, "missing part of time required"),
    (-39, "missing data group"),
    (-40, "no data available"),
    (-41, "no data to read"),
    (-42, "overlap in existing group"),
    (-43, "can not add another space time group"),
    (-44, "trying to get/put more data that in block"),
    (-45, "types do not match"),
    (-46, "bad space time group specification parameter"),
    (-47, "bad direction flag"),
    (-48, "conflicting spec of space time dim and # of ts data sets"),
    (-49, "group does not exist"),
    (-50, "requested attributes missing from this data set"),
    (-51, "no space for another DLG"),
    (-61, "old data set does not exist"),
    (-62, "new data set already exists"),
    (-71, "data set already exists"),
    (-72, "old data set does not exist"),
    (-73, "new data set already exists"),
    (-81, "data set does not exist"),
    (-82, "data set exists, but is wrong DSTYP"),
    (-83, "WDM file already open, can not create it"),
    (-84, "data set number out of valid range"),
    (-85, "trying to write to a read-only data set"),
    (-87, "can not remove message WDM file from buffer"),
    (-88, "can not open another WDM file"),
    (-89, "check digit on 1st record of WDM file is bad"),
    (-101, "incorrect character value for attribute"),
    (-102, "attribute already on label"),
    (-103, "no room on label for attribute"),
    (-104, "data present, can not update attribute"),
    (-105, "attribute not allowed for this type data set"),
    (-106, "can not delete attribute, it is required"),
    (-107, "attribute not present on this data set"),
    (-108, "incorrect integer value for attribute"),
    (-109, "incorrect real value for attribute"),
    (-110, "attributes not found on message file"),
    (-111, "attribute name not found (no match)"),
    (-112, "more attributes exists which match SAFNAM"),
    (-121, "no space for another attribute"),
    (1, "varies - generally more data/groups/table"),
    (2, "no more data available for this DLG group"),
];

impl Retcode {
    pub const fn new(code: i32) -> Self {
        Retcode(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == SUCCESS
    }

    /// Decoded text for this code, or a generic message for unknown codes.
    pub fn message(self) -> &'static str {
        TABLE
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, msg)| *msg)
            .unwrap_or("unrecognized status code")
    }

    /// Whether this code appears in the legacy table at all.
    pub fn is_known(self) -> bool {
        self.0 == SUCCESS || TABLE.iter().any(|(code, _)| *code == self.0)
    }

    /// Turn a status into a `Result`.
    ///
    /// `0` and any code listed in `benign` pass; everything else becomes a
    /// [`WdmError::Engine`] carrying the decoded message and `context`.
    pub fn check(self, benign: &[i32], context: impl FnOnce() -> String) -> Result<()> {
        if self.is_success() || benign.contains(&self.0) {
            return Ok(());
        }
        Err(WdmError::engine(self, context()))
    }
}

impl From<i32> for Retcode {
    fn from(code: i32) -> Self {
        Retcode(code)
    }
}

impl std::fmt::Display for Retcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.message())
    }
}
