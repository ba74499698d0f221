pub mod blocks;
pub mod error;
pub mod retcode;
pub mod config;
pub mod date;
pub mod catalog;
pub mod label;
pub mod series;
pub mod directory;
pub mod lock;
pub mod copy;

pub mod parsing {
    pub mod wdm_file;
}

pub mod api {
    pub mod description;
    pub mod open_files;
    pub mod wdm;
}

pub use api::description::{AttributeMap, AttributeSelection, Description, Series};
pub use api::wdm::Wdm;
pub use config::EngineConfig;
pub use date::{TimeCode, WdmDate};
pub use directory::DsnSpec;
pub use error::{ErrorClass, Result, WdmError};
pub use label::AttributeValue;
