use std::path::PathBuf;

use crate::compartments::SectionId;

/// Everything that can go wrong while loading or parameterizing a cell
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    #[error("failed to read morphology {path}: {source}")]
    MorphologyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed SWC record on line {line}: {reason}")]
    MalformedSwc { line: usize, reason: String },

    #[error("no root node found (parent id == -1)")]
    NoRoot,

    #[error("morphology contains no soma points")]
    NoSoma,

    #[error("zero radius on non-endpoint node {0}")]
    ZeroRadius(u64),

    #[error("unknown section {0:?}")]
    UnknownSection(SectionId),

    #[error("attachment position {0} outside [0, 1]")]
    InvalidPosition(f64),

    #[error("unknown mechanism '{0}'")]
    UnknownMechanism(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("mechanism {mechanism} is not inserted in {section}")]
    MechanismNotInserted { section: String, mechanism: String },

    #[error("no mechanism using ion {ion} is inserted in {section}")]
    IonNotPresent { section: String, ion: String },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CellError {
    /// Whether the error came out of the morphology load step
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            CellError::MorphologyIo { .. }
                | CellError::MalformedSwc { .. }
                | CellError::NoRoot
                | CellError::NoSoma
                | CellError::ZeroRadius(_)
        )
    }
}

pub type CellResult<T> = Result<T, CellError>;
