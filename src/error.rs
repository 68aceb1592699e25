use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::PersonnelId;

/// Problems with the rank ladder or with roster data. Fatal before any cycle runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rank ladder is empty")]
    EmptyLadder,
    #[error("rank {0:?} appears more than once in the ladder")]
    DuplicateRank(String),
    #[error("rank {0:?} has no vacancy ceiling")]
    MissingCeiling(String),
    #[error("rank {0:?} has no minimum time in rank")]
    MissingMinYears(String),
    #[error("top rank {0:?} cannot take supernumerary promotions")]
    OverflowAtTop(String),
    #[error("record {id} has unknown rank {label:?}")]
    UnknownRank { id: PersonnelId, label: String },
    #[error("record {0} appears more than once in the roster")]
    DuplicateId(PersonnelId),
    #[error("record {0} has neither a last promotion date nor an admission date")]
    MissingPromotionDate(PersonnelId),
    #[error("record {id} was last promoted on {date}, after the simulation start {start}")]
    PromotionInFuture { id: PersonnelId, date: NaiveDate, start: NaiveDate },
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Run parameters outside their accepted ranges. Rejected before simulation starts.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("target date {target} is before the start date {start}")]
    TargetBeforeStart { start: NaiveDate, target: NaiveDate },
    #[error("target date {target} is after the cutoff {cutoff}")]
    TargetBeyondCutoff { target: NaiveDate, cutoff: NaiveDate },
    #[error("retirement threshold {0} is outside 31..=35 years")]
    ThresholdOutOfRange(u32),
    #[error("between 1 and 5 individuals must be traced, got {0}")]
    TraceSetSize(usize),
    #[error("traced id {0} is not in the roster")]
    UnknownTracedId(PersonnelId),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Params(#[from] ParamError),
    /// A pass referenced a record the roster does not hold. Always a defect.
    #[error("record {0} is not in the active roster")]
    UnknownPersonnel(PersonnelId),
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
