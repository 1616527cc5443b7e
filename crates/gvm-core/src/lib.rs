pub mod executor;
pub mod provider;
pub mod reconcile;
pub mod record;
pub mod startup;
pub mod types;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timed out after {waited_secs}s waiting for {what}")]
    Timeout { what: String, waited_secs: u64 },

    #[error("gce api error: {0}")]
    Api(String),

    #[error("record file error: {0}")]
    Record(#[from] std::io::Error),
}

/// Classify raw API failures into the error kinds callers act on.
/// `Transient` only escapes the provider after its retry budget is spent.
impl From<gce_api::Error> for Error {
    fn from(e: gce_api::Error) -> Self {
        if e.is_auth() {
            Error::Auth(e.to_string())
        } else if e.is_not_found() {
            Error::NotFound(e.to_string())
        } else if e.is_transient() {
            Error::Transient(e.to_string())
        } else {
            Error::Api(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub use executor::Executor;
pub use provider::{GceProvider, VmProvider};
pub use reconcile::{Op, Plan, reconcile, reconcile_for_create};
pub use types::{
    DesiredConfig, InstanceState, MachineType, ObservedState, OsChoice, Region, VmRef, VmStatus,
};
