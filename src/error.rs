use thiserror::Error;

/// Errors surfaced by the mapping contract.
///
/// Absent-key outcomes are not modeled here: they are reported through the
/// ordinary `Option`/`bool` return values of `lookup`/`update`/`remove`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error(
        "fingerprint/bucket rebuild in bucket {bucket} did not converge after {attempts} salt attempts"
    )]
    RebuildExhausted { bucket: usize, attempts: usize },
}

pub type Result<T> = std::result::Result<T, TableError>;
