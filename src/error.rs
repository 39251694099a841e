// Typed error surface for the scan core
//
// Every per-file failure travels through results as data rather than an
// exception; only rule compilation aborts a scan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors the scan core reports to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanError {
    /// The job queue is at capacity; `submit` is non-blocking by contract.
    #[error("job queue is full")]
    QueueFull,

    /// The file exceeds the configured size cap and was not scanned.
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    /// A NUL byte in the leading window marked the file as binary.
    #[error("binary content detected, file skipped")]
    BinarySkipped,

    /// The scan was cancelled before or while this job ran.
    #[error("scan cancelled")]
    Cancelled,

    /// A rule regex failed to compile at startup. Fatal for the scan.
    #[error("rule {rule_id} failed to compile: {reason}")]
    RuleCompile { rule_id: String, reason: String },
}

impl ScanError {
    /// Per-file errors keep the scan going; startup errors abort it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::RuleCompile { .. })
    }
}
