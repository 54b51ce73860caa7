/// Utility enum that covers all possible errors while building and submitting workloads
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field of the deployment request is missing or empty. Never retried.
    #[error("Invalid deployment request: {0}")]
    ValidationError(String),

    /// The quota backing a request cannot be turned into resource requirements.
    #[error("Unable to resolve quota: {0}")]
    QuotaResolutionError(String),

    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },

    /// The exec stream to a pod broke before the command finished.
    #[error("Exec failed: {0}")]
    ExecError(String),

    /// Transport failure reported by the CMDB collaborator.
    #[error("CMDB request failed: {0}")]
    CmdbError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Pattern error: {source}")]
    RegexError {
        #[from]
        source: regex::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Transport failures may be retried by the caller, everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::KubeError { .. } | Error::CmdbError(_) | Error::Timeout { .. }
        )
    }
}

/// Non-fatal problem found while parsing optional, operator-supplied input.
/// The offending entry is dropped and the build carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ignored {field} entry {entry:?}: {reason}")]
pub struct PartialParseWarning {
    pub field: &'static str,
    pub entry: String,
    pub reason: String,
}

impl PartialParseWarning {
    pub fn new(field: &'static str, entry: &str, reason: &str) -> Self {
        PartialParseWarning {
            field,
            entry: entry.to_owned(),
            reason: reason.to_owned(),
        }
    }
}
