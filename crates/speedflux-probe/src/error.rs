//! Probe error types.

use thiserror::Error;

/// Why a probe could not produce a result.
///
/// Runners fold these into `ProbeResult::Failure` using the display text.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {detail}")]
    Exit {
        program: String,
        status: String,
        detail: String,
    },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("unparseable probe output: {0}")]
    Parse(String),
}
