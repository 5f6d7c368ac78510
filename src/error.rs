use std::time::Duration;

use thiserror::Error;

/// A single failed read of one metric source. Always contained to the field
/// being measured; never aborts a tick.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query exited with status {code:?}")]
    NonZeroExit { code: Option<i32> },

    #[error("could not parse {input:?} as a percentage")]
    Parse { input: String },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sensor read failed: {0}")]
    Sensor(String),

    #[error("source is not available on this host")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sampling loop was already started")]
    AlreadyStarted,

    #[error("failed to spawn sampler thread: {0}")]
    Spawn(#[from] std::io::Error),
}
