/// Configuration errors produced while building or resolving a job set.
///
/// These are always fatal: the coordinator reports every violation it finds
/// (see `runner-engine`'s job-set resolution) rather than stopping at the
/// first one.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    /// A duration input was negative or not a finite number.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// A job's `timeout` was `Some(Duration::ZERO)`.
    #[error("job {name:?} has a zero timeout; omit it or set a positive duration")]
    ZeroTimeout {
        /// The offending job's name.
        name: String,
    },

    /// A job's name did not contain a `.`, so it cannot be matched by the
    /// `module.function` registration contract.
    #[error("job name {name:?} must contain at least one '.' (module.function)")]
    MalformedName {
        /// The offending job's name.
        name: String,
    },

    /// Two or more registered jobs shared the same name.
    #[error("duplicate job name {name:?}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// `--include-job` named a job that does not exist in the resolved set.
    #[error("unknown included job name {name:?}")]
    UnknownIncludedJob {
        /// The unknown name.
        name: String,
    },

    /// After filtering, no jobs remained to run.
    #[error("no jobs to run")]
    NoJobs,
}
