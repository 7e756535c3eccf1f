use std::io;

use crate::build::BuildOutcome;

/// Errors raised while loading the notifier configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the outbound HTTP transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),

    #[error("{0}")]
    Other(String),
}

/// Every reason a status update is not delivered.
///
/// None of these fail the build; the notifier logs them and returns.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Only Git source control is supported (got '{0}').")]
    UnsupportedSourceControl(String),

    #[error("Invalid repository remote '{0}'.")]
    InvalidRemote(String),

    #[error("Only Bitbucket repositories are supported (remote host is '{0}').")]
    UnsupportedHost(String),

    #[error("Set a credential to access the Bitbucket API.")]
    MissingCredentialConfiguration,

    #[error("Invalid credential. No username/password credential '{id}' exists for {domain}.")]
    CredentialNotFound { id: String, domain: String },

    #[error("Build result is {0}; no status is sent for this outcome.")]
    SkippedOutcome(BuildOutcome),

    #[error("Cannot determine owner and repository from remote path '{0}'.")]
    MalformedRepositoryPath(String),

    #[error("No built revision is recorded for this build.")]
    MissingRevision,

    #[error("Bitbucket rejected the status update (HTTP {status}): {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("Failed to update build status: {0}")]
    TransportFailure(#[from] TransportError),
}

impl NotifyError {
    /// Preconditions that legitimately rule out a status update, as opposed to
    /// an attempted delivery that went wrong.
    pub fn is_skip(&self) -> bool {
        !matches!(
            self,
            NotifyError::RemoteRejected { .. } | NotifyError::TransportFailure(_)
        )
    }
}

/// Helper type for Results that use ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;
