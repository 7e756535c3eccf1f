//! Posts the result of a finished build to Bitbucket's commit status API

use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

use crate::HostContext;
use crate::build::{BuildInfo, BuildOutcome, ScmBinding};
use crate::credentials::{CredentialResolver, resolve_credential};
use crate::error::{NotifyError, TransportError};
use crate::logging::BuildListener;
use crate::repository::RemoteUrl;
use crate::transport::{StatusRequest, StatusTransport, basic_auth_header};

/// The only code host statuses are reported to
pub const BITBUCKET_HOST: &str = "bitbucket.org";

const HTTP_CREATED: u16 = 201;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    Successful,
    Failed,
}

impl From<BuildOutcome> for StatusState {
    fn from(outcome: BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Success => StatusState::Successful,
            _ => StatusState::Failed,
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusState::Successful => f.write_str("SUCCESSFUL"),
            StatusState::Failed => f.write_str("FAILED"),
        }
    }
}

/// Request body of `POST .../statuses/build`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusPayload {
    pub state: StatusState,
    pub name: String,
    pub url: String,
    pub key: String,
}

impl StatusPayload {
    pub fn new(build: &BuildInfo, root_url: &str) -> Self {
        Self {
            state: build.outcome.into(),
            name: format!("Build #{}", build.number),
            url: join_url(root_url, &build.relative_url),
            key: format!("JENKINS-BUILD-{}", build.number),
        }
    }
}

fn join_url(root: &str, relative: &str) -> String {
    if root.is_empty() || root.ends_with('/') || relative.starts_with('/') {
        format!("{}{}", root, relative)
    } else {
        format!("{}/{}", root, relative)
    }
}

/// What a call to [`StatusNotifier::notify`] ended up doing
#[derive(Debug)]
pub enum NotifyOutcome {
    Sent,
    /// A precondition ruled the update out; no request was made.
    Skipped(NotifyError),
    /// The request was attempted and did not succeed.
    Failed(NotifyError),
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }
}

pub struct StatusNotifier<R, T> {
    credentials_id: String,
    resolver: R,
    transport: T,
    api_base_url: String,
}

impl<R: CredentialResolver, T: StatusTransport> StatusNotifier<R, T> {
    pub fn new(credentials_id: impl Into<String>, resolver: R, transport: T) -> Self {
        Self {
            credentials_id: credentials_id.into(),
            resolver,
            transport,
            api_base_url: format!("https://api.{}", BITBUCKET_HOST),
        }
    }

    /// Points requests at another API root, e.g. a local mock server.
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Reports `build` to Bitbucket. Never fails: every problem is written to
    /// `listener` and the caller's build carries on unchanged.
    pub fn notify(
        &self,
        build: &BuildInfo,
        scm: &ScmBinding,
        host: &HostContext,
        listener: &mut dyn BuildListener,
    ) -> NotifyOutcome {
        match self.try_notify(build, scm, host, listener) {
            Ok(()) => {
                info!(build = build.number, "Build status updated");
                listener.info("Build status updated.");
                NotifyOutcome::Sent
            }
            Err(e) if e.is_skip() => {
                warn!(build = build.number, "Build status not sent: {}", e);
                listener.error(&e.to_string());
                NotifyOutcome::Skipped(e)
            }
            Err(e) => {
                error!(build = build.number, error = ?e, "Failed to update build status");
                listener.error(&e.to_string());
                NotifyOutcome::Failed(e)
            }
        }
    }

    fn try_notify(
        &self,
        build: &BuildInfo,
        scm: &ScmBinding,
        host: &HostContext,
        listener: &mut dyn BuildListener,
    ) -> Result<(), NotifyError> {
        let git = match scm {
            ScmBinding::Git(git) => git,
            ScmBinding::Other(kind) => {
                return Err(NotifyError::UnsupportedSourceControl(kind.clone()));
            }
        };

        let remote = git
            .primary_remote()
            .ok_or_else(|| NotifyError::InvalidRemote("(none configured)".to_string()))?;
        let remote = RemoteUrl::parse(remote)?;
        if remote.host != BITBUCKET_HOST {
            return Err(NotifyError::UnsupportedHost(remote.host));
        }

        if self.credentials_id.trim().is_empty() {
            return Err(NotifyError::MissingCredentialConfiguration);
        }
        let credential = resolve_credential(&self.resolver, &self.credentials_id, BITBUCKET_HOST)
            .ok_or_else(|| NotifyError::CredentialNotFound {
                id: self.credentials_id.clone(),
                domain: BITBUCKET_HOST.to_string(),
            })?;

        if !build.outcome.is_reportable() {
            return Err(NotifyError::SkippedOutcome(build.outcome));
        }

        let location = remote.into_location()?;
        let sha1 = git
            .last_built_revision
            .as_deref()
            .filter(|sha| !sha.trim().is_empty())
            .ok_or(NotifyError::MissingRevision)?;

        if url::Url::parse(&host.root_url).is_err() {
            warn!(root_url = %host.root_url, "CI root URL is not absolute");
            listener.warn(&format!(
                "CI root URL '{}' is not an absolute URL (set host.root_url or JENKINS_URL); \
                 the status link will not resolve.",
                host.root_url
            ));
        }
        let payload = StatusPayload::new(build, &host.root_url);
        let body = serde_json::to_string(&payload)
            .map_err(|e| TransportError::Other(format!("Failed to encode status payload: {}", e)))?;
        let request = StatusRequest {
            url: location.status_url(&self.api_base_url, sha1),
            authorization: basic_auth_header(&credential.username, &credential.secret),
            body,
        };

        listener.info(&format!(
            "Sending {} status for {}/{} at {}",
            payload.state, location.owner, location.slug, sha1
        ));
        let response = self.transport.post_json(&request)?;
        if response.status != HTTP_CREATED {
            return Err(NotifyError::RemoteRejected {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}
