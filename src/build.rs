use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Final result of a completed build, as reported by the CI host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildOutcome {
    Success,
    Failure,
    Aborted,
    NotBuilt,
    /// Anything else the host reports, e.g. `UNSTABLE`
    Other,
}

impl BuildOutcome {
    /// Aborted and not-built builds never get a status.
    pub fn is_reportable(self) -> bool {
        !matches!(self, BuildOutcome::Aborted | BuildOutcome::NotBuilt)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Failure => "FAILURE",
            BuildOutcome::Aborted => "ABORTED",
            BuildOutcome::NotBuilt => "NOT_BUILT",
            BuildOutcome::Other => "OTHER",
        };
        f.write_str(name)
    }
}

impl FromStr for BuildOutcome {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown results map to `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcome = match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SUCCESS" => BuildOutcome::Success,
            "FAILURE" => BuildOutcome::Failure,
            "ABORTED" => BuildOutcome::Aborted,
            "NOT_BUILT" => BuildOutcome::NotBuilt,
            _ => BuildOutcome::Other,
        };
        Ok(outcome)
    }
}

/// The finished build whose status is being reported
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub number: u64,
    /// Path of the build page relative to the host root URL, e.g. `job/widgets/42/`
    pub relative_url: String,
    pub outcome: BuildOutcome,
}

impl BuildInfo {
    pub fn new(number: u64, relative_url: impl Into<String>, outcome: BuildOutcome) -> Self {
        Self {
            number,
            relative_url: relative_url.into(),
            outcome,
        }
    }
}

/// Source control used by the build
#[derive(Debug, Clone)]
pub enum ScmBinding {
    Git(GitBinding),
    /// Any other source control, identified by name
    Other(String),
}

impl ScmBinding {
    /// Builds a binding from a source-control kind name. Only `git` gets remotes.
    pub fn from_kind(
        kind: &str,
        remotes: Vec<String>,
        last_built_revision: Option<String>,
    ) -> Self {
        if kind.trim().eq_ignore_ascii_case("git") {
            ScmBinding::Git(GitBinding {
                remotes,
                last_built_revision,
            })
        } else {
            ScmBinding::Other(kind.trim().to_string())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GitBinding {
    /// Remote URLs in configuration order; the first one is reported against
    pub remotes: Vec<String>,
    pub last_built_revision: Option<String>,
}

impl GitBinding {
    pub fn new(remote: impl Into<String>, sha1: impl Into<String>) -> Self {
        Self {
            remotes: vec![remote.into()],
            last_built_revision: Some(sha1.into()),
        }
    }

    pub fn primary_remote(&self) -> Option<&str> {
        self.remotes.first().map(String::as_str)
    }
}
