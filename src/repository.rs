//! Parsing of git remote URLs into Bitbucket repository coordinates

use url::Url;

use crate::error::NotifyError;

/// A git remote split into its host and path, before the path is validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    pub path: String,
}

impl RemoteUrl {
    /// Accepts URL forms (`https://`, `ssh://`, `git://`) and scp-like
    /// `user@host:owner/repo.git` remotes.
    pub fn parse(remote: &str) -> Result<Self, NotifyError> {
        let remote = remote.trim();
        if remote.contains("://") {
            let url =
                Url::parse(remote).map_err(|_| NotifyError::InvalidRemote(remote.to_string()))?;
            let host = url
                .host_str()
                .ok_or_else(|| NotifyError::InvalidRemote(remote.to_string()))?;
            return Ok(Self {
                host: host.to_ascii_lowercase(),
                path: url.path().to_string(),
            });
        }

        // scp-like syntax: [user@]host:path
        let (authority, path) = remote
            .split_once(':')
            .ok_or_else(|| NotifyError::InvalidRemote(remote.to_string()))?;
        let host = authority.rsplit('@').next().unwrap_or(authority);
        if host.is_empty() {
            return Err(NotifyError::InvalidRemote(remote.to_string()));
        }
        Ok(Self {
            host: host.to_ascii_lowercase(),
            path: path.to_string(),
        })
    }

    /// Owner is the first path segment, slug the second minus any `.git` suffix.
    /// Empty segments are ignored.
    pub fn into_location(self) -> Result<RepositoryLocation, NotifyError> {
        let mut segments = self.path.split('/').filter(|s| !s.is_empty());
        let (owner, slug) = match (segments.next(), segments.next()) {
            (Some(owner), Some(slug)) => (owner, slug.strip_suffix(".git").unwrap_or(slug)),
            _ => return Err(NotifyError::MalformedRepositoryPath(self.path)),
        };
        if slug.is_empty() {
            return Err(NotifyError::MalformedRepositoryPath(self.path));
        }
        Ok(RepositoryLocation {
            owner: owner.to_string(),
            slug: slug.to_string(),
            host: self.host,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub host: String,
    pub owner: String,
    pub slug: String,
}

impl RepositoryLocation {
    pub fn parse(remote: &str) -> Result<Self, NotifyError> {
        RemoteUrl::parse(remote)?.into_location()
    }

    /// Build status endpoint for `sha1` under an API base such as `https://api.bitbucket.org`
    pub fn status_url(&self, api_base: &str, sha1: &str) -> String {
        format!(
            "{}/2.0/repositories/{}/{}/commit/{}/statuses/build",
            api_base.trim_end_matches('/'),
            self.owner,
            self.slug,
            sha1
        )
    }
}
