pub mod build;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod repository;
pub mod transport;

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use credentials::{Credential, CredentialStore};
use error::ConfigError;
use transport::ProxySettings;

pub use build::{BuildInfo, BuildOutcome, GitBinding, ScmBinding};
pub use notifier::{BITBUCKET_HOST, NotifyOutcome, StatusNotifier};

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub host: HostContext,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifierConfig {
    /// Id of the credential used against the Bitbucket API. May be empty.
    #[serde(default)]
    pub credentials_id: String,
    /// Overrides `https://api.bitbucket.org`
    pub api_url: Option<String>,
}

/// Host-wide settings read at call time
#[derive(Debug, Deserialize, Clone)]
pub struct HostContext {
    /// Root URL of the CI server, e.g. `https://ci.example.com/`
    #[serde(default)]
    pub root_url: String,
    pub proxy: Option<ProxySettings>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            proxy: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HostContext {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Applies values taken from the environment or command line over the file.
    pub fn apply_overrides(&mut self, credentials_id: Option<String>, root_url: Option<String>) {
        if let Some(id) = credentials_id {
            self.notifier.credentials_id = id;
        }
        if let Some(url) = root_url {
            self.host.root_url = url;
        }
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.credentials.clone())
    }

    fn validate(&self) -> error::Result<()> {
        if self.host.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "host.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(proxy) = &self.host.proxy {
            if proxy.host.trim().is_empty() {
                return Err(ConfigError::Invalid("host.proxy.host is empty".to_string()));
            }
        }
        if let Some(credential) = self.credentials.iter().find(|c| c.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "credential for user '{}' has an empty id",
                credential.username
            )));
        }
        Ok(())
    }
}

/// Load and parse the configuration file
pub fn load_config(path: &Path) -> error::Result<AppConfig> {
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&config_str, path)
}

fn parse_config(config_str: &str, path: &Path) -> error::Result<AppConfig> {
    let config: AppConfig = toml::from_str(config_str).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[notifier]
credentials_id = "bb-bot"

[host]
root_url = "https://ci.example.com/"
timeout_secs = 15

[host.proxy]
host = "proxy.internal"
port = 3128
username = "alice"
password = "pw"

[[credentials]]
id = "bb-bot"
username = "bot"
password = "app-password"
domains = ["bitbucket.org"]

[[credentials]]
id = "shared"
username = "ci"
password = "secret"
"#;

    #[test]
    fn loads_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.notifier.credentials_id, "bb-bot");
        assert_eq!(config.host.root_url, "https://ci.example.com/");
        assert_eq!(config.host.timeout(), Duration::from_secs(15));
        let proxy = config.host.proxy.as_ref().unwrap();
        assert_eq!(proxy.credentials(), Some(("alice", "pw")));
        assert_eq!(config.credential_store().len(), 2);
        assert_eq!(config.credentials[0].secret, "app-password");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("", Path::new("empty.toml")).unwrap();
        assert!(config.notifier.credentials_id.is_empty());
        assert!(config.notifier.api_url.is_none());
        assert_eq!(config.host.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.host.proxy.is_none());
        assert!(config.credential_store().is_empty());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = parse_config(SAMPLE, Path::new("sample.toml")).unwrap();
        config.apply_overrides(Some("other".into()), None);
        assert_eq!(config.notifier.credentials_id, "other");
        assert_eq!(config.host.root_url, "https://ci.example.com/");

        config.apply_overrides(None, Some("https://jenkins.local/".into()));
        assert_eq!(config.host.root_url, "https://jenkins.local/");
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = parse_config("[host]\ntimeout_secs = 0\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reports_parse_and_read_errors() {
        let err = parse_config("[notifier\n", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "broken.toml"));

        let err = load_config(Path::new("/nonexistent/build_status.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
