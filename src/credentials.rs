//! Username/password credentials supplied by the CI host

use serde::Deserialize;
use std::fmt;

/// A stored username/password pair
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub id: String,
    pub username: String,
    #[serde(rename = "password")]
    pub secret: String,
    /// Hostnames this credential is scoped to. Empty means every domain.
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Credential {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            secret: secret.into(),
            domains: Vec::new(),
        }
    }

    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domains = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn matches_domain(&self, domain: &str) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}

// Keeps secrets out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("secret", &"****")
            .field("domains", &self.domains)
            .finish()
    }
}

/// Host-provided credential lookup
pub trait CredentialResolver {
    /// Credentials visible for `domain`, in store order.
    fn lookup(&self, domain: &str) -> Vec<Credential>;
}

impl<R: CredentialResolver + ?Sized> CredentialResolver for &R {
    fn lookup(&self, domain: &str) -> Vec<Credential> {
        (**self).lookup(domain)
    }
}

/// First credential for `domain` whose id equals `id`.
pub fn resolve_credential(
    resolver: &dyn CredentialResolver,
    id: &str,
    domain: &str,
) -> Option<Credential> {
    resolver
        .lookup(domain)
        .into_iter()
        .find(|credential| credential.id == id)
}

/// Choices for the `credentials_id` setting: an empty selection, then every
/// id visible for `domain`.
pub fn list_credential_ids(resolver: &dyn CredentialResolver, domain: &str) -> Vec<String> {
    std::iter::once(String::new())
        .chain(resolver.lookup(domain).into_iter().map(|c| c.id))
        .collect()
}

/// Credentials held in memory, typically the `[[credentials]]` tables of the config file
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
}

impl CredentialStore {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CredentialResolver for CredentialStore {
    fn lookup(&self, domain: &str) -> Vec<Credential> {
        self.credentials
            .iter()
            .filter(|c| c.matches_domain(domain))
            .cloned()
            .collect()
    }
}
