//! Mapping queue principals to commit identities.

use std::collections::BTreeMap;

use chron_types::Identity;
use tracing::warn;

use crate::error::IdentityError;

/// Looks up the display identity for an account identifier.
pub trait IdentityResolver {
    fn resolve(&self, principal: &str) -> Result<Identity, IdentityError>;
}

/// Fixed principal → identity table, usually the config's `[identities]`.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    entries: BTreeMap<String, Identity>,
}

impl StaticDirectory {
    pub fn new(entries: BTreeMap<String, Identity>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, principal: impl Into<String>, identity: Identity) {
        self.entries.insert(principal.into(), identity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityResolver for StaticDirectory {
    fn resolve(&self, principal: &str) -> Result<Identity, IdentityError> {
        self.entries
            .get(principal)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownPrincipal(principal.to_string()))
    }
}

/// Resolve `principal`, falling back to [`fallback_identity`] on any error.
pub fn resolve_or_fallback(resolver: &dyn IdentityResolver, principal: &str) -> Identity {
    match resolver.resolve(principal) {
        Ok(identity) => identity,
        Err(e) => {
            let identity = fallback_identity(principal);
            warn!(principal, error = %e, fallback = %identity, "identity lookup failed");
            identity
        }
    }
}

/// The raw principal as the name, and as the email too if it looks like one.
pub fn fallback_identity(principal: &str) -> Identity {
    let email = if looks_like_email(principal) {
        principal
    } else {
        ""
    };
    Identity::new(principal, email)
}

pub fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
