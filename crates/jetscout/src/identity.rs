//! Caller identity.
//!
//! Authentication itself lives outside jetscout. All this crate needs is an
//! opaque reference to the authenticated caller, or nothing when there is no
//! session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identity reference issued by the identity provider.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identity reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answers "who is the current caller".
pub trait IdentityProvider: Send + Sync {
    /// The authenticated caller, or `None` when there is no session.
    fn current_caller(&self) -> Option<UserId>;
}

/// An identity provider with a fixed answer, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    caller: Option<UserId>,
}

impl StaticIdentity {
    /// A provider that always reports the given caller.
    #[must_use]
    pub fn signed_in(caller: UserId) -> Self {
        Self {
            caller: Some(caller),
        }
    }

    /// A provider with no session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a provider from an optional, possibly blank, user name.
    #[must_use]
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => Self::signed_in(UserId::new(name)),
            _ => Self::anonymous(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_caller(&self) -> Option<UserId> {
        self.caller.clone()
    }
}
