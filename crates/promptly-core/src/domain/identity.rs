use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identity handed over by the identity provider after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            name: None,
            username: None,
            avatar: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Whoever is invoking an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(Identity),
}

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::User(identity) => Some(&identity.user_id),
        }
    }

    /// Mutations call this first; anonymous callers are rejected.
    pub fn require(&self) -> Result<&Identity, DomainError> {
        match self {
            Caller::Anonymous => Err(DomainError::Unauthenticated),
            Caller::User(identity) => Ok(identity),
        }
    }
}

impl From<Identity> for Caller {
    fn from(identity: Identity) -> Self {
        Caller::User(identity)
    }
}
