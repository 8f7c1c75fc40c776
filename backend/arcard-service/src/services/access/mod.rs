/// Secret-code gate
///
/// A session may only be created with a code present in the code repository
/// whose expiry has not passed.
mod repository;

pub use repository::{
    parse_expiry, CodeRepository, InMemoryCodeRepository, JsonFileCodeRepository,
    RepositoryError,
};

use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Valid,
    Invalid,
    Expired,
}

impl AccessDecision {
    pub fn is_valid(&self) -> bool {
        matches!(self, AccessDecision::Valid)
    }

    /// Message shown to the uploader when access is refused
    pub fn denial_message(&self) -> &'static str {
        match self {
            AccessDecision::Expired => "Срок действия секретного кода истёк",
            AccessDecision::Invalid | AccessDecision::Valid => {
                "Неверный или просроченный секретный код"
            }
        }
    }
}

#[derive(Clone)]
pub struct AccessGate {
    repo: Arc<dyn CodeRepository>,
}

impl AccessGate {
    pub fn new(repo: Arc<dyn CodeRepository>) -> Self {
        Self { repo }
    }

    /// Decide whether `code` admits a new session at `now`.
    ///
    /// An expiry equal to `now` is still valid.
    pub fn validate(&self, code: &str, now: DateTime<Utc>) -> AccessDecision {
        if code.is_empty() {
            return AccessDecision::Invalid;
        }
        match self.repo.get(code) {
            None => AccessDecision::Invalid,
            Some(expiry) if expiry < now => AccessDecision::Expired,
            Some(_) => AccessDecision::Valid,
        }
    }
}
