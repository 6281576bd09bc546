//! Who may do what.
//!
//! There is exactly one privileged identity, the configured admin user.
//! Any other name that still carries a valid signature is an ordinary
//! member: it may upload but never delete.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::{config::Config, session, state::AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Member(String),
    Admin(String),
}

impl Identity {
    /// Resolve the caller from an optional session token.
    pub fn from_token(token: Option<&str>, config: &Config) -> Identity {
        let Some(token) = token else {
            return Identity::Anonymous;
        };
        match session::verify(token, &config.secret_key) {
            Ok(name) if name == config.username => Identity::Admin(name),
            Ok(name) => Identity::Member(name),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid session cookie");
                Identity::Anonymous
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Identity::Anonymous)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Member(name) | Identity::Admin(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// List, browse, preview and download.
    Read,
    Upload,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(Denial),
}

/// How a refusal is surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Send the visitor to the login form.
    Login,
    Unauthorized,
    Forbidden,
}

pub fn authorize(operation: Operation, identity: &Identity) -> Decision {
    match (operation, identity) {
        (Operation::Read, _) => Decision::Permit,
        (Operation::Upload, Identity::Anonymous) => Decision::Deny(Denial::Login),
        (Operation::Upload, _) => Decision::Permit,
        (Operation::Delete, Identity::Anonymous) => Decision::Deny(Denial::Unauthorized),
        (Operation::Delete, Identity::Member(_)) => Decision::Deny(Denial::Forbidden),
        (Operation::Delete, Identity::Admin(_)) => Decision::Permit,
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::extract_session_cookie(&parts.headers);
        Ok(Identity::from_token(token.as_deref(), &state.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            secret_key: "k".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn policy_table() {
        let anon = Identity::Anonymous;
        let member = Identity::Member("guest".into());
        let admin = Identity::Admin("admin".into());

        for who in [&anon, &member, &admin] {
            assert_eq!(authorize(Operation::Read, who), Decision::Permit);
        }

        assert_eq!(
            authorize(Operation::Upload, &anon),
            Decision::Deny(Denial::Login)
        );
        assert_eq!(authorize(Operation::Upload, &member), Decision::Permit);
        assert_eq!(authorize(Operation::Upload, &admin), Decision::Permit);

        assert_eq!(
            authorize(Operation::Delete, &anon),
            Decision::Deny(Denial::Unauthorized)
        );
        assert_eq!(
            authorize(Operation::Delete, &member),
            Decision::Deny(Denial::Forbidden)
        );
        assert_eq!(authorize(Operation::Delete, &admin), Decision::Permit);
    }

    #[test]
    fn identity_from_token() {
        let cfg = config();
        assert_eq!(Identity::from_token(None, &cfg), Identity::Anonymous);
        assert_eq!(
            Identity::from_token(Some("garbage"), &cfg),
            Identity::Anonymous
        );

        let admin = session::issue("admin", &cfg.secret_key);
        assert_eq!(
            Identity::from_token(Some(&admin), &cfg),
            Identity::Admin("admin".into())
        );

        let member = session::issue("visitor", &cfg.secret_key);
        let who = Identity::from_token(Some(&member), &cfg);
        assert_eq!(who, Identity::Member("visitor".into()));
        assert!(who.is_authenticated());
        assert!(!who.is_admin());
        assert_eq!(who.name(), Some("visitor"));
    }

    #[test]
    fn token_signed_with_another_key_is_anonymous() {
        let cfg = config();
        let token = session::issue("admin", "not-the-key");
        assert_eq!(Identity::from_token(Some(&token), &cfg), Identity::Anonymous);
    }
}
