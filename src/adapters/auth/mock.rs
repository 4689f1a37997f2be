//! Mock token verifier for testing.
//!
//! Implements the `TokenVerifier` port with a static token-to-identity map,
//! avoiding real signing material in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, Identity, ProficiencyTier, Role, UserId};
use crate::ports::TokenVerifier;

/// Mock token verifier.
///
/// Tokens not in the map return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockTokenVerifier {
    tokens: RwLock<HashMap<String, Identity>>,
    /// Optional error returned for every verification (for error testing).
    force_error: RwLock<Option<AuthError>>,
}

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to an identity.
    pub fn with_identity(self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens
            .write()
            .expect("MockTokenVerifier: tokens lock poisoned")
            .insert(token.into(), identity);
        self
    }

    /// Adds a valid token for a simple test user.
    pub fn with_test_user(
        self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
        tier: Option<ProficiencyTier>,
    ) -> Self {
        let user_id = user_id.into();
        let identity = Identity {
            user_id: UserId::new(&user_id).expect("test user id must be non-empty"),
            email: format!("{}@test.example.com", user_id),
            display_name: Some(format!("Test User {}", user_id)),
            role,
            tier,
        };
        self.with_identity(token, identity)
    }

    /// Forces every verification to return the given error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .expect("MockTokenVerifier: error lock poisoned") = Some(error);
        self
    }

    /// Registers a valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, identity: Identity) {
        self.tokens
            .write()
            .expect("MockTokenVerifier: tokens lock poisoned")
            .insert(token.into(), identity);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .expect("MockTokenVerifier: tokens lock poisoned")
            .remove(token);
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .expect("MockTokenVerifier: error lock poisoned")
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .expect("MockTokenVerifier: tokens lock poisoned")
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
