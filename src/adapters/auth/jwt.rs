//! JWT adapter for bearer-token verification.
//!
//! Implements the `TokenVerifier` port against HS256 tokens signed with a
//! shared secret by the platform's account service. Verification checks:
//!
//! 1. Signature against the shared secret
//! 2. Expiry (`exp`), always
//! 3. Issuer (`iss`), when the deployment configures one
//! 4. Claim mapping to the domain [`Identity`]
//!
//! The role claim is mandatory; a missing or unrecognized role rejects the
//! token. The tier claim is optional and an unrecognized tier maps to
//! `None`, which the access policy treats as no tiered-room access.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, Identity, ProficiencyTier, Role, UserId};
use crate::ports::TokenVerifier;

/// Configuration for the JWT verifier.
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    /// Shared HS256 signing secret.
    pub secret: String,

    /// Expected issuer claim. `None` skips issuer validation.
    pub issuer: Option<String>,
}

impl JwtVerifierConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// Claims carried by platform access tokens.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    /// Subject - the user ID.
    sub: String,

    /// Expiry timestamp (Unix epoch seconds).
    #[allow(dead_code)]
    exp: i64,

    #[serde(default)]
    email: Option<String>,

    /// Display name.
    #[serde(default)]
    name: Option<String>,

    /// Platform role, lowercase.
    #[serde(default)]
    role: Option<String>,

    /// Proficiency tier, lowercase. Only meaningful for students.
    #[serde(default)]
    tier: Option<String>,
}

/// HS256 token verifier.
///
/// This is the production implementation of `TokenVerifier`.
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(config: JwtVerifierConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key,
            validation,
        }
    }

    fn decode_claims(&self, token: &str) -> Result<TokenData<AccessClaims>, AuthError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidToken
                }
                ErrorKind::MissingRequiredClaim(claim) if claim == "sub" => {
                    AuthError::MissingSubject
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            }
        })
    }
}

fn parse_role(raw: Option<&str>) -> Result<Role, AuthError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("student") => Ok(Role::Student),
        Some("instructor") => Ok(Role::Instructor),
        Some("admin") => Ok(Role::Admin),
        Some("superadmin") => Ok(Role::Superadmin),
        other => {
            tracing::warn!(role = ?other, "Token role claim missing or unrecognized");
            Err(AuthError::InvalidRole)
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.decode_claims(token)?.claims;

        let user_id = UserId::new(&claims.sub).ok_or(AuthError::MissingSubject)?;
        let role = parse_role(claims.role.as_deref())?;

        let email = claims.email.ok_or_else(|| {
            tracing::warn!("Token missing email claim");
            AuthError::InvalidToken
        })?;

        let tier = claims.tier.as_deref().and_then(|raw| {
            let parsed = ProficiencyTier::parse(raw);
            if parsed.is_none() {
                tracing::warn!(tier = raw, "Unrecognized tier claim, treating as none");
            }
            parsed
        });

        Ok(Identity {
            user_id,
            email,
            display_name: claims.name,
            role,
            tier,
        })
    }
}

impl std::fmt::Debug for JwtTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenVerifier").finish_non_exhaustive()
    }
}
