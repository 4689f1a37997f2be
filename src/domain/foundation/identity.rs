//! Authenticated identity types for the realtime core.
//!
//! An [`Identity`] is extracted from a verified bearer token exactly once,
//! at connection time, and is immutable for the lifetime of the connection.
//! Tier changes take effect on the user's next connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// Platform role carried in the token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    Superadmin,
}

impl Role {
    /// True for roles with platform-operator privileges.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

/// A student's ordered proficiency tier.
///
/// Tiers form a total order: beginner < intermediate < advanced. The rank
/// drives community-room visibility (see `domain::access`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl ProficiencyTier {
    /// Numeric rank used for ordering comparisons.
    pub fn rank(&self) -> u8 {
        match self {
            ProficiencyTier::Beginner => 1,
            ProficiencyTier::Intermediate => 2,
            ProficiencyTier::Advanced => 3,
        }
    }

    /// Parses a tier from its wire/database representation.
    ///
    /// Returns `None` for unrecognized values so callers fail closed.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Some(ProficiencyTier::Beginner),
            "intermediate" => Some(ProficiencyTier::Intermediate),
            "advanced" => Some(ProficiencyTier::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProficiencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProficiencyTier::Beginner => "beginner",
            ProficiencyTier::Intermediate => "intermediate",
            ProficiencyTier::Advanced => "advanced",
        };
        write!(f, "{}", s)
    }
}

/// Authenticated user extracted from a validated token.
///
/// This is a domain type with no provider dependencies; any token verifier
/// can populate it via the `TokenVerifier` port.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The unique user identifier from the identity provider.
    pub user_id: UserId,

    /// User's email address from the token claims.
    pub email: String,

    /// Display name if available.
    pub display_name: Option<String>,

    /// Platform role.
    pub role: Role,

    /// Proficiency tier. Only meaningful for students; `None` for a student
    /// means the tier claim was missing or unrecognized and access to every
    /// tiered room is denied.
    pub tier: Option<ProficiencyTier>,
}

impl Identity {
    /// Returns the user's display name, or email as fallback.
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Authentication errors surfaced during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but carries no usable identity (missing subject).
    #[error("Token missing subject claim")]
    MissingSubject,

    /// Token is valid but the role claim is missing or unrecognized.
    #[error("Token has invalid role claim")]
    InvalidRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, tier: Option<ProficiencyTier>) -> Identity {
        Identity {
            user_id: UserId::new("user-123").unwrap(),
            email: "trader@example.com".to_string(),
            display_name: Some("Alice".to_string()),
            role,
            tier,
        }
    }

    #[test]
    fn tier_ordering_is_total() {
        assert!(ProficiencyTier::Beginner.rank() < ProficiencyTier::Intermediate.rank());
        assert!(ProficiencyTier::Intermediate.rank() < ProficiencyTier::Advanced.rank());
    }

    #[test]
    fn tier_parses_known_values_case_insensitively() {
        assert_eq!(
            ProficiencyTier::parse("Beginner"),
            Some(ProficiencyTier::Beginner)
        );
        assert_eq!(
            ProficiencyTier::parse("INTERMEDIATE"),
            Some(ProficiencyTier::Intermediate)
        );
        assert_eq!(
            ProficiencyTier::parse("advanced"),
            Some(ProficiencyTier::Advanced)
        );
    }

    #[test]
    fn tier_parse_rejects_unknown_values() {
        assert_eq!(ProficiencyTier::parse("expert"), None);
        assert_eq!(ProficiencyTier::parse(""), None);
    }

    #[test]
    fn role_is_admin_covers_admin_and_superadmin() {
        assert!(Role::Admin.is_admin());
        assert!(Role::Superadmin.is_admin());
        assert!(!Role::Student.is_admin());
        assert!(!Role::Instructor.is_admin());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut id = identity(Role::Student, Some(ProficiencyTier::Beginner));
        assert_eq!(id.display_name_or_email(), "Alice");
        id.display_name = None;
        assert_eq!(id.display_name_or_email(), "trader@example.com");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
    }
}
