//! UserDirectory port - expert availability and role membership.

use async_trait::async_trait;

use crate::domain::foundation::{GatewayError, Role, UserId};

/// Profile of an expert as the platform's user service sees it.
#[derive(Debug, Clone)]
pub struct ExpertProfile {
    pub user_id: UserId,
    pub display_name: String,
    /// Whether the expert is currently taking new consultation requests.
    pub available: bool,
}

/// Read-side collaborator for user lookups.
///
/// `users_with_role` is called at every role-targeted dispatch, by design:
/// re-resolving keeps the audience current when roles change between
/// dispatches.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Load an expert's profile. `Ok(None)` when the user does not exist or
    /// is not an expert.
    async fn get_expert(&self, user_id: &UserId) -> Result<Option<ExpertProfile>, GatewayError>;

    /// All user ids currently holding `role`.
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, GatewayError>;
}
