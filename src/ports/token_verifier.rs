//! TokenVerifier port - bearer-credential validation.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, Identity};

/// Validates a signed bearer token and extracts the caller's identity.
///
/// # Contract
///
/// Implementations must:
/// - Return the identity only for a structurally valid, correctly signed,
///   unexpired token
/// - Return an `AuthError` otherwise; the gateway refuses the connection
///   (no partial or anonymous connections)
/// - Be side-effect free; verification never touches the registry
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and extract the identity it asserts.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_verifier_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn TokenVerifier) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn TokenVerifier>>();
    }
}
