//! Authentication service contract.

use std::future::Future;

use obrol_shared::{Credentials, SessionToken, UserIdentity};

use crate::error::AuthError;

/// Email/password account service issuing opaque session tokens.
///
/// Clients persist the returned [`SessionToken`] and replay it through
/// [`AuthBackend::resume`]; passwords are never stored client-side.
pub trait AuthBackend: Send + Sync + 'static {
    fn register(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SessionToken, AuthError>> + Send;

    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SessionToken, AuthError>> + Send;

    /// Validate a stored token and return the identity it belongs to.
    fn resume(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;

    fn sign_out(&self, token: &SessionToken) -> impl Future<Output = Result<(), AuthError>> + Send;
}
