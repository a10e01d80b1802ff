use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rand::RngCore;
use tracing::{debug, info};

use obrol_shared::constants::MIN_PASSWORD_LEN;
use obrol_shared::{Credentials, SessionToken, UserIdentity};

use crate::auth::AuthBackend;
use crate::error::AuthError;

/// BLAKE3 key-derivation context for stored password digests.
const KDF_CONTEXT_PASSWORD: &str = "obrol-loopback-password-v1";

struct Account {
    salt: [u8; 16],
    digest: [u8; 32],
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    /// Live token string -> owning identity.
    tokens: HashMap<String, UserIdentity>,
}

/// In-memory account service.  Stores salted BLAKE3 digests, never
/// passwords, and issues random hex tokens.
#[derive(Clone, Default)]
pub struct LoopbackAuth {
    inner: Arc<Mutex<AuthState>>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_digest(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(salt.len() + password.len());
    material.extend_from_slice(salt);
    material.extend_from_slice(password.as_bytes());
    blake3::derive_key(KDF_CONTEXT_PASSWORD, &material)
}

impl LoopbackAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(state: &mut AuthState, user: UserIdentity) -> SessionToken {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        state.tokens.insert(token.clone(), user.clone());
        SessionToken {
            user,
            token,
            issued_at: Utc::now(),
        }
    }

    /// Invalidate every token of `user`, as a server-side expiry would.
    pub fn revoke_all(&self, user: &UserIdentity) -> usize {
        let mut state = self.state();
        let before = state.tokens.len();
        state.tokens.retain(|_, owner| owner != user);
        before - state.tokens.len()
    }

    pub fn active_tokens(&self) -> usize {
        self.state().tokens.len()
    }
}

impl AuthBackend for LoopbackAuth {
    async fn register(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let email = normalize_email(&credentials.email);
        let mut state = self.state();
        if state.accounts.contains_key(&email) {
            return Err(AuthError::AccountExists);
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = password_digest(&salt, &credentials.password);
        state.accounts.insert(email.clone(), Account { salt, digest });

        info!(user = %email, "Loopback account registered");
        Ok(Self::issue(&mut state, UserIdentity::new(email)))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        let email = normalize_email(&credentials.email);
        let mut state = self.state();

        let valid = state.accounts.get(&email).is_some_and(|account| {
            password_digest(&account.salt, &credentials.password) == account.digest
        });
        if !valid {
            debug!(user = %email, "Loopback sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Self::issue(&mut state, UserIdentity::new(email)))
    }

    async fn resume(&self, token: &SessionToken) -> Result<UserIdentity, AuthError> {
        self.state()
            .tokens
            .get(&token.token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError> {
        match self.state().tokens.remove(&token.token) {
            Some(_) => Ok(()),
            None => Err(AuthError::InvalidToken),
        }
    }
}
