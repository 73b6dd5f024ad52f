// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::collections::HashMap;
use std::sync::RwLock;

use rand::Rng;

use crate::AuthError;

/// A signed-client enrolment in progress, keyed by the candidate pubkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuth {
    /// The pubkey (SEC1 hex-encoded point) the client is trying to enrol.
    pub pubkey: String,
    /// Six-digit verification code the user types into an already
    /// authenticated session to approve the client.
    pub code: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds; an unapproved enrolment past this point reads absent.
    pub expires_at: u64,
}

/// `init`/`status`/`complete` state for the signed-client enrolment flow.
///
/// Expiry is enforced on read: `get` and `validate_code` treat an
/// out-of-window row as though it never existed.
pub trait PendingAuthStore: Send + Sync {
    /// Begin an enrolment, generating a random 6-digit code.
    fn create(&self, pubkey: &str, ttl_secs: u64, now: u64) -> PendingAuth;
    /// Look up a pending enrolment by pubkey.
    fn get(&self, pubkey: &str, now: u64) -> Result<Option<PendingAuth>, AuthError>;
    /// Check whether `code` matches the pending enrolment for `pubkey`.
    fn validate_code(&self, pubkey: &str, code: &str, now: u64) -> Result<bool, AuthError>;
    /// Remove a pending enrolment (called once it is approved or expires).
    fn delete(&self, pubkey: &str) -> Result<(), AuthError>;
}

/// In-memory reference [`PendingAuthStore`].
#[derive(Default)]
pub struct MemoryPendingAuthStore {
    rows: RwLock<HashMap<String, PendingAuth>>,
}

impl MemoryPendingAuthStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn random_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

impl PendingAuthStore for MemoryPendingAuthStore {
    fn create(&self, pubkey: &str, ttl_secs: u64, now: u64) -> PendingAuth {
        let entry = PendingAuth {
            pubkey: pubkey.to_owned(),
            code: random_code(),
            created_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };
        #[allow(clippy::unwrap_used)]
        self.rows
            .write()
            .unwrap()
            .insert(pubkey.to_owned(), entry.clone());
        entry
    }

    fn get(&self, pubkey: &str, now: u64) -> Result<Option<PendingAuth>, AuthError> {
        let mut rows = self.rows.write().map_err(|_| AuthError::Poisoned)?;
        match rows.get(pubkey) {
            Some(row) if row.expires_at > now => Ok(Some(row.clone())),
            Some(_) => {
                rows.remove(pubkey);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn validate_code(&self, pubkey: &str, code: &str, now: u64) -> Result<bool, AuthError> {
        Ok(self
            .get(pubkey, now)?
            .is_some_and(|row| row.code == code))
    }

    fn delete(&self, pubkey: &str) -> Result<(), AuthError> {
        self.rows
            .write()
            .map_err(|_| AuthError::Poisoned)?
            .remove(pubkey);
        Ok(())
    }
}

/// A pubkey that has completed enrolment and is bound to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPubkey {
    /// SEC1 hex-encoded P-256 public key.
    pub pubkey: String,
    /// The user this pubkey authenticates as.
    pub user_id: String,
    /// Unix seconds.
    pub created_at: u64,
}

/// Pubkey-to-user bindings produced by the signed-client enrolment flow.
pub trait AuthorizedPubkeyStore: Send + Sync {
    /// Look up the user a pubkey is bound to, if any.
    fn lookup(&self, pubkey: &str) -> Result<Option<AuthorizedPubkey>, AuthError>;
    /// Bind a pubkey to a user (overwrites any prior binding).
    fn store(&self, entry: AuthorizedPubkey) -> Result<(), AuthError>;
    /// Remove a pubkey's binding.
    fn revoke(&self, pubkey: &str) -> Result<(), AuthError>;
    /// All pubkeys currently bound to a user.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<AuthorizedPubkey>, AuthError>;
}

/// In-memory reference [`AuthorizedPubkeyStore`].
#[derive(Default)]
pub struct MemoryAuthorizedPubkeyStore {
    rows: RwLock<HashMap<String, AuthorizedPubkey>>,
}

impl MemoryAuthorizedPubkeyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorizedPubkeyStore for MemoryAuthorizedPubkeyStore {
    fn lookup(&self, pubkey: &str) -> Result<Option<AuthorizedPubkey>, AuthError> {
        Ok(self
            .rows
            .read()
            .map_err(|_| AuthError::Poisoned)?
            .get(pubkey)
            .cloned())
    }

    fn store(&self, entry: AuthorizedPubkey) -> Result<(), AuthError> {
        self.rows
            .write()
            .map_err(|_| AuthError::Poisoned)?
            .insert(entry.pubkey.clone(), entry);
        Ok(())
    }

    fn revoke(&self, pubkey: &str) -> Result<(), AuthError> {
        self.rows
            .write()
            .map_err(|_| AuthError::Poisoned)?
            .remove(pubkey);
        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<AuthorizedPubkey>, AuthError> {
        Ok(self
            .rows
            .read()
            .map_err(|_| AuthError::Poisoned)?
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}
