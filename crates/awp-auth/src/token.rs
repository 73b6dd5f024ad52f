// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::collections::HashMap;
use std::sync::RwLock;

use awp_cas::{BlobKey, Realm};
use rand::RngCore;

use crate::AuthError;

/// Read-scope and single-use commit configuration attached to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCommitConfig {
    /// Optional byte budget the ticket's eventual commit upload may spend.
    pub quota: Option<u64>,
    /// Bytes already accounted against `quota` by
    /// [`TokenStore::reserve_ticket_bytes`], across every PUT the ticket's
    /// holder has made so far (not just the bytes that ended up stored).
    pub consumed: u64,
    /// Set once the ticket's commit has gone through
    /// [`TokenStore::mark_ticket_committed`].
    pub root: Option<BlobKey>,
}

/// A bearer token minted for a human user's own session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    /// Opaque token id, also the bearer-token string clients present.
    pub id: String,
    /// Owning user id.
    pub user_id: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds; reads of an expired token MUST fail.
    pub expires_at: u64,
}

/// A long-lived surrogate token a user mints for an automated agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentToken {
    /// Opaque token id.
    pub id: String,
    /// Owning user id.
    pub user_id: String,
    /// Caller-supplied label.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub expires_at: u64,
}

/// A bounded, realm-scoped credential handed to a third party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Opaque token id; also the ticket's own bearer credential.
    pub id: String,
    /// Realm the ticket's holder is confined to.
    pub realm: Realm,
    /// The user/agent token id that issued this ticket.
    pub issuer_token_id: String,
    /// If set, reads are confined to these keys.
    pub read_scope: Option<Vec<BlobKey>>,
    /// If set, the ticket may perform exactly one commit.
    pub commit: Option<TicketCommitConfig>,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub expires_at: u64,
}

/// Any of the three token kinds a [`TokenStore`] can return from `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// See [`UserToken`].
    User(UserToken),
    /// See [`AgentToken`].
    Agent(AgentToken),
    /// See [`Ticket`].
    Ticket(Ticket),
}

impl Token {
    /// The owning-or-issuing user id, used by `verifyOwnership`.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(t) => Some(&t.user_id),
            Self::Agent(t) => Some(&t.user_id),
            Self::Ticket(_) => None,
        }
    }

    fn expires_at(&self) -> u64 {
        match self {
            Self::User(t) => t.expires_at,
            Self::Agent(t) => t.expires_at,
            Self::Ticket(t) => t.expires_at,
        }
    }
}

/// User tokens, agent tokens, and tickets: creation, lookup, revocation.
///
/// `get` MUST treat an expired record as absent; implementations MAY delete
/// it opportunistically rather than leaving it for the next read to find.
pub trait TokenStore: Send + Sync {
    /// Mint a fresh bearer token for a human session.
    fn create_user_token(&self, user_id: &str, ttl_secs: u64, now: u64) -> UserToken;
    /// Mint a long-lived agent surrogate token.
    fn create_agent_token(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
        ttl_secs: u64,
        now: u64,
    ) -> AgentToken;
    /// Mint a bounded ticket scoped to `realm`.
    fn create_ticket(
        &self,
        realm: Realm,
        issuer_token_id: &str,
        read_scope: Option<Vec<BlobKey>>,
        commit: Option<TicketCommitConfig>,
        ttl_secs: u64,
        now: u64,
    ) -> Ticket;
    /// Look up any token kind by id. Absent (`None`) if missing or expired.
    fn get(&self, token_id: &str, now: u64) -> Result<Option<Token>, AuthError>;
    /// Revoke a token immediately, regardless of its expiry.
    fn revoke(&self, token_id: &str) -> Result<(), AuthError>;
    /// Atomically record `rootKey` as the ticket's one-time commit root.
    /// Returns `false` (without changing state) if the ticket already has a
    /// committed root — this is the ticket's single-use guarantee.
    fn mark_ticket_committed(&self, ticket_id: &str, root: BlobKey) -> Result<bool, AuthError>;
    /// Check `len` more bytes against a ticket's remaining commit-quota
    /// budget and, if it fits, account them immediately. Returns `Ok(None)`
    /// if `token_id` is not a ticket, the ticket has no commit config, or
    /// the commit config has no quota (unlimited). Otherwise returns
    /// `Ok(Some((allowed, remaining)))`: `remaining` is the budget left
    /// after this call when `allowed`, or the unchanged remaining budget
    /// when not.
    fn reserve_ticket_bytes(
        &self,
        token_id: &str,
        len: u64,
        now: u64,
    ) -> Result<Option<(bool, u64)>, AuthError>;
    /// Whether `user_id` owns/issued `token_id`.
    fn verify_ownership(&self, token_id: &str, user_id: &str) -> Result<bool, AuthError>;
    /// All agent tokens a user currently holds (non-expired), for the
    /// `GET /api/auth/tokens` listing route.
    fn list_agent_tokens(&self, user_id: &str, now: u64) -> Result<Vec<AgentToken>, AuthError>;
}

fn random_token_id(prefix: &str) -> String {
    let mut bytes = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

#[derive(Default)]
struct State {
    user: HashMap<String, UserToken>,
    agent: HashMap<String, AgentToken>,
    ticket: HashMap<String, Ticket>,
}

/// In-memory reference [`TokenStore`].
#[derive(Default)]
pub struct MemoryTokenStore {
    state: RwLock<State>,
}

impl MemoryTokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn create_user_token(&self, user_id: &str, ttl_secs: u64, now: u64) -> UserToken {
        let token = UserToken {
            id: random_token_id("usrtok"),
            user_id: user_id.to_owned(),
            created_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.write().unwrap();
        state.user.insert(token.id.clone(), token.clone());
        token
    }

    fn create_agent_token(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
        ttl_secs: u64,
        now: u64,
    ) -> AgentToken {
        let token = AgentToken {
            id: random_token_id("agttok"),
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            description,
            created_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.write().unwrap();
        state.agent.insert(token.id.clone(), token.clone());
        token
    }

    fn create_ticket(
        &self,
        realm: Realm,
        issuer_token_id: &str,
        read_scope: Option<Vec<BlobKey>>,
        commit: Option<TicketCommitConfig>,
        ttl_secs: u64,
        now: u64,
    ) -> Ticket {
        let ticket = Ticket {
            id: random_token_id("tix"),
            realm,
            issuer_token_id: issuer_token_id.to_owned(),
            read_scope,
            commit,
            created_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.write().unwrap();
        state.ticket.insert(ticket.id.clone(), ticket.clone());
        ticket
    }

    fn get(&self, token_id: &str, now: u64) -> Result<Option<Token>, AuthError> {
        let mut state = self.state.write().map_err(|_| AuthError::Poisoned)?;
        if let Some(t) = state.user.get(token_id) {
            if t.expires_at <= now {
                state.user.remove(token_id);
                return Ok(None);
            }
            return Ok(Some(Token::User(t.clone())));
        }
        if let Some(t) = state.agent.get(token_id) {
            if t.expires_at <= now {
                state.agent.remove(token_id);
                return Ok(None);
            }
            return Ok(Some(Token::Agent(t.clone())));
        }
        if let Some(t) = state.ticket.get(token_id) {
            if t.expires_at <= now {
                state.ticket.remove(token_id);
                return Ok(None);
            }
            return Ok(Some(Token::Ticket(t.clone())));
        }
        Ok(None)
    }

    fn revoke(&self, token_id: &str) -> Result<(), AuthError> {
        let mut state = self.state.write().map_err(|_| AuthError::Poisoned)?;
        state.user.remove(token_id);
        state.agent.remove(token_id);
        state.ticket.remove(token_id);
        Ok(())
    }

    fn mark_ticket_committed(&self, ticket_id: &str, root: BlobKey) -> Result<bool, AuthError> {
        let mut state = self.state.write().map_err(|_| AuthError::Poisoned)?;
        let Some(ticket) = state.ticket.get_mut(ticket_id) else {
            return Ok(false);
        };
        let Some(commit) = ticket.commit.as_mut() else {
            return Ok(false);
        };
        if commit.root.is_some() {
            return Ok(false);
        }
        commit.root = Some(root);
        Ok(true)
    }

    fn reserve_ticket_bytes(
        &self,
        token_id: &str,
        len: u64,
        now: u64,
    ) -> Result<Option<(bool, u64)>, AuthError> {
        let mut state = self.state.write().map_err(|_| AuthError::Poisoned)?;
        let Some(ticket) = state.ticket.get_mut(token_id) else {
            return Ok(None);
        };
        if ticket.expires_at <= now {
            return Ok(None);
        }
        let Some(commit) = ticket.commit.as_mut() else {
            return Ok(None);
        };
        let Some(quota) = commit.quota else {
            return Ok(None);
        };
        let remaining = quota.saturating_sub(commit.consumed);
        if len > remaining {
            return Ok(Some((false, remaining)));
        }
        commit.consumed = commit.consumed.saturating_add(len);
        Ok(Some((true, quota.saturating_sub(commit.consumed))))
    }

    fn verify_ownership(&self, token_id: &str, user_id: &str) -> Result<bool, AuthError> {
        let state = self.state.read().map_err(|_| AuthError::Poisoned)?;
        if let Some(t) = state.user.get(token_id) {
            return Ok(t.user_id == user_id);
        }
        if let Some(t) = state.agent.get(token_id) {
            return Ok(t.user_id == user_id);
        }
        // Tickets carry an issuing token id, not a user id directly; they
        // are never themselves the subject of a `verifyOwnership` check.
        Ok(false)
    }

    fn list_agent_tokens(&self, user_id: &str, now: u64) -> Result<Vec<AgentToken>, AuthError> {
        let state = self.state.read().map_err(|_| AuthError::Poisoned)?;
        Ok(state
            .agent
            .values()
            .filter(|t| t.user_id == user_id && t.expires_at > now)
            .cloned()
            .collect())
    }
}
