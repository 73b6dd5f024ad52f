// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::sync::{Arc, RwLock};
use std::time::Duration;

use awp_cas::{BlobKey, Realm};
use ecdsa::signature::Verifier;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::token::{Token, TokenStore};
use crate::{AuthError, AuthorizedPubkeyStore};

/// A request's credential-bearing headers, as the caller observed them.
/// `None` fields mean the header was simply absent, not malformed.
#[derive(Debug, Clone, Copy)]
pub struct SignedHeaders<'a> {
    /// `X-AWP-Pubkey`: SEC1 hex-encoded P-256 public key.
    pub pubkey: &'a str,
    /// `X-AWP-Timestamp`: Unix seconds the client signed at.
    pub timestamp: u64,
    /// `X-AWP-Signature`: hex-encoded fixed-width ECDSA `r || s`.
    pub signature: &'a str,
}

/// Everything [`AuthResolver::resolve`] needs from an inbound HTTP request.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Present iff all three `X-AWP-*` headers were present.
    pub signed: Option<SignedHeaders<'a>>,
    /// The token from an `Authorization: Bearer <t>` header, if any.
    pub bearer: Option<&'a str>,
    /// Uppercase HTTP method, e.g. `"PUT"`.
    pub method: &'a str,
    /// Path plus query string, exactly as received.
    pub path_and_query: &'a str,
    /// Raw request body bytes.
    pub body: &'a [u8],
}

/// The resolved identity and rights a request authenticated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Authenticated user id (the ticket issuer's user, for ticket auth).
    pub user_id: String,
    /// The realm this request is confined to.
    pub realm: Realm,
    /// Whether reads are permitted (subject to `allowed_keys`, if set).
    pub can_read: bool,
    /// Whether writes (puts, commits) are permitted.
    pub can_write: bool,
    /// Whether this credential may itself issue new tickets.
    pub can_issue_ticket: bool,
    /// The token id that authenticated the request, if any (absent for
    /// signed-pubkey auth, which has no token record).
    pub token_id: Option<String>,
    /// If set, reads are confined to exactly these keys.
    pub allowed_keys: Option<Vec<BlobKey>>,
}

impl AuthContext {
    fn full_rights(user_id: String, realm: Realm, token_id: Option<String>) -> Self {
        Self {
            user_id,
            realm,
            can_read: true,
            can_write: true,
            can_issue_ticket: true,
            token_id,
            allowed_keys: None,
        }
    }
}

const SIGNATURE_WINDOW_SECS: u64 = 300;

/// Fetches the issuer's JWKS document. Boxed so a test double can stand in
/// for the real `reqwest`-backed implementation.
#[async_trait::async_trait]
pub trait JwksSource: Send + Sync {
    /// Fetch the current key set from the issuer's JWKS endpoint.
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// `reqwest`-backed [`JwksSource`] pointed at a fixed URL, with a 10s
/// request timeout per the service's suspension-point budget.
pub struct HttpJwksSource {
    url: String,
    client: reqwest::Client,
}

impl HttpJwksSource {
    /// Build a source pointed at `url` (the issuer's `jwks_uri`).
    pub fn new(url: impl Into<String>) -> Self {
        #[allow(clippy::unwrap_used)]
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        Self { url: url.into(), client }
    }
}

#[async_trait::async_trait]
impl JwksSource for HttpJwksSource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::Jwks(e.to_string()))?;
        resp.json::<JwkSet>()
            .await
            .map_err(|e| AuthError::Jwks(e.to_string()))
    }
}

struct JwksCache {
    ttl_secs: u64,
    cached: RwLock<Option<(JwkSet, u64)>>,
}

impl JwksCache {
    fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs, cached: RwLock::new(None) }
    }

    fn fresh(&self, now: u64) -> Result<Option<JwkSet>, AuthError> {
        let guard = self.cached.read().map_err(|_| AuthError::Poisoned)?;
        Ok(guard
            .as_ref()
            .filter(|(_, fetched_at)| now.saturating_sub(*fetched_at) < self.ttl_secs)
            .map(|(set, _)| set.clone()))
    }

    fn store(&self, set: JwkSet, now: u64) -> Result<(), AuthError> {
        let mut guard = self.cached.write().map_err(|_| AuthError::Poisoned)?;
        *guard = Some((set, now));
        Ok(())
    }
}

/// Resolves an inbound request's credential to an [`AuthContext`], probing
/// in the order signed-pubkey headers, then bearer JWT, then opaque token.
pub struct AuthResolver {
    pubkeys: Arc<dyn AuthorizedPubkeyStore>,
    tokens: Arc<dyn TokenStore>,
    jwks_source: Arc<dyn JwksSource>,
    jwks_cache: JwksCache,
    issuer: String,
}

impl AuthResolver {
    /// Wire a resolver against its three credential backends.
    pub fn new(
        pubkeys: Arc<dyn AuthorizedPubkeyStore>,
        tokens: Arc<dyn TokenStore>,
        jwks_source: Arc<dyn JwksSource>,
        jwks_ttl_secs: u64,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            pubkeys,
            tokens,
            jwks_source,
            jwks_cache: JwksCache::new(jwks_ttl_secs),
            issuer: issuer.into(),
        }
    }

    /// Resolve a request's credential per the probe order spec.md §4.7
    /// names: signed headers, then bearer JWT, then opaque token lookup.
    pub async fn resolve(&self, req: ResolveRequest<'_>, now: u64) -> Result<AuthContext, AuthError> {
        if let Some(signed) = req.signed {
            return self.resolve_signed(signed, req, now);
        }
        if let Some(bearer) = req.bearer {
            if bearer.splitn(3, '.').count() == 3 {
                return self.resolve_jwt(bearer, now).await;
            }
            return self.resolve_token(bearer, now);
        }
        Err(AuthError::MissingCredential)
    }

    fn resolve_signed(
        &self,
        signed: SignedHeaders<'_>,
        req: ResolveRequest<'_>,
        now: u64,
    ) -> Result<AuthContext, AuthError> {
        let bound = self
            .pubkeys
            .lookup(signed.pubkey)?
            .ok_or(AuthError::UnknownPubkey)?;

        let skew = now.abs_diff(signed.timestamp);
        if skew > SIGNATURE_WINDOW_SECS {
            return Err(AuthError::TimestampSkew);
        }

        let body_digest = hex::encode(Sha256::digest(req.body));
        let signing_string = format!(
            "{}.{}.{}.{}",
            signed.timestamp, req.method, req.path_and_query, body_digest
        );

        let key_bytes = hex::decode(signed.pubkey).map_err(|_| AuthError::MalformedHeader("pubkey"))?;
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&key_bytes).map_err(|_| AuthError::MalformedHeader("pubkey"))?;
        let sig_bytes = hex::decode(signed.signature).map_err(|_| AuthError::MalformedHeader("signature"))?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|_| AuthError::MalformedHeader("signature"))?;

        verifying_key
            .verify(signing_string.as_bytes(), &signature)
            .map_err(|_| AuthError::SignatureInvalid)?;

        Ok(AuthContext::full_rights(bound.user_id.clone(), Realm::for_user(&bound.user_id), None))
    }

    async fn resolve_jwt(&self, bearer: &str, now: u64) -> Result<AuthContext, AuthError> {
        let header = jsonwebtoken::decode_header(bearer).map_err(|_| AuthError::JwtInvalid)?;
        let kid = header.kid.ok_or(AuthError::JwtInvalid)?;

        let jwks = match self.jwks_cache.fresh(now)? {
            Some(set) => set,
            None => {
                let set = self.jwks_source.fetch().await?;
                self.jwks_cache.store(set.clone(), now)?;
                set
            }
        };
        let jwk = jwks.find(&kid).ok_or(AuthError::JwtInvalid)?;
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|_| AuthError::JwtInvalid)?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;

        let claims = decode::<serde_json::Value>(bearer, &decoding_key, &validation)
            .map_err(|_| AuthError::JwtInvalid)?
            .claims;

        let token_use = claims.get("token_use").and_then(|v| v.as_str());
        if token_use != Some("access") {
            return Err(AuthError::JwtInvalid);
        }
        let sub = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or(AuthError::JwtInvalid)?;

        Ok(AuthContext::full_rights(sub.to_owned(), Realm::for_user(sub), None))
    }

    fn resolve_token(&self, raw: &str, now: u64) -> Result<AuthContext, AuthError> {
        let token = self
            .tokens
            .get(raw, now)?
            .ok_or(AuthError::TokenNotFound)?;
        match token {
            Token::User(t) => Ok(AuthContext::full_rights(t.user_id.clone(), Realm::for_user(&t.user_id), Some(t.id))),
            Token::Agent(t) => Ok(AuthContext::full_rights(t.user_id.clone(), Realm::for_user(&t.user_id), Some(t.id))),
            Token::Ticket(t) => {
                let can_write = t
                    .commit
                    .as_ref()
                    .is_some_and(|c| c.root.is_none());
                Ok(AuthContext {
                    user_id: t.issuer_token_id.clone(),
                    realm: t.realm.clone(),
                    can_read: true,
                    can_write,
                    can_issue_ticket: false,
                    token_id: Some(t.id),
                    allowed_keys: t.read_scope,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;
    use crate::pending::{AuthorizedPubkey, MemoryAuthorizedPubkeyStore};
    use ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    struct NeverCalledJwks;

    #[async_trait::async_trait]
    impl JwksSource for NeverCalledJwks {
        async fn fetch(&self) -> Result<JwkSet, AuthError> {
            Err(AuthError::Jwks("not needed for this test".to_owned()))
        }
    }

    fn make_resolver() -> (
        AuthResolver,
        Arc<MemoryAuthorizedPubkeyStore>,
        Arc<MemoryTokenStore>,
    ) {
        let pubkeys = Arc::new(MemoryAuthorizedPubkeyStore::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let resolver = AuthResolver::new(
            pubkeys.clone() as Arc<dyn AuthorizedPubkeyStore>,
            tokens.clone() as Arc<dyn TokenStore>,
            Arc::new(NeverCalledJwks),
            300,
            "https://issuer.example/",
        );
        (resolver, pubkeys, tokens)
    }

    #[tokio::test]
    async fn signed_request_with_valid_signature_resolves_full_rights() {
        let (resolver, pubkeys, _tokens) = make_resolver();
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let verifying_key = VerifyingKey::from(&signing_key);
        let pubkey_hex = hex::encode(verifying_key.to_encoded_point(true).as_bytes());
        pubkeys
            .store(AuthorizedPubkey { pubkey: pubkey_hex.clone(), user_id: "alice".to_owned(), created_at: 0 })
            .expect("store");

        let body = b"";
        let digest = hex::encode(Sha256::digest(body));
        let signing_string = format!("{}.{}.{}.{}", 1_000u64, "GET", "/api/realm/usr_alice/usage", digest);
        let signature: Signature = signing_key.sign(signing_string.as_bytes());
        let signature_hex = hex::encode(signature.to_bytes());

        let req = ResolveRequest {
            signed: Some(SignedHeaders { pubkey: &pubkey_hex, timestamp: 1_000, signature: &signature_hex }),
            bearer: None,
            method: "GET",
            path_and_query: "/api/realm/usr_alice/usage",
            body,
        };
        let ctx = resolver.resolve(req, 1_000).await.expect("resolve");
        assert_eq!(ctx.user_id, "alice");
        assert!(ctx.can_write);
    }

    #[tokio::test]
    async fn signed_request_outside_freshness_window_is_rejected() {
        let (resolver, pubkeys, _tokens) = make_resolver();
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let verifying_key = VerifyingKey::from(&signing_key);
        let pubkey_hex = hex::encode(verifying_key.to_encoded_point(true).as_bytes());
        pubkeys
            .store(AuthorizedPubkey { pubkey: pubkey_hex.clone(), user_id: "alice".to_owned(), created_at: 0 })
            .expect("store");

        let digest = hex::encode(Sha256::digest(b""));
        let signing_string = format!("{}.{}.{}.{}", 1_000u64, "GET", "/api/realm/usr_alice/usage", digest);
        let signature: Signature = signing_key.sign(signing_string.as_bytes());
        let signature_hex = hex::encode(signature.to_bytes());

        let req = ResolveRequest {
            signed: Some(SignedHeaders { pubkey: &pubkey_hex, timestamp: 1_000, signature: &signature_hex }),
            bearer: None,
            method: "GET",
            path_and_query: "/api/realm/usr_alice/usage",
            body: b"",
        };
        let result = resolver.resolve(req, 1_000 + 601).await;
        assert!(matches!(result, Err(AuthError::TimestampSkew)));
    }

    #[tokio::test]
    async fn opaque_ticket_token_resolves_scoped_rights() {
        let (resolver, _pubkeys, tokens) = make_resolver();
        let realm = Realm::for_user("alice");
        let ticket = tokens.create_ticket(realm.clone(), "issuer1", None, None, 3600, 0);

        let req = ResolveRequest {
            signed: None,
            bearer: Some(&ticket.id),
            method: "GET",
            path_and_query: "/api/realm/usr_alice/usage",
            body: b"",
        };
        let ctx = resolver.resolve(req, 0).await.expect("resolve");
        assert_eq!(ctx.realm, realm);
        assert!(ctx.can_read);
        assert!(!ctx.can_write, "no commit config means no write rights");
        assert!(!ctx.can_issue_ticket);
    }
}
