// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The pluggable external identity-provider seam behind `/api/oauth/*`.
//!
//! A real deployment points this at a hosted IdP (Cognito, Auth0, ...);
//! [`StaticIdentityProvider`] is the dev/test-grade implementation shipped
//! here so the routes are exercisable without one, in the same spirit as
//! `echo-config-fs::FsConfigStore` standing in for a real config backend.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::error::ApiError;

/// Public, non-secret configuration a client needs to start an OAuth flow.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthConfig {
    /// The issuer URL `awp-auth`'s JWT path also trusts.
    pub issuer: String,
    /// Public client id registered with the IdP.
    pub client_id: String,
    /// Authorization endpoint the client redirects the user to.
    pub authorize_url: String,
}

/// Response body for a successful `/api/oauth/token` code exchange.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthTokenResponse {
    /// The bearer access token the client should send thereafter.
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: &'static str,
    /// Seconds until `access_token` expires.
    pub expires_in: u64,
}

/// Response body for `/api/oauth/me`.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthUser {
    /// The authenticated user's id.
    pub user_id: String,
    /// Coarse role label; this workspace does not model fine-grained RBAC.
    pub role: String,
}

/// Exchanges an authorization code for an access token and resolves an
/// access token back to a user. `awp-api` never talks to a real IdP
/// directly; it only speaks through this trait.
pub trait IdentityProvider: Send + Sync {
    /// Public OAuth client configuration.
    fn config(&self) -> OAuthConfig;
    /// Exchange a one-time authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] if `code` is unrecognized.
    fn exchange_code(&self, code: &str) -> Result<OAuthTokenResponse, ApiError>;
    /// Resolve an access token to the user it authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] if `access_token` is unrecognized.
    fn me(&self, access_token: &str) -> Result<OAuthUser, ApiError>;
}

/// Dev/test `IdentityProvider`: a fixed code-to-user map supplied at
/// construction, standing in for a real IdP's authorization-code grant.
pub struct StaticIdentityProvider {
    config: OAuthConfig,
    codes: HashMap<String, String>,
    issued: RwLock<HashMap<String, String>>,
}

impl StaticIdentityProvider {
    /// Build a provider with a fixed `code -> user_id` exchange table.
    #[must_use]
    pub fn new(config: OAuthConfig, codes: HashMap<String, String>) -> Self {
        Self {
            config,
            codes,
            issued: RwLock::new(HashMap::new()),
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn config(&self) -> OAuthConfig {
        self.config.clone()
    }

    fn exchange_code(&self, code: &str) -> Result<OAuthTokenResponse, ApiError> {
        let user_id = self
            .codes
            .get(code)
            .cloned()
            .ok_or(ApiError::Unauthenticated)?;
        let access_token = format!("devtok_{code}");
        let mut issued = self
            .issued
            .write()
            .map_err(|_| ApiError::Internal("identity provider lock poisoned".to_owned()))?;
        issued.insert(access_token.clone(), user_id);
        Ok(OAuthTokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: 3600,
        })
    }

    fn me(&self, access_token: &str) -> Result<OAuthUser, ApiError> {
        let issued = self
            .issued
            .read()
            .map_err(|_| ApiError::Internal("identity provider lock poisoned".to_owned()))?;
        let user_id = issued
            .get(access_token)
            .cloned()
            .ok_or(ApiError::Unauthenticated)?;
        Ok(OAuthUser {
            user_id,
            role: "user".to_owned(),
        })
    }
}
