// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `awpd`: the AWP storage service daemon. Wires the in-memory reference
//! implementations of every `awp-*` trait into an [`awp_api::AppState`],
//! serves the HTTP surface, and runs the garbage collector on an interval.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use awp_api::{AppState, IdentityProvider, Limits, OAuthConfig, StaticIdentityProvider, DEFAULT_MAX_NODE_BYTES};
use awp_auth::{AuthResolver, HttpJwksSource, MemoryAuthorizedPubkeyStore, MemoryPendingAuthStore, MemoryTokenStore};
use awp_cas::{BlobStore, FsStore, MemoryStore};
use awp_gc::{GarbageCollector, GcConfig};
use awp_ledger::{MemoryOwnershipLedger, MemoryRefCounter};
use awp_node::NodeLimits;
use awp_store::{MemoryCommitStore, MemoryDepotStore};
use awp_usage::MemoryUsageMeter;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// AWP storage service daemon.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Config {
    /// Address the HTTP server binds to.
    #[arg(long, env = "AWPD_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Directory to store blobs on disk. Omit to use the in-memory backend.
    #[arg(long, env = "AWPD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Maximum name length, in bytes, for a single collection entry.
    #[arg(long, env = "AWPD_MAX_NAME_BYTES", default_value_t = NodeLimits::default().max_name_bytes)]
    max_name_bytes: usize,

    /// Maximum encoded byte size for a single node (chunk/file/collection).
    #[arg(long, env = "AWPD_MAX_NODE_BYTES", default_value_t = DEFAULT_MAX_NODE_BYTES)]
    max_node_bytes: u64,

    /// Hard ceiling on a requested ticket TTL, in seconds.
    #[arg(long, env = "AWPD_MAX_TICKET_TTL_SECS", default_value_t = 24 * 3600)]
    max_ticket_ttl_secs: u64,

    /// Hard ceiling on a requested agent-token TTL, in seconds.
    #[arg(long, env = "AWPD_MAX_AGENT_TOKEN_TTL_SECS", default_value_t = 30 * 24 * 3600)]
    max_agent_token_ttl_secs: u64,

    /// Ref-count entries younger than this are never garbage collected.
    #[arg(long, env = "AWPD_GC_PROTECTION_WINDOW_SECS", default_value_t = GcConfig::default().protection_window_secs)]
    gc_protection_window_secs: u64,

    /// Pending entries fetched per GC page.
    #[arg(long, env = "AWPD_GC_BATCH_SIZE", default_value_t = GcConfig::default().batch_size)]
    gc_batch_size: usize,

    /// Maximum number of pages processed per GC run.
    #[arg(long, env = "AWPD_GC_MAX_BATCHES", default_value_t = GcConfig::default().max_batches)]
    gc_max_batches: usize,

    /// Seconds between GC sweeps.
    #[arg(long, env = "AWPD_GC_INTERVAL_SECS", default_value_t = 300)]
    gc_interval_secs: u64,

    /// OAuth/OIDC issuer URL trusted for bearer JWTs.
    #[arg(long, env = "AWPD_OAUTH_ISSUER", default_value = "https://auth.example.com")]
    oauth_issuer: String,

    /// OAuth client id handed to browser-based clients.
    #[arg(long, env = "AWPD_OAUTH_CLIENT_ID", default_value = "awp-console")]
    oauth_client_id: String,

    /// Authorization endpoint clients redirect to in the OAuth flow.
    #[arg(long, env = "AWPD_OAUTH_AUTHORIZE_URL", default_value = "https://auth.example.com/authorize")]
    oauth_authorize_url: String,

    /// Seconds a fetched JWKS document is trusted before refetching.
    #[arg(long, env = "AWPD_JWKS_TTL_SECS", default_value_t = 3600)]
    jwks_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let blobs: Arc<dyn BlobStore> = match &config.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using filesystem blob store");
            Arc::new(FsStore::open(dir).context("opening filesystem blob store")?)
        }
        None => {
            warn!("no --data-dir given, using in-memory blob store (not durable)");
            Arc::new(MemoryStore::new())
        }
    };

    let ownership = Arc::new(MemoryOwnershipLedger::new());
    let refs = Arc::new(MemoryRefCounter::new());
    let usage = Arc::new(MemoryUsageMeter::new());
    let commits = Arc::new(MemoryCommitStore::new());
    let depots = Arc::new(MemoryDepotStore::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let pending_auth = Arc::new(MemoryPendingAuthStore::new());
    let pubkeys = Arc::new(MemoryAuthorizedPubkeyStore::new());

    let jwks_source = Arc::new(HttpJwksSource::new(format!(
        "{}/.well-known/jwks.json",
        config.oauth_issuer.trim_end_matches('/')
    )));
    let resolver = Arc::new(AuthResolver::new(
        pubkeys.clone(),
        tokens.clone(),
        jwks_source,
        config.jwks_ttl_secs,
        config.oauth_issuer.clone(),
    ));

    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider::new(
        OAuthConfig {
            issuer: config.oauth_issuer.clone(),
            client_id: config.oauth_client_id.clone(),
            authorize_url: config.oauth_authorize_url.clone(),
        },
        HashMap::new(),
    ));

    let limits = Limits {
        node: NodeLimits { max_name_bytes: config.max_name_bytes },
        max_node_bytes: config.max_node_bytes,
        max_ticket_ttl_secs: config.max_ticket_ttl_secs,
        max_agent_token_ttl_secs: config.max_agent_token_ttl_secs,
    };

    let state = AppState {
        blobs: blobs.clone(),
        ownership: ownership.clone(),
        refs: refs.clone(),
        usage: usage.clone(),
        commits,
        depots,
        tokens,
        pending_auth,
        pubkeys,
        resolver,
        identity,
        limits,
    };

    let gc = GarbageCollector::new(blobs, ownership, refs, usage);
    let gc_config = GcConfig {
        protection_window_secs: config.gc_protection_window_secs,
        batch_size: config.gc_batch_size,
        max_batches: config.gc_max_batches,
    };
    tokio::spawn(gc_loop(gc, gc_config, config.gc_interval_secs));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "awpd listening");

    axum::serve(listener, awp_api::router(state))
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn gc_loop(gc: GarbageCollector, config: GcConfig, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let report = gc.run(now, &config);
        info!(
            entries_processed = report.entries_processed,
            blobs_erased = report.blobs_erased,
            errors = report.errors,
            "gc sweep complete"
        );
    }
}
