//! Request-scoped rate limiting with identity correlation.
//!
//! Every gated request is counted against a fixed (non-sliding) window keyed by
//! `(resolved identity, source address)`. Identity resolution correlates
//! anonymous and authenticated callers: an `X-API-Key` or bearer token is
//! hashed and mapped to its owning tenant, so the same tenant shares one budget
//! across credentials of the same kind, while unauthenticated callers share the
//! `"anon"` bucket per address. Credential lookups are cached for 60 seconds to
//! avoid a database round trip on every request.
//!
//! All state is process-local and rebuilt from nothing after a restart.
//! Horizontal scaling would need a shared counting store behind the same
//! `check(identity, address)` interface; call sites would not change.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{auth, db::DbPool, error::AppError, state::AppState};

/// How long a resolved credential -> client-id mapping stays cached.
/// Expires independently of rate-limit windows.
const IDENTITY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Identity used when no credential resolves to a tenant.
const ANON_IDENTITY: &str = "anon";

/// Outcome of a rate-limit check.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Rejected; the caller may retry after this many seconds (always >= 1).
    Reject { retry_after: u64 },
}

struct WindowEntry {
    started: Instant,
    count: u32,
}

struct CachedIdentity {
    client_id: String,
    expires_at: Instant,
}

/// Fixed-window rate limiter with a credential-identity cache.
///
/// The window map and the identity cache are each guarded by their own mutex.
/// Locks are held only for the duration of the map operation, never across a
/// database call, so slow storage cannot serialize unrelated requests.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowEntry>>,
    identity_cache: Mutex<HashMap<String, CachedIdentity>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_seconds: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_seconds),
            windows: Mutex::new(HashMap::new()),
            identity_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Check one request against the window for `(identity, address)`.
    pub fn check(&self, identity: &str, address: &str) -> Decision {
        self.decide(format!("{identity}:{address}"), Instant::now())
    }

    /// Window state machine: no window (or an expired one) starts fresh with
    /// count 1; an active window increments until the limit, then rejects with
    /// the seconds left in the window. The reset and its first increment happen
    /// under one lock acquisition, so no increment is ever lost.
    fn decide(&self, key: String, now: Instant) -> Decision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match windows.get_mut(&key) {
            Some(entry) if now.duration_since(entry.started) < self.window => {
                if entry.count < self.limit {
                    entry.count += 1;
                    Decision::Allow
                } else {
                    let elapsed = now.duration_since(entry.started).as_secs();
                    let retry_after = self.window.as_secs().saturating_sub(elapsed).max(1);
                    Decision::Reject { retry_after }
                }
            }
            _ => {
                windows.insert(
                    key,
                    WindowEntry {
                        started: now,
                        count: 1,
                    },
                );
                Decision::Allow
            }
        }
    }

    /// Resolve the caller's identity from request credentials.
    ///
    /// `X-API-Key` takes precedence over `Authorization: Bearer`. Returns
    /// `None` when neither credential resolves to a tenant; the caller then
    /// falls into the `"anon"` bucket. Resolution failures here mean the
    /// request would fail authentication anyway, but it is still counted.
    pub async fn resolve_identity(
        &self,
        pool: &DbPool,
        headers: &HeaderMap,
    ) -> Result<Option<String>, sqlx::Error> {
        if let Some(api_key) = headers.get("X-API-Key").and_then(|h| h.to_str().ok()) {
            return self
                .lookup_credential(pool, &format!("api:{api_key}"), api_key, LookupKind::ApiKey)
                .await;
        }

        if let Some(token) = headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
        {
            return self
                .lookup_credential(pool, &format!("token:{token}"), token, LookupKind::Token)
                .await;
        }

        Ok(None)
    }

    async fn lookup_credential(
        &self,
        pool: &DbPool,
        cache_key: &str,
        credential: &str,
        kind: LookupKind,
    ) -> Result<Option<String>, sqlx::Error> {
        if let Some(cached) = self.cache_lookup(cache_key, Instant::now()) {
            return Ok(Some(cached));
        }

        let sha = auth::sha256_hex(credential);
        let client_id: Option<uuid::Uuid> = match kind {
            LookupKind::ApiKey => {
                sqlx::query_scalar("SELECT id FROM api_clients WHERE api_key_sha = $1")
                    .bind(&sha)
                    .fetch_optional(pool)
                    .await?
            }
            LookupKind::Token => {
                sqlx::query_scalar(
                    "SELECT c.id FROM api_clients c
                     JOIN access_tokens t ON t.api_client_id = c.id
                     WHERE t.token_sha = $1",
                )
                .bind(&sha)
                .fetch_optional(pool)
                .await?
            }
        };

        let client_id = client_id.map(|id| id.to_string());
        if let Some(ref id) = client_id {
            self.cache_store(cache_key, id.clone(), Instant::now());
        }
        Ok(client_id)
    }

    fn cache_lookup(&self, key: &str, now: Instant) -> Option<String> {
        let mut cache = self
            .identity_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let expired = match cache.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.client_id.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.remove(key);
        }
        None
    }

    fn cache_store(&self, key: &str, client_id: String, now: Instant) {
        let mut cache = self
            .identity_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache.insert(
            key.to_string(),
            CachedIdentity {
                client_id,
                expires_at: now + IDENTITY_CACHE_TTL,
            },
        );
    }
}

enum LookupKind {
    ApiKey,
    Token,
}

/// Source address for the window key: first `X-Forwarded-For` entry if
/// present, else the transport-level peer address, else `"unknown"`.
fn client_address(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate-limiting middleware applied to every `/v1` route.
///
/// Runs before authentication: over-limit callers are rejected with 429 and a
/// `Retry-After` header without touching the handlers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state
        .rate_limiter
        .resolve_identity(&state.pool, request.headers())
        .await?
        .unwrap_or_else(|| ANON_IDENTITY.to_string());
    let address = client_address(&request);

    match state.rate_limiter.check(&identity, &address) {
        Decision::Allow => Ok(next.run(request).await),
        Decision::Reject { retry_after } => {
            tracing::debug!(%identity, %address, retry_after, "rate limit exceeded");
            Err(AppError::RateLimited { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(3, 60);
        let t0 = Instant::now();

        for _ in 0..3 {
            assert_eq!(limiter.decide("c1:1.2.3.4".into(), t0), Decision::Allow);
        }
        match limiter.decide("c1:1.2.3.4".into(), t0) {
            Decision::Reject { retry_after } => {
                assert!(retry_after >= 1 && retry_after <= 60);
            }
            Decision::Allow => panic!("fourth request should be rejected"),
        }
    }

    #[test]
    fn retry_after_shrinks_as_window_ages() {
        let limiter = RateLimiter::new(1, 60);
        let t0 = Instant::now();
        assert_eq!(limiter.decide("k".into(), t0), Decision::Allow);

        let late = t0 + Duration::from_secs(45);
        assert_eq!(
            limiter.decide("k".into(), late),
            Decision::Reject { retry_after: 15 }
        );
    }

    #[test]
    fn retry_after_never_below_one_second() {
        let limiter = RateLimiter::new(1, 60);
        let t0 = Instant::now();
        assert_eq!(limiter.decide("k".into(), t0), Decision::Allow);

        // 59.5s in: integer seconds remaining would floor to 0
        let almost = t0 + Duration::from_millis(59_500);
        assert_eq!(
            limiter.decide("k".into(), almost),
            Decision::Reject { retry_after: 1 }
        );
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(2, 60);
        let t0 = Instant::now();
        assert_eq!(limiter.decide("k".into(), t0), Decision::Allow);
        assert_eq!(limiter.decide("k".into(), t0), Decision::Allow);
        assert!(matches!(
            limiter.decide("k".into(), t0),
            Decision::Reject { .. }
        ));

        // A request at exactly window age starts a fresh window
        let expired = t0 + Duration::from_secs(60);
        assert_eq!(limiter.decide("k".into(), expired), Decision::Allow);
        assert_eq!(limiter.decide("k".into(), expired), Decision::Allow);
        assert!(matches!(
            limiter.decide("k".into(), expired),
            Decision::Reject { .. }
        ));
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = RateLimiter::new(1, 60);
        let t0 = Instant::now();
        assert_eq!(limiter.decide("c1:1.2.3.4".into(), t0), Decision::Allow);
        // Same identity from another address gets its own window
        assert_eq!(limiter.decide("c1:5.6.7.8".into(), t0), Decision::Allow);
        // Another identity from the first address too
        assert_eq!(limiter.decide("anon:1.2.3.4".into(), t0), Decision::Allow);
        assert!(matches!(
            limiter.decide("c1:1.2.3.4".into(), t0),
            Decision::Reject { .. }
        ));
    }

    #[test]
    fn identity_cache_roundtrip_and_expiry() {
        let limiter = RateLimiter::new(1, 60);
        let t0 = Instant::now();

        assert_eq!(limiter.cache_lookup("api:sk_x", t0), None);
        limiter.cache_store("api:sk_x", "client-1".into(), t0);
        assert_eq!(
            limiter.cache_lookup("api:sk_x", t0),
            Some("client-1".into())
        );
        assert_eq!(
            limiter.cache_lookup("api:sk_x", t0 + Duration::from_secs(59)),
            Some("client-1".into())
        );
        // TTL elapsed: entry evicted
        assert_eq!(
            limiter.cache_lookup("api:sk_x", t0 + Duration::from_secs(60)),
            None
        );
    }
}
