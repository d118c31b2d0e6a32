//! Session bootstrap and access token ownership.
//!
//! The access token lives only in memory. On startup the session is restored
//! by exchanging the HttpOnly refresh cookie held in the HTTP client's cookie
//! store. Provides:
//! - Single-flight refresh: concurrent bootstraps share one exchange
//! - One retry when the first exchange is rejected before the cookie lands
//! - Login/logout always win over a refresh that was already in flight
//! - A teardown flag that stops late writes after the owner goes away

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use kyc_models::AccessTokenResponse;

use crate::client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_refresh;

/// Source of refreshed access tokens.
#[async_trait]
pub trait RefreshProvider: Send + Sync {
    /// Exchange the refresh credential for a new access token.
    ///
    /// A rejected credential must be reported as [`ClientError::Unauthorized`].
    async fn refresh(&self) -> ClientResult<AccessTokenResponse>;
}

#[async_trait]
impl RefreshProvider for ApiClient {
    async fn refresh(&self) -> ClientResult<AccessTokenResponse> {
        self.refresh_token().await
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    /// True until the first bootstrap attempt resolves
    pub is_bootstrapping: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Option<String>>>;

struct PendingRefresh {
    id: u64,
    /// Login/logout epoch when the exchange started
    epoch: u64,
    future: SharedRefresh,
}

/// Owner of the access token.
///
/// Consumers read through [`access_token`](Self::access_token),
/// [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe); only
/// [`login`](Self::login), [`logout`](Self::logout) and
/// [`bootstrap`](Self::bootstrap) change it.
pub struct SessionManager {
    provider: Arc<dyn RefreshProvider>,
    state: watch::Sender<SessionSnapshot>,
    in_flight: Mutex<Option<PendingRefresh>>,
    next_refresh_id: AtomicU64,
    epoch: AtomicU64,
    torn_down: AtomicBool,
}

impl SessionManager {
    /// Create a session that is bootstrapping and has no token yet.
    pub fn new(provider: Arc<dyn RefreshProvider>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            access_token: None,
            is_bootstrapping: true,
        });

        Self {
            provider,
            state,
            in_flight: Mutex::new(None),
            next_refresh_id: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn is_bootstrapping(&self) -> bool {
        self.state.borrow().is_bootstrapping
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Watch for session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Token for a protected call.
    pub fn bearer(&self) -> ClientResult<String> {
        self.access_token().ok_or(ClientError::NotAuthenticated)
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Store a token obtained from a fresh login.
    pub fn login(&self, token: impl Into<String>) {
        let token = token.into();
        self.state.send_modify(|s| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            s.access_token = Some(token);
        });
        info!("Session authenticated via login");
    }

    /// Forget the access token.
    pub fn logout(&self) {
        self.state.send_modify(|s| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            s.access_token = None;
        });
        info!("Session logged out");
    }

    /// Stop applying bootstrap results. An exchange already on the wire is
    /// left to finish, its outcome is dropped.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Restore the session from the refresh cookie.
    ///
    /// Safe to call from several tasks at once: only one exchange is issued
    /// and every caller observes its outcome.
    pub async fn bootstrap(&self) {
        if self.access_token().is_some() {
            debug!("Access token already present, skipping refresh");
            self.finish_bootstrap();
            return;
        }

        let (id, epoch, refresh) = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!("Refresh already in flight, joining it");
                    (pending.id, pending.epoch, pending.future.clone())
                }
                None => {
                    let id = self.next_refresh_id.fetch_add(1, Ordering::SeqCst);
                    let epoch = self.epoch.load(Ordering::SeqCst);
                    let future = refresh_exchange(Arc::clone(&self.provider))
                        .boxed()
                        .shared();
                    *in_flight = Some(PendingRefresh {
                        id,
                        epoch,
                        future: future.clone(),
                    });
                    (id, epoch, future)
                }
            }
        };

        let token = refresh.await;

        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.as_ref().map(|p| p.id) == Some(id) {
                *in_flight = None;
            }
        }

        self.apply_refresh(epoch, token);
        self.finish_bootstrap();
    }

    fn apply_refresh(&self, epoch: u64, token: Option<String>) {
        if self.torn_down.load(Ordering::SeqCst) {
            debug!("Session torn down, discarding refresh outcome");
            return;
        }

        self.state.send_if_modified(|s| {
            // Compared under the channel lock so a concurrent login is ordered.
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("Session changed during refresh, keeping current token");
                return false;
            }
            if s.access_token == token {
                return false;
            }
            s.access_token = token;
            true
        });
    }

    fn finish_bootstrap(&self) {
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }

        self.state.send_if_modified(|s| {
            let changed = s.is_bootstrapping;
            s.is_bootstrapping = false;
            changed
        });
    }
}

/// One refresh exchange, with a single retry on rejection.
async fn refresh_exchange(provider: Arc<dyn RefreshProvider>) -> Option<String> {
    // Let a cookie set by a just-finished response reach the jar.
    tokio::task::yield_now().await;
    let mut result = provider.refresh().await;

    if matches!(&result, Err(e) if e.is_unauthorized()) {
        debug!("Refresh rejected, retrying once");
        record_refresh("retry");
        tokio::task::yield_now().await;
        result = provider.refresh().await;
    }

    match result.map(AccessTokenResponse::into_token) {
        Ok(Some(token)) => {
            record_refresh("success");
            info!("Session restored from refresh cookie");
            Some(token)
        }
        Ok(None) => {
            record_refresh("failure");
            warn!("Refresh response carried no access token");
            None
        }
        Err(e) => {
            record_refresh("failure");
            info!("No session restored: {}", e);
            None
        }
    }
}
