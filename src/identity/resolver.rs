//! Identity resolution.
//!
//! Two independent, possibly inconsistent signals exist for who the actor
//! is: a server-issued session whose claims may carry a wallet address, and
//! a client-side connected wallet. Resolution reconciles them into one
//! authoritative identity, first match wins:
//!
//! 1. session claims with a wallet address → user lookup by that wallet;
//! 2. connected wallet → direct lookup (users that predate session auth);
//! 3. neither → `Unauthenticated`.
//!
//! Every sign-in, sign-out, or token refresh re-runs resolution. Re-entrant
//! reads mid-flight are tolerated: the resolver keeps an in-memory
//! projection that is swapped atomically, and of two racing resolutions the
//! one that *started* later wins, regardless of completion order.

use crate::identity::error::IdentityError;
use crate::identity::session::SessionClaims;
use crate::identity::teardown::TeardownCoordinator;
use crate::identity::types::{normalize_wallet, Identity};
use crate::persist::Backend;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub struct IdentityResolver {
    backend: Arc<dyn Backend>,
    teardown: Arc<TeardownCoordinator>,
    projection: RwLock<Arc<Identity>>,
    next_ticket: AtomicU64,
    applied_ticket: AtomicU64,
}

impl IdentityResolver {
    pub fn new(backend: Arc<dyn Backend>, teardown: Arc<TeardownCoordinator>) -> Self {
        Self {
            backend,
            teardown,
            projection: RwLock::new(Arc::new(Identity::Unauthenticated)),
            next_ticket: AtomicU64::new(0),
            applied_ticket: AtomicU64::new(0),
        }
    }

    /// Resolve the actor from the available signals and update the
    /// projection. A lookup failure leaves the projection untouched.
    pub async fn resolve(
        &self,
        session: Option<&SessionClaims>,
        connected_wallet: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        if self.teardown.is_tearing_down() {
            // Never hand out the pre-teardown identity during the window.
            return Ok(Identity::Unauthenticated);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let resolved = self.lookup(session, connected_wallet).await?;
        self.apply(ticket, resolved.clone());
        Ok(resolved)
    }

    async fn lookup(
        &self,
        session: Option<&SessionClaims>,
        connected_wallet: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        if let Some(wallet) = session.and_then(|claims| claims.wallet.as_deref()) {
            return self.lookup_wallet(wallet, "session").await;
        }
        if let Some(wallet) = connected_wallet {
            return self.lookup_wallet(wallet, "connected wallet").await;
        }
        Ok(Identity::Unauthenticated)
    }

    async fn lookup_wallet(&self, wallet: &str, source: &str) -> Result<Identity, IdentityError> {
        let wallet = normalize_wallet(wallet);
        if wallet.is_empty() {
            return Ok(Identity::Unauthenticated);
        }
        match self.backend.find_user_by_wallet(&wallet).await {
            Ok(Some(user)) if user.is_active() => {
                debug!("resolved {} via {} to role {}", wallet, source, user.role);
                Ok(Identity::authenticated(user))
            }
            Ok(_) => {
                // No row for this wallet: do not auto-create, do not grant
                // default permissions.
                debug!("no user row for {} ({}), unauthenticated", wallet, source);
                Ok(Identity::Unauthenticated)
            }
            Err(e) => {
                warn!("identity lookup for {} failed: {}", wallet, e);
                Err(IdentityError::LookupFailed(e))
            }
        }
    }

    /// Apply a completed resolution, last-started-wins. The write lock
    /// serializes appliers so the ticket check and the swap are one step.
    fn apply(&self, ticket: u64, identity: Identity) {
        let mut guard = self.projection.write().unwrap();
        if ticket <= self.applied_ticket.load(Ordering::Acquire) {
            return;
        }
        self.applied_ticket.store(ticket, Ordering::Release);
        *guard = Arc::new(identity);
    }

    /// Current projection. Reads `Unauthenticated` for the whole teardown
    /// window, whatever the stored value still says.
    pub fn current(&self) -> Arc<Identity> {
        if self.teardown.is_tearing_down() {
            return Arc::new(Identity::Unauthenticated);
        }
        self.projection.read().unwrap().clone()
    }

    /// Drop the projection to `Unauthenticated`, consuming a ticket so any
    /// still-in-flight resolution that started earlier cannot resurrect the
    /// previous identity.
    pub fn clear(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(ticket, Identity::Unauthenticated);
    }
}
