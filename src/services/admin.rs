//! Authorization cache
//!
//! Memoizes the admin flag of the resident session. Concurrent callers
//! share one in-flight check per session identity, and every identity
//! change bumps an epoch so a check that lands late can never write its
//! result into another identity's flag.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::api::Transport;
use crate::models::Session;

/// Remote endpoint answering whether the caller holds the Admin role
pub const ADMIN_CHECK_PATH: &str = "/roles/me/Admin";

/// Shared admin check; resolves to the admin flag (`false` on failure)
pub type AdminCheck = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
struct AdminState {
    /// Bumped on every identity change
    epoch: u64,
    /// Identity the flag and checks belong to
    identity: Option<String>,
    flag: Option<bool>,
    checks: HashMap<String, (u64, AdminCheck)>,
    next_check: u64,
}

impl AdminState {
    fn reset(&mut self, identity: Option<String>) {
        self.epoch += 1;
        self.identity = identity;
        self.flag = None;
        self.checks.clear();
    }
}

/// Memoized admin flag for the resident session
pub struct AuthorizationCache {
    transport: Arc<Transport>,
    session: watch::Receiver<Option<Session>>,
    state: Mutex<AdminState>,
}

impl AuthorizationCache {
    pub fn new(transport: Arc<Transport>, session: watch::Receiver<Option<Session>>) -> Self {
        Self {
            transport,
            session,
            state: Mutex::new(AdminState::default()),
        }
    }

    fn current_identity(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|s| s.id.clone())
    }

    fn lock(&self) -> MutexGuard<'_, AdminState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the state, resetting it if the session identity moved on
    /// without an explicit reset
    fn lock_for(&self, identity: &str) -> MutexGuard<'_, AdminState> {
        let mut state = self.lock();
        if state.identity.as_deref() != Some(identity) {
            state.reset(Some(identity.to_string()));
        }
        state
    }

    /// Forget the flag and every pending check
    ///
    /// Called by the session store whenever the session identity changes.
    pub fn reset(&self) {
        let identity = self.current_identity();
        self.lock().reset(identity);
        tracing::debug!("Authorization cache reset");
    }

    /// The in-flight or resolved check for the current identity
    ///
    /// Starts one if none exists. With no session the check resolves to
    /// `false` without touching the network.
    pub fn admin_check(self: &Arc<Self>) -> AdminCheck {
        let Some(identity) = self.current_identity() else {
            return future::ready(false).boxed().shared();
        };

        let mut state = self.lock_for(&identity);
        if let Some((_, check)) = state.checks.get(&identity) {
            return check.clone();
        }
        self.start_check(&mut state, identity)
    }

    /// Query the admin flag for the current session
    ///
    /// Joins a check that is still in flight; otherwise issues exactly one
    /// fresh query and makes it the shared check. Fails closed: a network
    /// failure resolves to `false` and is not cached.
    pub async fn check_is_admin(self: &Arc<Self>) -> bool {
        let Some(identity) = self.current_identity() else {
            return false;
        };

        let check = {
            let mut state = self.lock_for(&identity);
            let in_flight = state
                .checks
                .get(&identity)
                .filter(|(_, check)| check.peek().is_none())
                .map(|(_, check)| check.clone());
            match in_flight {
                Some(check) => check,
                None => self.start_check(&mut state, identity),
            }
        };
        check.await
    }

    /// Start the shared check in the background
    pub fn spawn_check(self: &Arc<Self>) {
        let check = self.admin_check();
        tokio::spawn(check);
    }

    /// Last resolved flag for the current identity; `false` while unknown
    /// or pending
    pub fn is_admin(&self) -> bool {
        let Some(identity) = self.current_identity() else {
            return false;
        };
        let state = self.lock();
        state.identity.as_deref() == Some(identity.as_str()) && state.flag == Some(true)
    }

    /// Whether a shared check, in flight or resolved, exists for the current
    /// identity
    pub fn has_check(&self) -> bool {
        let Some(identity) = self.current_identity() else {
            return false;
        };
        let state = self.lock();
        state.identity.as_deref() == Some(identity.as_str()) && state.checks.contains_key(&identity)
    }

    fn start_check(self: &Arc<Self>, state: &mut AdminState, identity: String) -> AdminCheck {
        state.next_check += 1;
        let serial = state.next_check;
        let epoch = state.epoch;

        let this = Arc::clone(self);
        let key = identity.clone();
        let check = async move {
            let result = this.query().await;
            this.settle(epoch, serial, &key, result)
        }
        .boxed()
        .shared();

        state.checks.insert(identity, (serial, check.clone()));
        check
    }

    async fn query(&self) -> Option<bool> {
        match self.transport.get_json::<bool>(ADMIN_CHECK_PATH).await {
            Ok(is_admin) => Some(is_admin),
            Err(e) => {
                tracing::warn!("Admin check failed, treating as non-admin: {}", e);
                None
            }
        }
    }

    fn settle(&self, epoch: u64, serial: u64, identity: &str, result: Option<bool>) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("Discarding admin check result from a previous session");
            return false;
        }

        match result {
            Some(is_admin) => {
                state.flag = Some(is_admin);
                tracing::debug!("Admin check for {} resolved to {}", identity, is_admin);
                is_admin
            }
            None => {
                if matches!(state.checks.get(identity), Some((s, _)) if *s == serial) {
                    state.checks.remove(identity);
                }
                false
            }
        }
    }
}

impl std::fmt::Debug for AuthorizationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AuthorizationCache")
            .field("epoch", &state.epoch)
            .field("flag", &state.flag)
            .field("checks", &state.checks.len())
            .finish()
    }
}
