use crate::model::User;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Tracks which remote users are currently typing, and debounces the local
/// user's outgoing typing signal.
///
/// Remote side: one `idle → typing → idle` machine per user id, with a
/// per-user expiry timer as a liveness guard against a lost stopped-typing
/// push. Local side: edge-detected, debounced; rapid toggles coalesce into
/// one outbound signal carrying the latest value.
///
/// All timers are abortable; `cancel_all` must run on conversation switch —
/// a leaked timer mutating state for a left conversation is a correctness
/// bug, not cosmetic.
pub struct TypingPresence {
    local_user_id: String,
    expiry: Duration,
    debounce: Duration,
    outbound: mpsc::UnboundedSender<bool>,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    /// Visible typing set, insertion-ordered.
    visible: Vec<User>,
    /// Pending expiry timer per remote user id.
    timers: HashMap<String, JoinHandle<()>>,
    local_typing: bool,
    pending_local: Option<JoinHandle<()>>,
}

impl TypingPresence {
    /// Returns the presence tracker and the receiver of debounced outbound
    /// typing signals. The session drains the receiver into the backend's
    /// typing call for the conversation this instance belongs to.
    pub fn new(
        local_user_id: impl Into<String>,
        expiry: Duration,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<bool>) {
        let (outbound, signals) = mpsc::unbounded_channel();
        (
            Self {
                local_user_id: local_user_id.into(),
                expiry,
                debounce,
                outbound,
                inner: Arc::new(Mutex::new(Inner::default())),
            },
            signals,
        )
    }

    /// Snapshot of the users currently shown as typing.
    pub fn typing_users(&self) -> Vec<User> {
        self.lock().visible.clone()
    }

    /// Apply a remote typing push event. A signal carrying the local user's
    /// own id is ignored — the local user is never self-displayed.
    pub fn on_remote_signal(&self, user: User, is_typing: bool) {
        if user.id == self.local_user_id {
            return;
        }
        let mut inner = self.lock();
        if let Some(timer) = inner.timers.remove(&user.id) {
            timer.abort();
        }
        if is_typing {
            if !inner.visible.iter().any(|u| u.id == user.id) {
                inner.visible.push(user.clone());
            }
            let shared = self.inner.clone();
            let user_id = user.id.clone();
            let expiry = self.expiry;
            let timer = tokio::spawn(async move {
                tokio::time::sleep(expiry).await;
                let mut inner = shared.lock().expect("typing state lock poisoned");
                inner.timers.remove(&user_id);
                inner.visible.retain(|u| u.id != user_id);
                debug!("typing indicator for {} expired without refresh", user_id);
            });
            inner.timers.insert(user.id, timer);
        } else {
            inner.visible.retain(|u| u.id != user.id);
        }
    }

    /// A message arriving from a user also ends their typing indicator.
    pub fn clear_user(&self, user_id: &str) {
        let mut inner = self.lock();
        if let Some(timer) = inner.timers.remove(user_id) {
            timer.abort();
        }
        inner.visible.retain(|u| u.id != user_id);
    }

    /// Record the local user's typing intent. A repeat call with the current
    /// value is a no-op; an edge (re)schedules one debounced outbound signal
    /// carrying whatever the latest value is when the debounce fires.
    pub fn set_local_typing(&self, typing: bool) {
        let mut inner = self.lock();
        if inner.local_typing == typing {
            return;
        }
        inner.local_typing = typing;
        if let Some(pending) = inner.pending_local.take() {
            pending.abort();
        }
        let shared = self.inner.clone();
        let outbound = self.outbound.clone();
        let debounce = self.debounce;
        let pending = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let latest = {
                let mut inner = shared.lock().expect("typing state lock poisoned");
                inner.pending_local = None;
                inner.local_typing
            };
            let _ = outbound.send(latest);
        });
        inner.pending_local = Some(pending);
    }

    /// After a successful send: drop any pending debounce, reset the local
    /// edge state, and emit exactly one immediate not-typing signal.
    pub fn force_local_idle(&self) {
        {
            let mut inner = self.lock();
            if let Some(pending) = inner.pending_local.take() {
                pending.abort();
            }
            inner.local_typing = false;
        }
        let _ = self.outbound.send(false);
    }

    /// Abort every per-user expiry timer and the local debounce timer, and
    /// clear the working set. Runs on conversation switch.
    pub fn cancel_all(&self) {
        let mut inner = self.lock();
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
        if let Some(pending) = inner.pending_local.take() {
            pending.abort();
        }
        inner.visible.clear();
        inner.local_typing = false;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("typing state lock poisoned")
    }
}
