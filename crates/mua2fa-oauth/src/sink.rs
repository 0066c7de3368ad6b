//! The rendezvous between the OAuth callback and the `/record` poll.
//!
//! The callback handler [`emit`](UserSink::emit)s the user it just
//! authenticated; every `/record` poll takes the [`next`](UserSink::next)
//! user, either one still retained from the last `retention` window or the
//! first to arrive while it waits.
//!
//! ```text
//!   GET /?code=…  ──emit(user)──▶ ┌──────────────────────┐
//!                                 │ retained (≤ 30 s)    │──▶ GET /record
//!                                 │ live broadcast       │──▶ GET /record
//!                                 └──────────────────────┘
//! ```
//!
//! The sink is shared by every login in flight and is not keyed by player.
//! A poll may pick up another player's user; the game server rejects the
//! resulting record because it is signed for the wrong profile.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use mua2fa_protocol::User;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

const LIVE_CAPACITY: usize = 64;

pub struct UserSink {
    inner: Mutex<Inner>,
    retention: Duration,
}

struct Inner {
    retained: VecDeque<(Instant, User)>,
    /// `None` once closed.
    live: Option<broadcast::Sender<User>>,
}

impl UserSink {
    pub fn new(retention: Duration) -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                retained: VecDeque::new(),
                live: Some(live),
            }),
            retention,
        }
    }

    /// Publishes a freshly authenticated user.
    pub fn emit(&self, user: User) {
        let mut inner = self.lock();
        let Some(live) = inner.live.clone() else {
            tracing::debug!(sub = %user.sub, "sink closed, dropping user");
            return;
        };
        let now = Instant::now();
        inner.evict(now, self.retention);
        inner.retained.push_back((now, user.clone()));
        // no live subscriber is fine: the user stays retained
        let _ = live.send(user);
    }

    /// The oldest retained user, or the first one emitted within `wait`.
    ///
    /// `None` if nothing arrives in time or the sink is closed.
    pub async fn next(&self, wait: Duration) -> Option<User> {
        let mut live = {
            let mut inner = self.lock();
            inner.evict(Instant::now(), self.retention);
            if let Some((_, user)) = inner.retained.front() {
                return Some(user.clone());
            }
            inner.live.as_ref()?.subscribe()
        };

        let recv = async {
            loop {
                match live.recv().await {
                    Ok(user) => return Some(user),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        time::timeout(wait, recv).await.ok().flatten()
    }

    /// Drops everything and wakes all waiting polls with `None`.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.retained.clear();
        inner.live = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().live.is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // the guarded data stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn evict(&mut self, now: Instant, retention: Duration) {
        while let Some((at, _)) = self.retained.front() {
            if now.saturating_duration_since(*at) <= retention {
                break;
            }
            self.retained.pop_front();
        }
    }
}
