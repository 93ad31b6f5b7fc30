//! Anti-CSRF state for the OAuth redirect flow.
//!
//! Every outbound authorization request carries a server-minted token that must
//! come back unchanged on the callback. Tokens are single use and expire after
//! [`DEFAULT_STATE_TTL`]; a background sweeper evicts entries whose callback never
//! arrives so abandoned flows cannot grow the table without bound.
//!
//! The table is process local. Running more than one instance behind a load
//! balancer needs an external store with native expiry and an atomic
//! check-and-delete in place of this map.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const STATE_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to generate oauth state: {0}")]
    RandomSource(#[from] rand::Error),
}

#[derive(Debug)]
pub struct OAuthStateStore {
    ttl: Duration,
    states: RwLock<HashMap<String, Instant>>,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TTL)
    }
}

impl OAuthStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            states: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint and record a new state token.
    ///
    /// # Errors
    /// Returns [`StateError::RandomSource`] if the OS random source fails.
    pub async fn generate(&self) -> Result<String, StateError> {
        let mut bytes = [0u8; STATE_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        let state = Base64UrlUnpadded::encode_string(&bytes);

        self.states.write().await.insert(state.clone(), Instant::now());

        Ok(state)
    }

    /// Consume `candidate`. Returns `true` only for a live, never-consumed token.
    ///
    /// The entry is removed whatever the outcome. Unknown, consumed, swept and
    /// expired tokens are all plain `false`.
    pub async fn validate(&self, candidate: &str) -> bool {
        let removed = self.states.write().await.remove(candidate);
        match removed {
            Some(created_at) => created_at.elapsed() <= self.ttl,
            None => false,
        }
    }

    /// Remove every entry older than the TTL; returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, created_at| created_at.elapsed() <= self.ttl);
        before - states.len()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

/// Run [`OAuthStateStore::sweep`] every `every` until `shutdown` is cancelled.
pub fn spawn_sweeper(
    store: Arc<OAuthStateStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("OAuth state sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = store.sweep().await;
                    if evicted > 0 {
                        debug!("Evicted {} expired oauth states", evicted);
                    }
                }
            }
        }
    })
}
