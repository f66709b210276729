//! # Request Correlator
//!
//! Matches responses to the calls that are waiting for them.
//!
//! ## Resolution Model
//!
//! Each outstanding request owns one slot in a concurrent table keyed by its
//! correlation id. A slot is resolved by whoever removes it first:
//!
//! - the receive loop, when the matching response arrives
//! - the caller's own deadline, when `request_timeout` elapses
//! - the stale sweep, for anything older than the stale threshold
//! - teardown, which fails every slot with `NotConnected`
//!
//! `DashMap::remove` is the claim: it hands the slot to exactly one of
//! these, so a request resolves once and the other outcomes find nothing.
//! A response whose slot is already gone is a late response and is dropped.

use crate::error::{ClientError, ClientResult};
use crate::stats::SessionStats;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use types::Payload;

type Slot = oneshot::Sender<ClientResult<Payload>>;

struct PendingRequest {
    created_at: Instant,
    slot: Slot,
}

pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, PendingRequest>>,
    stats: Arc<SessionStats>,
}

impl RequestCorrelator {
    pub fn new(stats: Arc<SessionStats>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            stats,
        }
    }

    /// Next correlation id: strictly increasing, never 0
    pub fn next_id(&self) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Register a new outstanding request
    ///
    /// The returned call must be created before the request is written so
    /// that an immediate response always finds its slot.
    pub fn register(&self, timeout: Duration) -> PendingCall {
        let id = self.next_id();
        let (slot, rx) = oneshot::channel();

        self.pending.insert(
            id,
            PendingRequest {
                created_at: Instant::now(),
                slot,
            },
        );

        PendingCall {
            id,
            rx,
            timeout,
            pending: Arc::clone(&self.pending),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Deliver a response; false if no request with `id` is outstanding
    pub fn resolve(&self, id: u64, payload: Payload) -> bool {
        match self.pending.remove(&id) {
            Some((_, request)) => {
                debug!(
                    id,
                    kind = payload.kind(),
                    elapsed_us = request.created_at.elapsed().as_micros() as u64,
                    "Resolved request"
                );
                let _ = request.slot.send(Ok(payload));
                true
            }
            None => false,
        }
    }

    /// Fail one outstanding request
    pub fn fail(&self, id: u64, error: ClientError) -> bool {
        match self.pending.remove(&id) {
            Some((_, request)) => {
                let _ = request.slot.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding request with the same error
    pub fn fail_all(&self, error: ClientError) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();

        let failed = ids
            .into_iter()
            .filter(|id| self.fail(*id, error.clone()))
            .count();

        if failed > 0 {
            debug!(failed, reason = %error, "Failed all pending requests");
        }
        failed
    }

    /// Force-fail requests older than `max_age`
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let stale: Vec<u64> = self
            .pending
            .iter()
            .filter(|entry| entry.value().created_at.elapsed() > max_age)
            .map(|entry| *entry.key())
            .collect();

        let timeout_ms = max_age.as_millis() as u64;
        let swept = stale
            .into_iter()
            .filter(|id| self.fail(*id, ClientError::timeout("stale sweep", timeout_ms)))
            .count();

        if swept > 0 {
            warn!(swept, max_age_ms = timeout_ms, "Stale sweep failed pending requests");
            self.stats.record_stale_swept(swept);
        }
        swept
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }
}

/// Caller's side of one outstanding request
///
/// Dropping it before resolution (for example when the awaiting future is
/// cancelled) removes the slot so nothing leaks.
pub struct PendingCall {
    id: u64,
    rx: oneshot::Receiver<ClientResult<Payload>>,
    timeout: Duration,
    pending: Arc<DashMap<u64, PendingRequest>>,
    stats: Arc<SessionStats>,
}

impl PendingCall {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the single outcome of this request
    pub async fn wait(mut self) -> ClientResult<Payload> {
        match tokio::time::timeout(self.timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_) => {
                if self.pending.remove(&self.id).is_some() {
                    let timeout_ms = self.timeout.as_millis() as u64;
                    warn!(id = self.id, timeout_ms, "Request timed out");
                    self.stats.record_timeout();
                    return Err(ClientError::timeout("request", timeout_ms));
                }

                // Claimed by a resolver at the deadline; its result is already in flight
                match (&mut self.rx).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::NotConnected),
                }
            }
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}
