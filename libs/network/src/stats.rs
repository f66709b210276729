//! Session statistics
//!
//! Lock-free counters updated from the reader, writer and sweep tasks.
//! Counters accumulate across sessions of the same client.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct SessionStats {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    frames_dropped: AtomicU64,
    pushes_dispatched: AtomicU64,
    pushes_dropped: AtomicU64,
    late_responses: AtomicU64,
    timeouts: AtomicU64,
    stale_swept: AtomicU64,
    sessions_started: AtomicU64,

    last_activity: RwLock<Option<Instant>>,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_dropped: u64,
    pub pushes_dispatched: u64,
    pub pushes_dropped: u64,
    pub late_responses: u64,
    pub timeouts: u64,
    pub stale_swept: u64,
    pub sessions_started: u64,
    pub last_activity: Option<Instant>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch();
    }

    /// Raw bytes off the socket, before framing
    #[inline]
    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_push(&self, delivered: bool) {
        if delivered {
            self.pushes_dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pushes_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_late_response(&self) {
        self.late_responses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_swept(&self, count: usize) {
        self.stale_swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    fn touch(&self) {
        if let Some(mut last) = self.last_activity.try_write() {
            *last = Some(Instant::now());
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            pushes_dispatched: self.pushes_dispatched.load(Ordering::Relaxed),
            pushes_dropped: self.pushes_dropped.load(Ordering::Relaxed),
            late_responses: self.late_responses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            stale_swept: self.stale_swept.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            last_activity: *self.last_activity.read(),
        }
    }
}
