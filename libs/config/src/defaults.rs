//! Default configuration values
//!
//! Every serde default in [`crate::settings`] reads from here so the numbers
//! exist exactly once.

/// Connection and session defaults
pub mod connection {
    /// Collector address used when none is configured
    pub const ADDRESS: &str = "127.0.0.1:7411";

    /// Per-request response timeout (milliseconds)
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Transport establishment timeout (milliseconds)
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Stale-request sweep period (milliseconds)
    pub const SWEEP_INTERVAL_MS: u64 = 5_000;

    /// Pending requests older than `request timeout × STALE_FACTOR` are force-failed
    pub const STALE_FACTOR: u32 = 2;

    /// Largest frame accepted or sent (16MB)
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

    /// Socket read chunk size
    pub const READ_BUFFER_SIZE: usize = 65536;

    /// Push messages buffered for a slow subscriber before drops begin
    pub const PUSH_CHANNEL_CAPACITY: usize = 1024;

    /// Frames queued for the writer task
    pub const OUTBOUND_QUEUE_SIZE: usize = 256;
}

/// Series store defaults
pub mod series {
    /// Samples retained per series
    pub const RETENTION: usize = 3600;

    /// SeriesUpdate events buffered per broadcast receiver
    pub const UPDATE_CHANNEL_CAPACITY: usize = 1024;
}

/// Identity presented during authentication
pub mod client {
    pub const CLIENT_NAME: &str = "tapline";
}

/// Logging defaults
pub mod logging {
    pub const LOG_LEVEL: &str = "info";
}
