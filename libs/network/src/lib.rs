//! # Tapline Network
//!
//! Client side of the collector connection.
//!
//! ## Components
//!
//! - **Connectors**: open a TCP or Unix stream ([`Connector`], [`TransportFactory`])
//! - **SessionTransport**: owns the stream, runs the reader, writer and sweep tasks
//! - **RequestCorrelator**: correlation ids, exactly-once resolution, timeouts
//! - **PushDispatcher**: routes id-0 envelopes to the push subscriber
//! - **ProxyClient**: typed request methods on top of the session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use network::{ClientConfig, Credentials, ProxyClient, TcpConnector};
//! use std::sync::Arc;
//!
//! # async fn run() -> network::ClientResult<()> {
//! let client = ProxyClient::new(
//!     ClientConfig::default(),
//!     Credentials::new("token", "example"),
//!     Arc::new(TcpConnector::new("127.0.0.1:7411")),
//! );
//! client.connect().await?;
//! for target in client.list_targets().await? {
//!     println!("{} {}", target.target_id, target.display_name);
//! }
//! client.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! There is no automatic reconnection: after a failure the state moves to
//! `Error` and the caller decides whether to `connect()` again.

pub mod client;
pub mod client_config;
pub mod correlator;
pub mod error;
pub mod push;
pub mod session;
pub mod state;
pub mod stats;
pub mod transports;

pub use client::ProxyClient;
pub use client_config::{ClientConfig, Credentials};
pub use correlator::{PendingCall, RequestCorrelator};
pub use error::{ClientError, ClientResult};
pub use push::PushDispatcher;
pub use session::SessionTransport;
pub use state::{ConnectionState, StateTracker};
pub use stats::{SessionStats, StatsSnapshot};
pub use transports::{BoxedStream, Connector, SessionStream, TcpConnector, TransportFactory};
#[cfg(unix)]
pub use transports::UnixConnector;
