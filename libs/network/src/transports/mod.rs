//! Transport Connectors
//!
//! A [`Connector`] produces one ordered, reliable byte stream to the
//! collector. Framing, correlation and timeouts all live above this seam;
//! a connector only knows how to open a socket.

use crate::error::ClientResult;
use async_trait::async_trait;
use config::{ConnectionSettings, TransportKind};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod tcp;
#[cfg(unix)]
pub mod unix;

pub use tcp::TcpConnector;
#[cfg(unix)]
pub use unix::UnixConnector;

/// Bidirectional byte stream a session runs over
pub trait SessionStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> SessionStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn SessionStream>;

/// Opens transports to the collector
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh stream
    ///
    /// The session races this against its connect timeout and may drop the
    /// future at any point; implementations must not leave anything behind
    /// when that happens.
    async fn connect(&self) -> ClientResult<BoxedStream>;

    /// Human-readable endpoint for logs
    fn endpoint(&self) -> String;
}

/// Transport factory for building connectors from settings
pub struct TransportFactory;

impl TransportFactory {
    /// Pick the connector matching `settings.transport`
    pub fn connector_for(settings: &ConnectionSettings) -> ClientResult<Arc<dyn Connector>> {
        match settings.transport {
            TransportKind::Tcp => Ok(Arc::new(TcpConnector::new(settings.address.clone()))),
            #[cfg(unix)]
            TransportKind::Unix => Ok(Arc::new(UnixConnector::new(&settings.address))),
            #[cfg(not(unix))]
            TransportKind::Unix => Err(crate::error::ClientError::configuration(
                "unix transport is not available on this platform",
            )),
        }
    }
}
