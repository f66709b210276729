//! TCP connector

use super::{BoxedStream, Connector};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    nodelay: bool,
}

impl TcpConnector {
    /// `address` is anything `TcpStream::connect` resolves, e.g. `host:port`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nodelay: true,
        }
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> ClientResult<BoxedStream> {
        debug!(address = %self.address, "Connecting to collector over TCP");

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| ClientError::transport("TCP connect", &e))?;

        // Requests are small and latency-sensitive
        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        if let Ok(peer) = stream.peer_addr() {
            debug!(peer = %peer, "TCP transport established");
        }

        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
