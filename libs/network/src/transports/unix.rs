//! Unix domain socket connector for collectors on the same host

use super::{BoxedStream, Connector};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Connector for UnixConnector {
    async fn connect(&self) -> ClientResult<BoxedStream> {
        debug!(path = ?self.path, "Connecting to collector over Unix socket");

        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| ClientError::transport("Unix connect", &e))?;

        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("unix://{}", self.path.display())
    }
}
