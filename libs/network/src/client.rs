//! Typed client facade
//!
//! One method per request kind. Each checks that the collector answered
//! with the payload that request expects; anything else is
//! `UnexpectedResponse`. Error payloads have already become `ServerError`
//! inside [`SessionTransport::request`].

use crate::client_config::{ClientConfig, Credentials};
use crate::error::{ClientError, ClientResult};
use crate::session::SessionTransport;
use crate::state::ConnectionState;
use crate::stats::StatsSnapshot;
use crate::transports::{Connector, TransportFactory};
use config::ProxySettings;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use types::{
    BincodeSerializer, EnvelopeSerializer, HistoryBatch, HistoryRequest, Payload, RuntimeConfig,
    ServerStatus, ServerStatusUpdate, SessionInfo, SessionInfoUpdate, TargetId, TargetInfo,
    TargetSpec, TargetUpdate,
};

/// Unwrap the expected response variant or report what arrived instead
macro_rules! expect_response {
    ($response:expr, $variant:ident) => {
        match $response {
            Payload::$variant(inner) => Ok(inner),
            other => Err(ClientError::unexpected(stringify!($variant), other.kind())),
        }
    };
}

pub struct ProxyClient {
    session: SessionTransport,
}

impl ProxyClient {
    /// Client using the default bincode envelope encoding
    pub fn new(config: ClientConfig, credentials: Credentials, connector: Arc<dyn Connector>) -> Self {
        Self::with_serializer(config, credentials, connector, Arc::new(BincodeSerializer))
    }

    pub fn with_serializer(
        config: ClientConfig,
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        serializer: Arc<dyn EnvelopeSerializer>,
    ) -> Self {
        Self {
            session: SessionTransport::new(config, credentials, connector, serializer),
        }
    }

    /// Build connector, config and credentials from loaded settings
    pub fn from_settings(settings: &ProxySettings) -> ClientResult<Self> {
        let connector = TransportFactory::connector_for(&settings.connection)?;
        Ok(Self::new(
            ClientConfig::from_settings(&settings.connection),
            Credentials::from_settings(&settings.credentials),
            connector,
        ))
    }

    pub fn session(&self) -> &SessionTransport {
        &self.session
    }

    pub async fn connect(&self) -> ClientResult<SessionInfo> {
        self.session.connect().await
    }

    pub fn cancel_connect(&self) {
        self.session.cancel_connect();
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.subscribe_state()
    }

    pub fn subscribe_pushes(&self) -> mpsc::Receiver<Payload> {
        self.session.subscribe_pushes()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.session.stats()
    }

    // Targets

    pub async fn monitor_target(&self, spec: TargetSpec) -> ClientResult<TargetInfo> {
        let response = self.session.request(Payload::MonitorTarget(spec)).await?;
        expect_response!(response, Target)
    }

    pub async fn unmonitor_target(&self, target_id: TargetId) -> ClientResult<()> {
        let response = self
            .session
            .request(Payload::UnmonitorTarget { target_id })
            .await?;
        expect_ack(response)
    }

    pub async fn list_targets(&self) -> ClientResult<Vec<TargetInfo>> {
        let response = self.session.request(Payload::ListTargets).await?;
        expect_response!(response, TargetList)
    }

    pub async fn get_target(&self, target_id: TargetId) -> ClientResult<TargetInfo> {
        let response = self.session.request(Payload::GetTarget { target_id }).await?;
        expect_response!(response, Target)
    }

    pub async fn update_target(&self, update: TargetUpdate) -> ClientResult<TargetInfo> {
        let response = self.session.request(Payload::UpdateTarget(update)).await?;
        expect_response!(response, Target)
    }

    // Push subscriptions

    pub async fn subscribe(&self, target_ids: Vec<TargetId>) -> ClientResult<()> {
        let epoch = self.session.push_dispatcher().epoch();
        let response = self
            .session
            .request(Payload::Subscribe {
                target_ids: target_ids.clone(),
            })
            .await?;
        expect_ack(response)?;

        // A teardown after the ack already cleared routing for this session
        if !self
            .session
            .push_dispatcher()
            .record_subscribed(epoch, &target_ids)
        {
            return Err(ClientError::NotConnected);
        }
        debug!(targets = target_ids.len(), "Subscribed to target pushes");
        Ok(())
    }

    pub async fn unsubscribe(&self, target_ids: Vec<TargetId>) -> ClientResult<()> {
        let response = self
            .session
            .request(Payload::Unsubscribe {
                target_ids: target_ids.clone(),
            })
            .await?;
        expect_ack(response)?;

        self.session.push_dispatcher().record_unsubscribed(&target_ids);
        Ok(())
    }

    pub fn subscriptions(&self) -> Vec<TargetId> {
        self.session.subscriptions()
    }

    // History

    /// Stored samples for `target_id` at or after `since_ns`; `limit` 0 means all
    pub async fn get_history(
        &self,
        target_id: TargetId,
        since_ns: u64,
        limit: u32,
    ) -> ClientResult<HistoryBatch> {
        let response = self
            .session
            .request(Payload::GetHistory(HistoryRequest {
                target_id,
                since_ns,
                limit,
            }))
            .await?;
        expect_response!(response, History)
    }

    // Server, session and runtime configuration

    pub async fn server_status(&self) -> ClientResult<ServerStatus> {
        let response = self.session.request(Payload::GetServerStatus).await?;
        expect_response!(response, ServerStatus)
    }

    pub async fn set_server_status(&self, update: ServerStatusUpdate) -> ClientResult<ServerStatus> {
        let response = self.session.request(Payload::SetServerStatus(update)).await?;
        expect_response!(response, ServerStatus)
    }

    pub async fn session_info(&self) -> ClientResult<SessionInfo> {
        let response = self.session.request(Payload::GetSessionInfo).await?;
        expect_response!(response, SessionInfo)
    }

    pub async fn set_session_info(&self, update: SessionInfoUpdate) -> ClientResult<SessionInfo> {
        let response = self.session.request(Payload::SetSessionInfo(update)).await?;
        expect_response!(response, SessionInfo)
    }

    pub async fn runtime_config(&self) -> ClientResult<RuntimeConfig> {
        let response = self.session.request(Payload::GetRuntimeConfig).await?;
        expect_response!(response, RuntimeConfig)
    }

    pub async fn set_runtime_config(&self, config: RuntimeConfig) -> ClientResult<RuntimeConfig> {
        let response = self.session.request(Payload::SetRuntimeConfig(config)).await?;
        expect_response!(response, RuntimeConfig)
    }
}

fn expect_ack(response: Payload) -> ClientResult<()> {
    match response {
        Payload::Ack => Ok(()),
        other => Err(ClientError::unexpected("Ack", other.kind())),
    }
}
