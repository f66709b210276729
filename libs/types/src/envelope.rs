//! # Envelope and Payload
//!
//! Every frame on the wire carries exactly one [`Envelope`]. The `id` field
//! does the routing:
//!
//! | id   | direction        | meaning                                   |
//! |------|------------------|-------------------------------------------|
//! | 0    | server → client  | unsolicited push, goes to PushDispatcher  |
//! | n>0  | client → server  | request, n unique among outstanding calls |
//! | n>0  | server → client  | response to the request that carried n    |
//!
//! [`Payload`] is closed: adding a message kind means adding a variant here
//! and handling it wherever payloads are matched exhaustively.

use crate::records::{
    AuthenticateRequest, ErrorBody, HistoryBatch, HistoryRequest, RuntimeConfig, SampleBatch,
    ServerStatus, ServerStatusUpdate, SessionInfo, SessionInfoUpdate, TargetId, TargetInfo,
    TargetSpec, TargetUpdate,
};
use serde::{Deserialize, Serialize};

/// Correlation id reserved for server pushes
pub const PUSH_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(id: u64, payload: Payload) -> Self {
        Self { id, payload }
    }

    pub fn push(payload: Payload) -> Self {
        Self::new(PUSH_ID, payload)
    }

    #[inline]
    pub fn is_push(&self) -> bool {
        self.id == PUSH_ID
    }
}

/// Which side of the conversation a payload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadClass {
    Request,
    Response,
    Push,
}

/// Every message kind the proxy understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    // Requests
    Authenticate(AuthenticateRequest),
    MonitorTarget(TargetSpec),
    UnmonitorTarget { target_id: TargetId },
    ListTargets,
    GetTarget { target_id: TargetId },
    Subscribe { target_ids: Vec<TargetId> },
    Unsubscribe { target_ids: Vec<TargetId> },
    GetHistory(HistoryRequest),
    GetServerStatus,
    SetServerStatus(ServerStatusUpdate),
    GetSessionInfo,
    SetSessionInfo(SessionInfoUpdate),
    GetRuntimeConfig,
    SetRuntimeConfig(RuntimeConfig),
    UpdateTarget(TargetUpdate),

    // Responses
    Authenticated(SessionInfo),
    Target(TargetInfo),
    TargetList(Vec<TargetInfo>),
    History(HistoryBatch),
    ServerStatus(ServerStatus),
    SessionInfo(SessionInfo),
    RuntimeConfig(RuntimeConfig),
    Ack,
    Error(ErrorBody),

    // Push
    SamplePush(SampleBatch),
}

impl Payload {
    /// Variant name for logs and mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Authenticate(_) => "Authenticate",
            Payload::MonitorTarget(_) => "MonitorTarget",
            Payload::UnmonitorTarget { .. } => "UnmonitorTarget",
            Payload::ListTargets => "ListTargets",
            Payload::GetTarget { .. } => "GetTarget",
            Payload::Subscribe { .. } => "Subscribe",
            Payload::Unsubscribe { .. } => "Unsubscribe",
            Payload::GetHistory(_) => "GetHistory",
            Payload::GetServerStatus => "GetServerStatus",
            Payload::SetServerStatus(_) => "SetServerStatus",
            Payload::GetSessionInfo => "GetSessionInfo",
            Payload::SetSessionInfo(_) => "SetSessionInfo",
            Payload::GetRuntimeConfig => "GetRuntimeConfig",
            Payload::SetRuntimeConfig(_) => "SetRuntimeConfig",
            Payload::UpdateTarget(_) => "UpdateTarget",
            Payload::Authenticated(_) => "Authenticated",
            Payload::Target(_) => "Target",
            Payload::TargetList(_) => "TargetList",
            Payload::History(_) => "History",
            Payload::ServerStatus(_) => "ServerStatus",
            Payload::SessionInfo(_) => "SessionInfo",
            Payload::RuntimeConfig(_) => "RuntimeConfig",
            Payload::Ack => "Ack",
            Payload::Error(_) => "Error",
            Payload::SamplePush(_) => "SamplePush",
        }
    }

    pub fn class(&self) -> PayloadClass {
        match self {
            Payload::Authenticate(_)
            | Payload::MonitorTarget(_)
            | Payload::UnmonitorTarget { .. }
            | Payload::ListTargets
            | Payload::GetTarget { .. }
            | Payload::Subscribe { .. }
            | Payload::Unsubscribe { .. }
            | Payload::GetHistory(_)
            | Payload::GetServerStatus
            | Payload::SetServerStatus(_)
            | Payload::GetSessionInfo
            | Payload::SetSessionInfo(_)
            | Payload::GetRuntimeConfig
            | Payload::SetRuntimeConfig(_)
            | Payload::UpdateTarget(_) => PayloadClass::Request,

            Payload::Authenticated(_)
            | Payload::Target(_)
            | Payload::TargetList(_)
            | Payload::History(_)
            | Payload::ServerStatus(_)
            | Payload::SessionInfo(_)
            | Payload::RuntimeConfig(_)
            | Payload::Ack
            | Payload::Error(_) => PayloadClass::Response,

            Payload::SamplePush(_) => PayloadClass::Push,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }
}
