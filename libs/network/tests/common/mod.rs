//! Common Test Utilities for Session Tests
//!
//! An in-process scripted collector speaking the real wire format (varint
//! frames of bincode envelopes) over any async stream, plus connectors that
//! feed it duplex pipes or stall forever.

#![allow(dead_code)]

use async_trait::async_trait;
use codec::{encode_frame, FrameCodec};
use network::{BoxedStream, ClientConfig, ClientResult, Connector, Credentials, ProxyClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use types::{
    BincodeSerializer, Envelope, EnvelopeSerializer, ErrorBody, HistoryBatch, Payload, Sample,
    ServerStatus, SessionInfo, TargetInfo,
};

/// How the collector answers `Authenticate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Accept,
    Reject,
    /// Hand the request to the test like any held request
    Hold,
}

/// Collector decision for one request
pub enum Reply {
    Respond(Payload),
    /// Forward to the test through [`CollectorHandle::next_held`]
    Hold,
}

pub type Responder = Arc<dyn Fn(&Envelope) -> Reply + Send + Sync>;

enum Action {
    Send(Envelope),
    Raw(Vec<u8>),
    Close,
}

/// Test-side control of one accepted collector connection
pub struct CollectorHandle {
    held: mpsc::UnboundedReceiver<Envelope>,
    actions: mpsc::UnboundedSender<Action>,
}

impl CollectorHandle {
    /// Next request the responder chose to hold
    pub async fn next_held(&mut self) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), self.held.recv())
            .await
            .expect("collector saw no held request within 5s")
            .expect("collector connection ended")
    }

    pub fn reply(&self, id: u64, payload: Payload) {
        let _ = self.actions.send(Action::Send(Envelope::new(id, payload)));
    }

    pub fn push(&self, payload: Payload) {
        let _ = self.actions.send(Action::Send(Envelope::push(payload)));
    }

    /// Write bytes verbatim, bypassing framing
    pub fn send_raw(&self, bytes: Vec<u8>) {
        let _ = self.actions.send(Action::Raw(bytes));
    }

    /// Close the collector side of the stream
    pub fn close(&self) {
        let _ = self.actions.send(Action::Close);
    }
}

/// Start serving one client connection
pub fn serve_connection<S>(stream: S, auth: AuthMode, responder: Responder) -> CollectorHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (held_tx, held_rx) = mpsc::unbounded_channel();
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    tokio::spawn(serve(stream, auth, responder, held_tx, actions_rx));

    CollectorHandle {
        held: held_rx,
        actions: actions_tx,
    }
}

async fn serve<S>(
    stream: S,
    auth: AuthMode,
    responder: Responder,
    held: mpsc::UnboundedSender<Envelope>,
    mut actions: mpsc::UnboundedReceiver<Action>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut codec = FrameCodec::default();
    let mut buf = vec![0u8; 8192];
    let mut actions_open = true;

    loop {
        // Scripted actions first so their order relative to replies is deterministic
        tokio::select! {
            biased;
            action = actions.recv(), if actions_open => match action {
                Some(Action::Send(envelope)) => write_envelope(&mut writer, &envelope).await,
                Some(Action::Raw(bytes)) => {
                    let _ = writer.write_all(&bytes).await;
                    let _ = writer.flush().await;
                }
                Some(Action::Close) => {
                    let _ = writer.shutdown().await;
                    return;
                }
                None => actions_open = false,
            },
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let frames = match codec.decode(&buf[..n]) {
                    Ok(frames) => frames,
                    Err(_) => return,
                };

                for frame in frames {
                    let envelope = BincodeSerializer
                        .deserialize(&frame)
                        .expect("client sent an undecodable envelope");

                    let reply = match (&envelope.payload, auth) {
                        (Payload::Authenticate(_), AuthMode::Accept) => {
                            Reply::Respond(Payload::Authenticated(session_info()))
                        }
                        (Payload::Authenticate(_), AuthMode::Reject) => {
                            Reply::Respond(Payload::Error(ErrorBody::new(401, "invalid token")))
                        }
                        (Payload::Authenticate(_), AuthMode::Hold) => Reply::Hold,
                        _ => responder(&envelope),
                    };

                    match reply {
                        Reply::Respond(payload) => {
                            write_envelope(&mut writer, &Envelope::new(envelope.id, payload)).await;
                        }
                        Reply::Hold => {
                            let _ = held.send(envelope);
                        }
                    }
                }
            }
        }
    }
}

async fn write_envelope<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &Envelope) {
    let bytes = BincodeSerializer.serialize(envelope).expect("serialize reply");
    let frame = encode_frame(&bytes, usize::MAX).expect("frame reply");
    let _ = writer.write_all(&frame).await;
    let _ = writer.flush().await;
}

/// Connector handing out in-memory pipes, each served by a scripted collector
pub struct DuplexConnector {
    auth: AuthMode,
    responder: Responder,
    accepted: mpsc::UnboundedSender<CollectorHandle>,
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self) -> ClientResult<BoxedStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = serve_connection(server, self.auth, Arc::clone(&self.responder));
        let _ = self.accepted.send(handle);
        Ok(Box::new(client))
    }

    fn endpoint(&self) -> String {
        "duplex://collector".to_string()
    }
}

/// Connector plus a stream of handles, one per accepted connection
pub fn scripted_collector(
    auth: AuthMode,
    responder: Responder,
) -> (Arc<DuplexConnector>, mpsc::UnboundedReceiver<CollectorHandle>) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(DuplexConnector {
        auth,
        responder,
        accepted: accepted_tx,
    });
    (connector, accepted_rx)
}

/// Connector whose attempts never complete
///
/// `dropped` flips once an attempt's future is dropped, which is how a
/// cancelled or timed-out connect releases its half-open transport.
#[derive(Default)]
pub struct StallingConnector {
    pub dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for StallingConnector {
    async fn connect(&self) -> ClientResult<BoxedStream> {
        let _flag = DropFlag(Arc::clone(&self.dropped));
        std::future::pending::<ClientResult<BoxedStream>>().await
    }

    fn endpoint(&self) -> String {
        "stall://nowhere".to_string()
    }
}

/// Fixture data
pub fn session_info() -> SessionInfo {
    SessionInfo {
        session_id: 42,
        client_name: "session-tests".to_string(),
        server_version: "1.4.2".to_string(),
        push_interval_ms: 1000,
    }
}

pub fn target(id: u64) -> TargetInfo {
    TargetInfo {
        target_id: id,
        display_name: format!("core-sw{} uplink", id),
        address: format!("10.0.0.{}", id),
        oid: format!("1.3.6.1.2.1.31.1.1.1.6.{}", id),
        interval_ms: 1000,
        enabled: true,
        last_error: None,
    }
}

/// Answers every request kind the way a healthy collector would
pub fn standard_responder() -> Responder {
    Arc::new(|envelope: &Envelope| {
        let payload = match &envelope.payload {
            Payload::ListTargets => Payload::TargetList(vec![target(1), target(2)]),
            Payload::GetTarget { target_id } if *target_id == 999 => {
                Payload::Error(ErrorBody::new(404, "no such target"))
            }
            Payload::GetTarget { target_id } => Payload::Target(target(*target_id)),
            Payload::Subscribe { .. } | Payload::Unsubscribe { .. } => Payload::Ack,
            Payload::UnmonitorTarget { .. } => Payload::Ack,
            Payload::GetHistory(request) => Payload::History(HistoryBatch {
                target_id: request.target_id,
                samples: vec![
                    Sample::new(request.target_id, 1_000_000_000, 100),
                    Sample::new(request.target_id, 2_000_000_000, 200),
                ],
            }),
            Payload::GetServerStatus => Payload::ServerStatus(ServerStatus {
                version: "1.4.2".to_string(),
                uptime_secs: 3600,
                target_count: 2,
                session_count: 1,
                polling_paused: false,
            }),
            other => Payload::Error(ErrorBody::new(501, format!("unsupported {}", other.kind()))),
        };
        Reply::Respond(payload)
    })
}

/// Holds requests matching `hold`, answers the rest like [`standard_responder`]
pub fn holding_responder(hold: fn(&Payload) -> bool) -> Responder {
    let standard = standard_responder();
    Arc::new(move |envelope: &Envelope| {
        if hold(&envelope.payload) {
            Reply::Hold
        } else {
            standard(envelope)
        }
    })
}

pub fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_request_timeout(Duration::from_secs(2))
        .with_connect_timeout(Duration::from_secs(1))
}

pub fn client_with(connector: Arc<dyn Connector>, config: ClientConfig) -> ProxyClient {
    ProxyClient::new(config, Credentials::new("test-token", "session-tests"), connector)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("network=debug")
        .with_test_writer()
        .try_init();
}
