//! # Session Transport
//!
//! One persistent connection to the collector, shared by every caller.
//!
//! ## Task Layout
//!
//! ```text
//!  request()/send() ──► outbound mpsc ──► [writer task] ──► socket
//!                                                            │
//!  PendingCall ◄── RequestCorrelator ◄──┐                    │
//!                                       ├── [reader task] ◄──┘  (FrameCodec → Envelope)
//!  push subscriber ◄── PushDispatcher ◄─┘
//!
//!  [sweep task] ── every sweep_interval ──► RequestCorrelator::sweep_stale
//! ```
//!
//! A single writer task owns the write half, so frames from concurrent
//! callers never interleave. The reader task owns the read half and is the
//! only thing that feeds the codec.
//!
//! ## Generations
//!
//! Every `connect()` starts a new generation. Teardown names the generation
//! it is ending, and only the first teardown of a live generation acts: it
//! fails all pending requests with `NotConnected`, resets the codec, clears
//! push routing and publishes the final state. Late teardowns from tasks of
//! an older generation are ignored.

use crate::client_config::{ClientConfig, Credentials};
use crate::correlator::RequestCorrelator;
use crate::error::{ClientError, ClientResult};
use crate::push::PushDispatcher;
use crate::state::{ConnectionState, StateTracker};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transports::{BoxedStream, Connector};
use bytes::Bytes;
use codec::{encode_frame, FrameCodec};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use types::{Envelope, EnvelopeSerializer, Payload, PayloadClass, SessionInfo, TargetId};

struct OutboundFrame {
    frame: Bytes,
    written: oneshot::Sender<ClientResult<()>>,
}

struct ActiveSession {
    outbound: mpsc::Sender<OutboundFrame>,
    tasks: Vec<JoinHandle<()>>,
}

struct Lifecycle {
    generation: u64,
    live: bool,
    session: Option<ActiveSession>,
    codec: FrameCodec,
}

impl Lifecycle {
    fn is_live(&self, generation: u64) -> bool {
        self.live && self.generation == generation
    }
}

struct SessionInner {
    config: ClientConfig,
    credentials: Credentials,
    connector: Arc<dyn Connector>,
    serializer: Arc<dyn EnvelopeSerializer>,
    correlator: RequestCorrelator,
    push: PushDispatcher,
    state: StateTracker,
    stats: Arc<SessionStats>,
    lifecycle: Mutex<Lifecycle>,
    cancel: watch::Sender<u64>,
    session_info: RwLock<Option<SessionInfo>>,
}

/// Persistent, multiplexed connection to the collector
///
/// Dropping the transport disconnects it.
pub struct SessionTransport {
    inner: Arc<SessionInner>,
}

impl SessionTransport {
    pub fn new(
        config: ClientConfig,
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        serializer: Arc<dyn EnvelopeSerializer>,
    ) -> Self {
        let stats = Arc::new(SessionStats::new());
        let (cancel, _) = watch::channel(0);

        let inner = SessionInner {
            correlator: RequestCorrelator::new(Arc::clone(&stats)),
            push: PushDispatcher::new(config.push_channel_capacity, Arc::clone(&stats)),
            state: StateTracker::new(),
            lifecycle: Mutex::new(Lifecycle {
                generation: 0,
                live: false,
                session: None,
                codec: FrameCodec::new(config.max_message_size),
            }),
            session_info: RwLock::new(None),
            config,
            credentials,
            connector,
            serializer,
            stats,
            cancel,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Establish the transport and authenticate
    ///
    /// Races the connector against `connect_timeout`; [`cancel_connect`]
    /// or [`disconnect`] abort the attempt at any point before it completes,
    /// including during authentication. Dropping the returned future does
    /// the same. A half-open transport is dropped with the attempt.
    ///
    /// A declined handshake is `AuthRejected`; a timeout or lost connection
    /// during authentication is returned as that error.
    ///
    /// [`cancel_connect`]: SessionTransport::cancel_connect
    /// [`disconnect`]: SessionTransport::disconnect
    pub async fn connect(&self) -> ClientResult<SessionInfo> {
        let inner = &self.inner;
        let mut cancel_rx = inner.cancel.subscribe();
        let generation = inner.begin_connect()?;
        let mut attempt = ConnectAttempt {
            inner: Arc::clone(inner),
            generation,
            established: false,
        };

        info!(
            endpoint = %inner.connector.endpoint(),
            generation,
            "Connecting to collector"
        );

        let connect_timeout = inner.config.connect_timeout;
        let stream = tokio::select! {
            biased;
            _ = cancel_rx.changed() => {
                inner.teardown(generation, ConnectionState::Disconnected);
                return Err(ClientError::Cancelled);
            }
            result = tokio::time::timeout(connect_timeout, inner.connector.connect()) => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!(error = %e, "Connect failed");
                    inner.teardown(generation, ConnectionState::Error(e.to_string()));
                    return Err(e);
                }
                Err(_) => {
                    let err = ClientError::timeout("connect", connect_timeout.as_millis() as u64);
                    warn!(timeout_ms = connect_timeout.as_millis() as u64, "Connect timed out");
                    inner.teardown(generation, ConnectionState::Error(err.to_string()));
                    return Err(err);
                }
            }
        };

        if !inner.start_session(generation, stream) {
            return Err(ClientError::Cancelled);
        }

        let auth = Payload::Authenticate(inner.credentials.to_request());
        let reply = tokio::select! {
            biased;
            _ = cancel_rx.changed() => {
                inner.teardown(generation, ConnectionState::Disconnected);
                return Err(ClientError::Cancelled);
            }
            reply = self.request(auth) => reply,
        };

        // Only a declined handshake is a rejection; connection failures keep their kind
        let err = match reply {
            Ok(Payload::Authenticated(info)) => {
                if !inner.finish_connect(generation, info.clone()) {
                    return Err(ClientError::NotConnected);
                }
                attempt.established = true;
                info!(
                    session_id = info.session_id,
                    server_version = %info.server_version,
                    "Authenticated with collector"
                );
                return Ok(info);
            }
            Ok(other) => ClientError::auth_rejected(format!("unexpected {} reply", other.kind())),
            Err(ClientError::ServerError { code, message }) => {
                ClientError::auth_rejected(format!("{} (code {})", message, code))
            }
            Err(e) => e,
        };

        warn!(error = %err, "Authentication failed");
        inner.teardown(generation, ConnectionState::Error(err.to_string()));
        Err(err)
    }

    /// Abort an in-flight `connect()`; no effect on an established session
    pub fn cancel_connect(&self) {
        self.inner.cancel.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Close the session, failing every pending request before returning
    pub fn disconnect(&self) {
        self.cancel_connect();
        if !self.inner.teardown_current(ConnectionState::Disconnected) {
            // Clear a leftover error state
            self.inner.state.transition(ConnectionState::Disconnected);
        }
    }

    /// Send a request and wait for its response
    ///
    /// An `Error` payload from the collector becomes `ServerError`.
    pub async fn request(&self, payload: Payload) -> ClientResult<Payload> {
        let inner = &self.inner;
        let call = inner.correlator.register(inner.config.request_timeout);
        let id = call.id();
        let kind = payload.kind();

        inner.write_envelope(&Envelope::new(id, payload)).await?;
        debug!(id, kind, "Request sent");

        match call.wait().await? {
            Payload::Error(body) => {
                debug!(id, code = body.code, "Collector returned error");
                Err(ClientError::server_error(body.code, body.message))
            }
            response => Ok(response),
        }
    }

    /// Write one envelope without waiting for any reply
    pub async fn send(&self, envelope: Envelope) -> ClientResult<()> {
        self.inner.write_envelope(&envelope).await
    }

    /// Receiver for server pushes; replaces any earlier subscriber
    pub fn subscribe_pushes(&self) -> mpsc::Receiver<Payload> {
        self.inner.push.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Session parameters from the last successful authentication
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.inner.session_info.read().clone()
    }

    /// Targets the collector has acknowledged as subscribed this session
    pub fn subscriptions(&self) -> Vec<TargetId> {
        self.inner.push.subscriptions()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> String {
        self.inner.connector.endpoint()
    }

    pub(crate) fn push_dispatcher(&self) -> &PushDispatcher {
        &self.inner.push
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.inner.teardown_current(ConnectionState::Disconnected);
    }
}

/// Ends its generation if `connect()` is dropped before the session is up
struct ConnectAttempt {
    inner: Arc<SessionInner>,
    generation: u64,
    established: bool,
}

impl Drop for ConnectAttempt {
    fn drop(&mut self) {
        if !self.established
            && self
                .inner
                .teardown(self.generation, ConnectionState::Disconnected)
        {
            debug!(generation = self.generation, "Abandoned connect attempt torn down");
        }
    }
}

impl SessionInner {
    fn begin_connect(&self) -> ClientResult<u64> {
        let mut lc = self.lifecycle.lock();
        if lc.live {
            return Err(ClientError::invalid_state("connect", self.state.current()));
        }

        lc.generation += 1;
        lc.live = true;
        lc.codec.reset();
        self.session_info.write().take();
        self.state.transition(ConnectionState::Connecting);
        Ok(lc.generation)
    }

    /// Spawn the session tasks; false if the generation ended meanwhile
    fn start_session(self: &Arc<Self>, generation: u64, stream: BoxedStream) -> bool {
        let mut lc = self.lifecycle.lock();
        if !lc.is_live(generation) {
            debug!(generation, "Session ended before transport was ready");
            return false;
        }

        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_queue_size);

        let tasks = vec![
            tokio::spawn(Arc::clone(self).read_loop(generation, reader)),
            tokio::spawn(Arc::clone(self).write_loop(generation, writer, outbound_rx)),
            tokio::spawn(Arc::clone(self).sweep_loop(generation)),
        ];

        lc.session = Some(ActiveSession {
            outbound: outbound_tx,
            tasks,
        });
        self.stats.record_session_started();
        self.state.transition(ConnectionState::Authenticating);
        true
    }

    fn finish_connect(&self, generation: u64, info: SessionInfo) -> bool {
        let lc = self.lifecycle.lock();
        if !lc.is_live(generation) {
            return false;
        }

        *self.session_info.write() = Some(info);
        self.state.transition(ConnectionState::Connected)
    }

    /// End `generation` if it is still live
    fn teardown(&self, generation: u64, next: ConnectionState) -> bool {
        let mut lc = self.lifecycle.lock();
        if !lc.is_live(generation) {
            return false;
        }
        self.teardown_locked(&mut lc, next);
        true
    }

    /// End whatever generation is live
    fn teardown_current(&self, next: ConnectionState) -> bool {
        let mut lc = self.lifecycle.lock();
        if !lc.live {
            return false;
        }
        self.teardown_locked(&mut lc, next);
        true
    }

    fn teardown_locked(&self, lc: &mut Lifecycle, next: ConnectionState) {
        lc.live = false;
        let session = lc.session.take();

        let failed = self.correlator.fail_all(ClientError::NotConnected);
        lc.codec.reset();
        self.push.clear();
        self.session_info.write().take();

        match &next {
            ConnectionState::Error(reason) => {
                warn!(generation = lc.generation, failed, reason = %reason, "Session torn down")
            }
            _ => info!(generation = lc.generation, failed, "Session closed"),
        }
        self.state.transition(next);

        if let Some(session) = session {
            for task in session.tasks {
                task.abort();
            }
        }
    }

    async fn write_envelope(&self, envelope: &Envelope) -> ClientResult<()> {
        let bytes = self.serializer.serialize(envelope)?;
        let frame = encode_frame(&bytes, self.config.max_message_size)?;

        let outbound = self
            .lifecycle
            .lock()
            .session
            .as_ref()
            .map(|session| session.outbound.clone())
            .ok_or(ClientError::NotConnected)?;

        let (written_tx, written_rx) = oneshot::channel();
        outbound
            .send(OutboundFrame {
                frame,
                written: written_tx,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;

        written_rx.await.map_err(|_| ClientError::NotConnected)?
    }

    async fn write_loop(
        self: Arc<Self>,
        generation: u64,
        mut writer: WriteHalf<BoxedStream>,
        mut outbound: mpsc::Receiver<OutboundFrame>,
    ) {
        while let Some(OutboundFrame { frame, written }) = outbound.recv().await {
            let result = match writer.write_all(&frame).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.stats.record_send(frame.len());
                    let _ = written.send(Ok(()));
                }
                Err(e) => {
                    let err = ClientError::transport("write", &e);
                    error!(generation, error = %e, "Write failed, tearing down session");
                    let _ = written.send(Err(err.clone()));
                    self.teardown(generation, ConnectionState::Error(err.to_string()));
                    return;
                }
            }
        }
    }

    async fn read_loop(self: Arc<Self>, generation: u64, mut reader: ReadHalf<BoxedStream>) {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    info!(generation, "Collector closed the connection");
                    self.teardown(
                        generation,
                        ConnectionState::Error("connection closed by peer".to_string()),
                    );
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    let err = ClientError::transport("read", &e);
                    warn!(generation, error = %e, "Read failed, tearing down session");
                    self.teardown(generation, ConnectionState::Error(err.to_string()));
                    return;
                }
            };
            self.stats.record_bytes_received(n);

            // Decode only while this generation owns the codec
            let decoded = {
                let mut lc = self.lifecycle.lock();
                if !lc.is_live(generation) {
                    return;
                }
                lc.codec.decode(&buf[..n])
            };

            match decoded {
                Ok(frames) => {
                    for frame in frames {
                        self.handle_frame(&frame);
                    }
                }
                Err(e) => {
                    error!(
                        generation,
                        category = e.category(),
                        error = %e,
                        "Fatal framing error, tearing down session"
                    );
                    let err = ClientError::Framing(e);
                    self.teardown(generation, ConnectionState::Error(err.to_string()));
                    return;
                }
            }
        }
    }

    fn handle_frame(&self, frame: &[u8]) {
        let envelope = match self.serializer.deserialize(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(len = frame.len(), error = %e, "Dropping unparseable frame");
                self.stats.record_frame_dropped();
                return;
            }
        };
        self.stats.record_frame_received();

        if envelope.is_push() {
            self.push.dispatch(envelope.payload);
            return;
        }

        let id = envelope.id;
        let kind = envelope.payload.kind();
        if envelope.payload.class() == PayloadClass::Request {
            // The collector never issues requests; do not let one complete a call
            warn!(id, kind, "Dropping request-kind frame from collector");
            self.stats.record_frame_dropped();
            return;
        }
        if !self.correlator.resolve(id, envelope.payload) {
            self.stats.record_late_response();
            warn!(id, kind, "Dropping response for unknown or expired request");
        }
    }

    async fn sweep_loop(self: Arc<Self>, generation: u64) {
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let swept = self.correlator.sweep_stale(self.config.stale_threshold);
            if swept > 0 {
                debug!(generation, swept, "Stale sweep completed");
            }
        }
    }
}
