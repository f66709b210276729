//! Monitor bootstrap against an in-process collector
//!
//! Exercises the full path: connect, catalogue, history preload,
//! subscription, then pushes flowing through the pipeline into the store.

use async_trait::async_trait;
use codec::{encode_frame, FrameCodec};
use network::{BoxedStream, ClientConfig, ClientResult, Connector, Credentials, ProxyClient};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tapline_monitor::{bootstrap, PushPipeline};
use telemetry::{SeriesStore, Severity};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use types::{
    current_timestamp_ns, BincodeSerializer, Envelope, EnvelopeSerializer, ErrorBody, HistoryBatch,
    Payload, Sample, SampleBatch, SessionInfo, TargetInfo,
};

const SEC: u64 = 1_000_000_000;
const IF_IN_OCTETS: &str = "1.3.6.1.2.1.2.2.1.10";

fn target(id: u64, enabled: bool) -> TargetInfo {
    TargetInfo {
        target_id: id,
        display_name: format!("edge{} uplink", id),
        address: "192.0.2.1".to_string(),
        oid: format!("{}.{}", IF_IN_OCTETS, id),
        interval_ms: 1000,
        enabled,
        last_error: None,
    }
}

/// Collector that answers the bootstrap requests and forwards `Subscribe`
struct Collector {
    subscribed: mpsc::UnboundedSender<Vec<u64>>,
    base_ns: u64,
}

impl Collector {
    fn answer(&self, envelope: &Envelope) -> Payload {
        match &envelope.payload {
            Payload::Authenticate(_) => Payload::Authenticated(SessionInfo {
                session_id: 1,
                client_name: "monitor-tests".to_string(),
                server_version: "2.0.0".to_string(),
                push_interval_ms: 1000,
            }),
            Payload::ListTargets => Payload::TargetList(vec![target(1, true), target(2, true), target(3, false)]),
            Payload::GetHistory(request) if request.target_id == 2 => {
                Payload::Error(ErrorBody::new(404, "no history"))
            }
            Payload::GetHistory(request) => Payload::History(HistoryBatch {
                target_id: request.target_id,
                samples: vec![
                    Sample::new(request.target_id, self.base_ns, 0),
                    Sample::new(request.target_id, self.base_ns + SEC, 125_000),
                ],
            }),
            Payload::Subscribe { target_ids } => {
                let _ = self.subscribed.send(target_ids.clone());
                Payload::Ack
            }
            other => Payload::Error(ErrorBody::new(501, format!("unsupported {}", other.kind()))),
        }
    }

    async fn serve(self, stream: DuplexStream, mut pushes: mpsc::UnboundedReceiver<Payload>) {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut codec = FrameCodec::default();
        let mut buf = vec![0u8; 8192];

        loop {
            tokio::select! {
                biased;
                Some(payload) = pushes.recv() => {
                    write(&mut writer, &Envelope::push(payload)).await;
                }
                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    for frame in codec.decode(&buf[..n]).expect("valid frames") {
                        let envelope = BincodeSerializer.deserialize(&frame).expect("valid envelope");
                        let reply = self.answer(&envelope);
                        write(&mut writer, &Envelope::new(envelope.id, reply)).await;
                    }
                }
            }
        }
    }
}

async fn write<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, envelope: &Envelope) {
    let bytes = BincodeSerializer.serialize(envelope).unwrap();
    writer.write_all(&encode_frame(&bytes, usize::MAX).unwrap()).await.unwrap();
}

struct TestConnector {
    subscribed: mpsc::UnboundedSender<Vec<u64>>,
    push_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Payload>>>>,
    base_ns: u64,
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self) -> ClientResult<BoxedStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.push_tx.lock().unwrap() = Some(tx);

        let collector = Collector {
            subscribed: self.subscribed.clone(),
            base_ns: self.base_ns,
        };
        tokio::spawn(collector.serve(server, rx));
        Ok(Box::new(client))
    }

    fn endpoint(&self) -> String {
        "duplex://monitor-tests".to_string()
    }
}

#[tokio::test]
async fn bootstrap_registers_preloads_and_subscribes() {
    let (subscribed_tx, mut subscribed) = mpsc::unbounded_channel();
    let push_tx = Arc::new(Mutex::new(None));
    let base_ns = current_timestamp_ns() - 60 * SEC;

    let connector = Arc::new(TestConnector {
        subscribed: subscribed_tx,
        push_tx: Arc::clone(&push_tx),
        base_ns,
    });
    let client = ProxyClient::new(
        ClientConfig::default().with_request_timeout(Duration::from_secs(2)),
        Credentials::new("token", "monitor-tests"),
        connector,
    );
    let pushes = client.subscribe_pushes();
    client.connect().await.unwrap();

    let store = Arc::new(SeriesStore::new(100, 16));
    let selected = bootstrap(&client, &store, Duration::from_secs(600), &[])
        .await
        .unwrap();

    // Disabled target skipped, missing history tolerated
    assert_eq!(selected, vec![1, 2]);
    assert_eq!(subscribed.recv().await.unwrap(), vec![1, 2]);
    assert_eq!(client.subscriptions(), vec![1, 2]);
    assert_eq!(store.series_ids(), vec![1, 2]);
    assert_eq!(store.series(1).unwrap().len(), 2);
    assert!(store.series(2).unwrap().is_empty());

    // ifInOctets: 125 000 octets/s × 8 = 1 Mbps
    let display = store.display(1).unwrap();
    assert_eq!(display.formatted.to_string(), "1.00 Mbps");
    assert_eq!(display.display_name, "edge1 uplink");

    let pipeline = tokio::spawn(PushPipeline::new(Arc::clone(&store)).run(pushes));
    let sender = push_tx.lock().unwrap().clone().unwrap();
    sender
        .send(Payload::SamplePush(SampleBatch {
            samples: vec![Sample::new(1, base_ns + 2 * SEC, 375_000)],
        }))
        .unwrap();

    let mut value = None;
    for _ in 0..50 {
        if store.latest(1).map(|s| s.timestamp_ns) == Some(base_ns + 2 * SEC) {
            value = store.display(1);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let value = value.expect("push never reached the store");
    assert_eq!(value.formatted.to_string(), "2.00 Mbps");
    assert_eq!(value.formatted.severity, Severity::Normal);

    client.disconnect();
    let stats = pipeline.await.unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test]
async fn bootstrap_honours_target_filter() {
    let (subscribed_tx, mut subscribed) = mpsc::unbounded_channel();
    let connector = Arc::new(TestConnector {
        subscribed: subscribed_tx,
        push_tx: Arc::new(Mutex::new(None)),
        base_ns: current_timestamp_ns() - 60 * SEC,
    });
    let client = ProxyClient::new(
        ClientConfig::default(),
        Credentials::new("token", "monitor-tests"),
        connector,
    );
    client.connect().await.unwrap();

    let store = SeriesStore::new(100, 16);
    let selected = bootstrap(&client, &store, Duration::ZERO, &[2, 3])
        .await
        .unwrap();

    assert_eq!(selected, vec![2]);
    assert_eq!(subscribed.recv().await.unwrap(), vec![2]);
    assert!(store.series(2).unwrap().is_empty());
}
