//! Tests for the worker runtime

use std::sync::Arc;
use std::time::Duration;

use dnsflow_config::Config;
use dnsflow_metrics::WorkerMetricsProvider;
use dnsflow_protocol::DnsMessage;
use dnsflow_transform::{Chain, Verdict};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::*;
use crate::route::RouteHandle;

/// Minimal worker: runs its chain and forwards, like any logger's
/// collect loop
struct EchoWorker {
    core: WorkerCore,
    chain: Chain,
}

impl EchoWorker {
    fn new(name: &str, queue: usize) -> Self {
        Self {
            core: WorkerCore::new(name, queue),
            chain: Chain::empty(),
        }
    }

    fn with_chain(name: &str, queue: usize, chain: Chain) -> Self {
        Self {
            core: WorkerCore::new(name, queue),
            chain,
        }
    }
}

impl Worker for EchoWorker {
    fn worker_type(&self) -> &'static str {
        "echo"
    }

    fn core(&self) -> &WorkerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WorkerCore {
        &mut self.core
    }

    fn spawn(mut self: Box<Self>) -> JoinHandle<()> {
        let mut channels = self.core.collect_channels();
        tokio::spawn(async move {
            loop {
                match channels.next().await {
                    CollectEvent::Stop | CollectEvent::InputClosed => break,
                    CollectEvent::Reload(config) => {
                        if let Some(entry) = config.loggers.get(self.core.name()) {
                            let _ = self.chain.reload(&entry.transforms);
                        }
                    }
                    CollectEvent::Message(mut dm) => {
                        self.core.count_ingress();
                        match self.chain.process(&mut dm) {
                            Verdict::Keep => self.core.send_forwarded(&dm),
                            Verdict::Drop => self.core.send_dropped(&dm),
                        }
                    }
                }
            }
        })
    }
}

fn attach_sink(worker: &mut EchoWorker, name: &str, capacity: usize) -> mpsc::Receiver<DnsMessage> {
    let (tx, rx) = mpsc::channel(capacity);
    worker
        .core_mut()
        .add_default_route(RouteHandle::new(name, tx));
    rx
}

#[tokio::test]
async fn messages_flow_to_default_routes() {
    let mut worker = EchoWorker::new("w", 16);
    let mut rx = attach_sink(&mut worker, "sink", 16);
    let input = worker.core().input();
    let handle = worker.core().handle("echo");

    Box::new(worker).spawn();

    for i in 0..3u16 {
        let mut dm = DnsMessage::fake();
        dm.dns.id = i;
        input.send(dm).await.unwrap();
    }

    for i in 0..3u16 {
        let dm = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        // FIFO per edge
        assert_eq!(dm.dns.id, i);
    }

    handle.stop();
}

#[tokio::test]
async fn routing_conservation_under_full_queue() {
    let mut worker = EchoWorker::new("w", 64);
    // healthy sink keeps its queue drained, stalled sink has capacity 1
    // and no consumer
    let mut healthy_rx = attach_sink(&mut worker, "healthy", 64);
    let _stalled_rx = attach_sink(&mut worker, "stalled", 1);
    let input = worker.core().input();
    let handle = worker.core().handle("echo");

    Box::new(worker).spawn();

    const SENT: u64 = 20;
    for _ in 0..SENT {
        input.send(DnsMessage::fake()).await.unwrap();
    }

    let mut received = 0;
    while received < SENT {
        tokio::time::timeout(Duration::from_secs(1), healthy_rx.recv())
            .await
            .expect("healthy sink must receive every message")
            .unwrap();
        received += 1;
    }

    // counters for the last message can lag its delivery by a beat
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    let snapshot = loop {
        let snapshot = handle.snapshot();
        if snapshot.forwarded + snapshot.overflow_dropped == SENT * 2 {
            break snapshot;
        }
        assert!(tokio::time::Instant::now() < deadline, "counters never settled");
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(snapshot.ingress, SENT);
    assert_eq!(snapshot.egress, SENT);
    // the stalled sink accepted exactly one message; every other
    // (message, destination) pair was either delivered or drop-counted
    assert_eq!(snapshot.forwarded, SENT + 1);
    assert_eq!(snapshot.overflow_dropped, SENT - 1);

    handle.stop();
}

#[tokio::test]
async fn policy_drops_go_to_dropped_routes_only() {
    let config: Config = r#"
        [loggers.w]
        type = "stdout"
        [loggers.w.transforms.filtering]
        enable = true
        drop-queries = true
    "#
    .parse()
    .unwrap();
    let chain = Chain::build(&config.loggers["w"].transforms).unwrap();

    let mut worker = EchoWorker::with_chain("w", 16, chain);
    let mut default_rx = attach_sink(&mut worker, "default", 16);
    let (dropped_tx, mut dropped_rx) = mpsc::channel(16);
    worker
        .core_mut()
        .add_dropped_route(RouteHandle::new("dropped", dropped_tx));
    let input = worker.core().input();
    let handle = worker.core().handle("echo");

    Box::new(worker).spawn();

    // a query (dropped by the chain) and a reply (kept)
    input.send(DnsMessage::fake()).await.unwrap();
    let mut reply = DnsMessage::fake();
    reply.dns.flags.qr = true;
    input.send(reply).await.unwrap();

    let via_dropped = tokio::time::timeout(Duration::from_secs(1), dropped_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!via_dropped.dns.flags.qr);

    let via_default = tokio::time::timeout(Duration::from_secs(1), default_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(via_default.dns.flags.qr);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.ingress, 2);
    assert_eq!(snapshot.egress, 1);
    assert_eq!(snapshot.policy_dropped, 1);

    handle.stop();
}

#[tokio::test]
async fn stop_is_prompt_even_with_backlog() {
    let mut worker = EchoWorker::new("w", 4);
    let _rx = attach_sink(&mut worker, "sink", 1);
    let input = worker.core().input();
    let handle = worker.core().handle("echo");

    let join = Box::new(worker).spawn();

    // fill the input queue
    for _ in 0..4 {
        input.send(DnsMessage::fake()).await.unwrap();
    }

    handle.stop();
    tokio::time::timeout(Duration::from_secs(1), join)
        .await
        .expect("worker must stop within the deadline")
        .unwrap();
}

#[tokio::test]
async fn input_close_terminates_the_loop() {
    let mut worker = EchoWorker::new("w", 4);
    let _rx = attach_sink(&mut worker, "sink", 4);
    let input = worker.core().input();

    let join = Box::new(worker).spawn();
    drop(input);

    tokio::time::timeout(Duration::from_secs(1), join)
        .await
        .expect("worker must observe input close")
        .unwrap();
}

#[tokio::test]
async fn reload_installs_new_transforms_between_messages() {
    let worker = EchoWorker::new("w", 16);
    let mut worker = worker;
    let mut rx = attach_sink(&mut worker, "sink", 16);
    let input = worker.core().input();
    let handle = worker.core().handle("echo");

    Box::new(worker).spawn();

    input.send(DnsMessage::fake()).await.unwrap();
    let before = rx.recv().await.unwrap();
    assert!(before.atags.is_none());

    let new_config: Config = r#"
        [loggers.w]
        type = "stdout"
        [loggers.w.transforms.atags]
        enable = true
        add-tags = ["reloaded"]
    "#
    .parse()
    .unwrap();
    assert!(handle.reload(Arc::new(new_config)));

    // the reload channel is observed by the same select as input, so
    // the next message may race the install; poll until it lands
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        input.send(DnsMessage::fake()).await.unwrap();
        let dm = rx.recv().await.unwrap();
        if let Some(atags) = dm.atags {
            assert_eq!(atags.tags, vec!["reloaded"]);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reload never took effect"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.stop();
}
