//! Tests for topology wiring and lifecycle

use std::sync::Arc;
use std::time::Duration;

use dnsflow_config::Config;
use dnsflow_protocol::DnsMessage;
use tokio::task::JoinHandle;

use super::*;
use crate::worker::{CollectEvent, Worker, WorkerCore};

/// Pass-through node used as both collector and logger stand-in
struct Node {
    core: WorkerCore,
    collector: bool,
}

impl Node {
    fn new(name: &str, collector: bool) -> Box<Self> {
        Box::new(Self {
            core: WorkerCore::new(name, 16),
            collector,
        })
    }
}

impl Worker for Node {
    fn worker_type(&self) -> &'static str {
        "node"
    }

    fn is_collector(&self) -> bool {
        self.collector
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
                    CollectEvent::Reload(_) => {}
                    CollectEvent::Message(dm) => {
                        self.core.count_ingress();
                        self.core.send_forwarded(&dm);
                    }
                }
            }
        })
    }
}

fn config(toml: &str) -> Arc<Config> {
    Arc::new(toml.parse().unwrap())
}

#[test]
fn duplicate_names_are_rejected() {
    let mut topology = Topology::new(config(""));
    topology.register(Node::new("a", false)).unwrap();
    let err = topology.register(Node::new("a", true)).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateWorker(name) if name == "a"));
}

#[test]
fn unknown_route_target_is_rejected() {
    let cfg = config(
        r#"
        [collectors.tap]
        type = "replay"
        path = "q.jsonl"
        forward = ["nowhere"]
        "#,
    );
    let mut topology = Topology::new(cfg);
    topology.register(Node::new("tap", true)).unwrap();
    let err = topology.wire().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::UnknownRoute { worker, target } if worker == "tap" && target == "nowhere"
    ));
}

#[test]
fn route_into_a_collector_is_rejected() {
    let cfg = config(
        r#"
        [collectors.tap]
        type = "replay"
        path = "q.jsonl"
        forward = ["tap2"]

        [collectors.tap2]
        type = "replay"
        path = "q.jsonl"
        forward = ["sink"]

        [loggers.sink]
        type = "stdout"
        "#,
    );
    let mut topology = Topology::new(cfg);
    topology.register(Node::new("tap", true)).unwrap();
    topology.register(Node::new("tap2", true)).unwrap();
    topology.register(Node::new("sink", false)).unwrap();
    let err = topology.wire().unwrap_err();
    assert!(matches!(err, PipelineError::RouteToCollector { .. }));
}

#[test]
fn cycles_are_rejected() {
    let cfg = config(
        r#"
        [loggers.a]
        type = "stdout"
        forward = ["b"]

        [loggers.b]
        type = "stdout"
        forward = ["c"]

        [loggers.c]
        type = "stdout"
        forward = ["a"]
        "#,
    );
    let mut topology = Topology::new(cfg);
    for name in ["a", "b", "c"] {
        topology.register(Node::new(name, false)).unwrap();
    }
    let err = topology.wire().unwrap_err();
    assert!(matches!(err, PipelineError::CycleDetected(_)));
}

#[test]
fn config_entry_without_worker_is_rejected() {
    let cfg = config(
        r#"
        [loggers.sink]
        type = "stdout"
        "#,
    );
    let mut topology = Topology::new(cfg);
    let err = topology.wire().unwrap_err();
    assert!(matches!(err, PipelineError::MissingWorker(name) if name == "sink"));
}

#[test]
fn diamond_graphs_are_fine() {
    let cfg = config(
        r#"
        [collectors.tap]
        type = "replay"
        path = "q.jsonl"
        forward = ["left", "right"]

        [loggers.left]
        type = "stdout"
        forward = ["sink"]

        [loggers.right]
        type = "stdout"
        forward = ["sink"]

        [loggers.sink]
        type = "stdout"
        "#,
    );
    let mut topology = Topology::new(cfg);
    topology.register(Node::new("tap", true)).unwrap();
    for name in ["left", "right", "sink"] {
        topology.register(Node::new(name, false)).unwrap();
    }
    topology.wire().unwrap();
}

#[tokio::test]
async fn wired_topology_moves_messages_end_to_end() {
    let cfg = config(
        r#"
        [collectors.tap]
        type = "replay"
        path = "q.jsonl"
        forward = ["relay"]

        [loggers.relay]
        type = "stdout"
        forward = ["sink"]

        [loggers.sink]
        type = "stdout"
        "#,
    );
    let mut topology = Topology::new(Arc::clone(&cfg));
    topology.register(Node::new("tap", true)).unwrap();
    topology.register(Node::new("relay", false)).unwrap();

    // keep a probe on the terminal sink's metrics
    let sink = Node::new("sink", false);
    let sink_handle = sink.core().handle("node");
    topology.register(sink).unwrap();

    topology.wire().unwrap();

    // grab the collector's input before starting
    let mut tap_input = None;
    let running = {
        let mut topology = topology;
        for worker in &topology.workers {
            if worker.name() == "tap" {
                tap_input = Some(worker.core().input());
            }
        }
        topology.start()
    };
    let tap_input = tap_input.unwrap();

    for _ in 0..5 {
        tap_input.send(DnsMessage::fake()).await.unwrap();
    }

    // the message crosses tap -> relay -> sink
    use dnsflow_metrics::WorkerMetricsProvider;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if sink_handle.snapshot().ingress == 5 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "messages never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tokio::time::timeout(Duration::from_secs(5), running.shutdown())
        .await
        .expect("shutdown must be bounded");
}

#[tokio::test]
async fn shutdown_stops_collectors_before_loggers() {
    let cfg = config(
        r#"
        [collectors.tap]
        type = "replay"
        path = "q.jsonl"
        forward = ["sink"]

        [loggers.sink]
        type = "stdout"
        "#,
    );
    let mut topology = Topology::new(cfg);
    topology.register(Node::new("tap", true)).unwrap();
    topology.register(Node::new("sink", false)).unwrap();
    topology.wire().unwrap();

    let running = topology.start();
    tokio::time::timeout(Duration::from_secs(5), running.shutdown())
        .await
        .expect("shutdown must be bounded");
}
