//! Tests for the TCP publisher sink

use std::time::Duration;

use dnsflow_metrics::WorkerMetricsProvider;
use dnsflow_pipeline::WorkerHandle;
use dnsflow_protocol::DnsMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::*;

struct Running {
    input: mpsc::Sender<DnsMessage>,
    handle: WorkerHandle,
    join: tokio::task::JoinHandle<()>,
}

fn start_sink(port: u16, buffer_size: usize, flush_interval: u64, retry_interval: u64) -> Running {
    let config: Config = format!(
        r#"
        [loggers.out]
        type = "tcp"
        remote-address = "127.0.0.1"
        remote-port = {port}
        mode = "flat-json"
        buffer-size = {buffer_size}
        flush-interval = {flush_interval}
        connect-timeout = 1
        retry-interval = {retry_interval}
        "#
    )
    .parse()
    .unwrap();
    let entry = config.loggers["out"].clone();
    let LoggerKind::Tcp(cfg) = &entry.kind else {
        panic!("test config must declare a tcp logger");
    };
    let sink = TcpSink::new("out", cfg, &entry, &config, 256).unwrap();
    let input = sink.core().input();
    let handle = sink.core().handle("tcp");
    let join = Box::new(sink).spawn();
    Running {
        input,
        handle,
        join,
    }
}

/// Accept one connection and stream its lines into a channel
fn collect_lines(listener: TcpListener) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let Ok((socket, _)) = listener.accept().await else {
            return;
        };
        let mut lines = BufReader::new(socket).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                return;
            }
        }
    });
    rx
}

async fn recv_line(rx: &mut mpsc::UnboundedReceiver<String>, within: Duration) -> Option<String> {
    tokio::time::timeout(within, rx.recv()).await.ok().flatten()
}

async fn wait_ready(handle: &WorkerHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !handle.snapshot().writer_ready {
        assert!(tokio::time::Instant::now() < deadline, "writer never became ready");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn size_trigger_publishes_the_buffer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut lines = collect_lines(listener);

    let running = start_sink(port, 5, 30, 1);
    wait_ready(&running.handle).await;
    for _ in 0..5 {
        running.input.send(DnsMessage::fake()).await.unwrap();
    }

    for _ in 0..5 {
        let line = recv_line(&mut lines, Duration::from_secs(5))
            .await
            .expect("buffered messages must arrive after the size trigger");
        assert!(line.contains("\"dns.qname\":\"dns.collector\""));
    }

    running.handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.join).await;
}

#[tokio::test]
async fn interval_trigger_publishes_partial_buffers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut lines = collect_lines(listener);

    // size trigger far away, one-second cadence does the work
    let running = start_sink(port, 1000, 1, 1);
    wait_ready(&running.handle).await;
    for _ in 0..3 {
        running.input.send(DnsMessage::fake()).await.unwrap();
    }

    // nothing may arrive before the first tick
    assert!(
        recv_line(&mut lines, Duration::from_millis(300)).await.is_none(),
        "messages published before the flush interval elapsed"
    );

    for _ in 0..3 {
        assert!(recv_line(&mut lines, Duration::from_secs(5)).await.is_some());
    }

    running.handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.join).await;
}

#[tokio::test]
async fn outage_discards_and_reconnect_resumes() {
    // reserve a port, then close it so the first connection attempts fail
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let running = start_sink(port, 1000, 1, 1);

    // messages sent during the outage are shed, not buffered
    for _ in 0..50 {
        running.input.send(DnsMessage::fake()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!running.handle.snapshot().writer_ready);

    // endpoint comes back; the connection loop finds it within a retry
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let mut lines = collect_lines(listener);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !running.handle.snapshot().writer_ready {
        assert!(
            tokio::time::Instant::now() < deadline,
            "writer never became ready after the endpoint returned"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let mut sent = DnsMessage::fake();
    sent.dns.qname = "after.outage".into();
    for _ in 0..3 {
        running.input.send(sent.clone()).await.unwrap();
    }

    // only post-reconnect messages arrive
    for _ in 0..3 {
        let line = recv_line(&mut lines, Duration::from_secs(5))
            .await
            .expect("post-reconnect messages must arrive");
        assert!(line.contains("after.outage"));
    }
    assert!(
        recv_line(&mut lines, Duration::from_millis(500)).await.is_none(),
        "messages shed during the outage reappeared"
    );

    running.handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.join).await;
}

#[tokio::test]
async fn stop_is_prompt_while_disconnected() {
    // no listener at all: the connection loop keeps retrying
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let running = start_sink(port, 10, 30, 30);
    running.input.send(DnsMessage::fake()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    running.handle.stop();
    tokio::time::timeout(Duration::from_secs(2), running.join)
        .await
        .expect("sink must stop even while the connection loop is sleeping")
        .unwrap();
}

#[tokio::test]
async fn ready_gauge_tracks_connection_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _lines = collect_lines(listener);

    let running = start_sink(port, 10, 30, 1);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !running.handle.snapshot().writer_ready {
        assert!(tokio::time::Instant::now() < deadline, "never connected");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    running.handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.join).await;
}
