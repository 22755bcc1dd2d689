//! Tests for the replay collector

use std::io::Write;
use std::time::Duration;

use dnsflow_config::TransformsConfig;
use tokio::sync::mpsc;

use super::*;
use dnsflow_pipeline::RouteHandle;

fn write_source(lines: &[String]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn start_collector(
    path: &std::path::Path,
    rate: u32,
    repeat: bool,
) -> (
    mpsc::Receiver<DnsMessage>,
    dnsflow_pipeline::WorkerHandle,
    tokio::task::JoinHandle<()>,
) {
    let cfg = ReplayCollectorConfig {
        path: path.to_path_buf(),
        rate,
        repeat,
    };
    let mut collector =
        ReplayCollector::new("tap", &cfg, &TransformsConfig::default(), 64).unwrap();

    let (tx, rx) = mpsc::channel(256);
    collector.core_mut().add_default_route(RouteHandle::new("sink", tx));
    let handle = collector.core().handle("replay");
    let join = Box::new(collector).spawn();
    (rx, handle, join)
}

#[tokio::test]
async fn replays_observations_in_file_order() {
    let mut lines = Vec::new();
    for i in 0..5 {
        let mut dm = DnsMessage::fake();
        dm.dns.id = i;
        lines.push(dm.to_json());
    }
    let source = write_source(&lines);

    let (mut rx, handle, join) = start_collector(source.path(), 0, false);

    for i in 0..5 {
        let dm = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("replayed message must arrive")
            .unwrap();
        assert_eq!(dm.dns.id, i);
        assert_eq!(dm.dns.qname, "dns.collector");
    }

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), join).await;
}

#[tokio::test]
async fn unparseable_lines_are_skipped() {
    let lines = vec![
        DnsMessage::fake().to_json(),
        "not json at all".to_string(),
        DnsMessage::fake().to_json(),
    ];
    let source = write_source(&lines);

    let (mut rx, handle, join) = start_collector(source.path(), 0, false);

    for _ in 0..2 {
        assert!(tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("valid messages must still arrive")
            .is_some());
    }
    assert!(
        tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .is_err(),
        "the bad line must not produce a message"
    );

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), join).await;
}

#[tokio::test]
async fn repeat_mode_cycles_the_file() {
    let lines = vec![DnsMessage::fake().to_json()];
    let source = write_source(&lines);

    let (mut rx, handle, join) = start_collector(source.path(), 0, true);

    // more deliveries than the file has lines proves it cycled
    for _ in 0..5 {
        assert!(tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("repeat mode must keep producing")
            .is_some());
    }

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), join)
        .await
        .expect("collector must stop while replaying")
        .unwrap();
}

#[tokio::test]
async fn missing_timestamps_are_computed() {
    let mut dm = DnsMessage::fake();
    // the unix timestamp travels in JSON, the formatted string does not
    dm.dnstap.timestamp = 1_700_000_000_000_000_000;
    let source = write_source(&[dm.to_json()]);

    let (mut rx, handle, join) = start_collector(source.path(), 0, false);

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(received.dnstap.timestamp_rfc3339.starts_with("2023-"));

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), join).await;
}
