//! Tests for route handles and fan-out

use dnsflow_protocol::DnsMessage;
use tokio::sync::mpsc;

use super::*;

#[tokio::test]
async fn try_send_delivers_when_capacity_exists() {
    let (tx, mut rx) = mpsc::channel(4);
    let route = RouteHandle::new("sink", tx);

    assert!(route.try_send(DnsMessage::fake()));
    assert_eq!(route.dropped(), 0);
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn full_queue_counts_a_drop() {
    let (tx, _rx) = mpsc::channel(1);
    let route = RouteHandle::new("sink", tx);

    assert!(route.try_send(DnsMessage::fake()));
    assert!(!route.try_send(DnsMessage::fake()));
    assert!(!route.try_send(DnsMessage::fake()));
    assert_eq!(route.dropped(), 2);
}

#[tokio::test]
async fn closed_queue_counts_a_drop() {
    let (tx, rx) = mpsc::channel(1);
    let route = RouteHandle::new("sink", tx);
    drop(rx);

    assert!(route.is_closed());
    assert!(!route.try_send(DnsMessage::fake()));
    assert_eq!(route.dropped(), 1);
}

#[tokio::test]
async fn broadcast_reaches_every_destination() {
    let mut set = RouteSet::new();
    let (tx1, mut rx1) = mpsc::channel(4);
    let (tx2, mut rx2) = mpsc::channel(4);
    set.add(RouteHandle::new("a", tx1));
    set.add(RouteHandle::new("b", tx2));

    let outcome = set.broadcast(&DnsMessage::fake());
    assert_eq!(outcome, BroadcastOutcome { delivered: 2, dropped: 0 });

    // pass-by-value: both destinations own their copy
    let a = rx1.recv().await.unwrap();
    let b = rx2.recv().await.unwrap();
    assert_eq!(a.dns.qname, b.dns.qname);
}

#[tokio::test]
async fn one_full_destination_does_not_block_the_others() {
    let mut set = RouteSet::new();
    let (full_tx, _full_rx) = mpsc::channel(1);
    let (open_tx, mut open_rx) = mpsc::channel(16);
    set.add(RouteHandle::new("full", full_tx));
    set.add(RouteHandle::new("open", open_tx));

    // first broadcast fills the small queue
    set.broadcast(&DnsMessage::fake());
    // second one drops for `full` but still reaches `open`
    let outcome = set.broadcast(&DnsMessage::fake());
    assert_eq!(outcome, BroadcastOutcome { delivered: 1, dropped: 1 });

    assert!(open_rx.recv().await.is_some());
    assert!(open_rx.recv().await.is_some());

    let drops: Vec<u64> = set.iter().map(RouteHandle::dropped).collect();
    assert_eq!(drops, vec![1, 0]);
}

#[test]
fn names_reflect_destinations() {
    let mut set = RouteSet::new();
    assert!(set.is_empty());

    let (tx, _rx) = mpsc::channel(1);
    set.add(RouteHandle::new("file1", tx));
    assert_eq!(set.len(), 1);
    assert_eq!(set.names(), vec!["file1"]);
}
