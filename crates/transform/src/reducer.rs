//! Reducer processor - collapse repeated observations
//!
//! Tracks (query-ip, qname, qtype) triples inside a watch interval. The
//! first observation in a window passes with a `Reducer` sub-record;
//! repeats within the window update the stored counters and are
//! dropped. Windows expire lazily on the next lookup, so no background
//! task is needed and verdicts stay deterministic for a given message
//! sequence and clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dnsflow_config::ReducerConfig;
use dnsflow_protocol::{DnsMessage, Reducer};
use parking_lot::Mutex;

use crate::{Processor, Verdict};

struct WindowEntry {
    first_seen: Instant,
    occurrences: i64,
    cumulative_length: i64,
}

pub struct ReducerProcessor {
    watch_interval: Duration,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl ReducerProcessor {
    pub fn new(config: &ReducerConfig) -> Self {
        Self {
            watch_interval: Duration::from_secs(config.watch_interval),
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn key(dm: &DnsMessage) -> String {
        format!(
            "{}|{}|{}",
            dm.network_info.query_ip, dm.dns.qname, dm.dns.qtype
        )
    }
}

impl Processor for ReducerProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let key = Self::key(dm);
        let now = Instant::now();
        let length = i64::from(dm.dns.length);

        let mut windows = self.windows.lock();
        match windows.get_mut(&key) {
            Some(entry) if now.duration_since(entry.first_seen) < self.watch_interval => {
                entry.occurrences += 1;
                entry.cumulative_length += length;
                Verdict::Drop
            }
            _ => {
                windows.insert(
                    key,
                    WindowEntry {
                        first_seen: now,
                        occurrences: 1,
                        cumulative_length: length,
                    },
                );
                dm.reducer = Some(Reducer {
                    occurrences: 1,
                    cumulative_length: length,
                });
                Verdict::Keep
            }
        }
    }

    fn name(&self) -> &'static str {
        "reducer"
    }

    fn reset(&self) {
        self.windows.lock().clear();
    }
}
