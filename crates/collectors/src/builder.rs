//! Collector construction from configuration

use dnsflow_config::{CollectorEntry, CollectorKind, Config};
use dnsflow_pipeline::Worker;

use crate::{ReplayCollector, Result};

/// Build the collector worker for one `[collectors.<name>]` entry
pub fn build_collector(
    name: &str,
    entry: &CollectorEntry,
    config: &Config,
) -> Result<Box<dyn Worker>> {
    let queue_size = config.channel_buffer_size(entry.channel_buffer_size);
    match &entry.kind {
        CollectorKind::Replay(cfg) => Ok(Box::new(ReplayCollector::new(
            name,
            cfg,
            &entry.transforms,
            queue_size,
        )?)),
    }
}
