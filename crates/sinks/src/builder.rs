//! Logger construction from configuration

use dnsflow_config::{Config, LoggerEntry, LoggerKind};
use dnsflow_pipeline::Worker;

use crate::{BulkHttpSink, FileSink, Result, SinkError, StdoutSink, TcpSink};

/// Build the sink worker for one `[loggers.<name>]` entry
///
/// Construction performs the fatal parts of startup - opening files,
/// loading TLS material, building HTTP clients - so a broken logger
/// stops the process before any worker runs.
pub fn build_logger(name: &str, entry: &LoggerEntry, config: &Config) -> Result<Box<dyn Worker>> {
    let queue_size = config.channel_buffer_size(entry.channel_buffer_size);
    match &entry.kind {
        LoggerKind::Stdout(cfg) => Ok(Box::new(StdoutSink::new(
            name, cfg, entry, config, queue_size,
        )?)),
        LoggerKind::File(cfg) => Ok(Box::new(FileSink::new(
            name, cfg, entry, config, queue_size,
        )?)),
        LoggerKind::Tcp(cfg) => Ok(Box::new(TcpSink::new(
            name, cfg, entry, config, queue_size,
        )?)),
        LoggerKind::BulkHttp(cfg) => Ok(Box::new(BulkHttpSink::new(
            name, cfg, entry, config, queue_size,
        )?)),
        // the broker config is validated like every other logger, but
        // no client ships with this build
        LoggerKind::Mqtt(_) => Err(SinkError::Unsupported {
            kind: "mqtt",
            reason: "no broker client is built in",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(config: &Config, name: &str) -> LoggerEntry {
        config.loggers[name].clone()
    }

    #[test]
    fn builds_each_supported_logger() {
        let dir = tempfile::tempdir().unwrap();
        let config: Config = format!(
            r#"
            [loggers.console]
            type = "stdout"

            [loggers.archive]
            type = "file"
            file-path = "{}/dns.log"

            [loggers.remote]
            type = "tcp"

            [loggers.search]
            type = "bulk-http"
            "#,
            dir.path().display()
        )
        .parse()
        .unwrap();

        for name in ["console", "archive", "remote", "search"] {
            let worker = build_logger(name, &entry(&config, name), &config).unwrap();
            assert_eq!(worker.name(), name);
            assert!(!worker.is_collector());
        }
    }

    #[test]
    fn mqtt_logger_is_reported_unavailable() {
        let config: Config = r#"
            [loggers.broker]
            type = "mqtt"
            "#
        .parse()
        .unwrap();

        let err = build_logger("broker", &entry(&config, "broker"), &config).unwrap_err();
        assert!(matches!(err, SinkError::Unsupported { kind: "mqtt", .. }));
    }

    #[test]
    fn queue_size_prefers_the_worker_override() {
        let config: Config = r#"
            [global]
            channel-buffer-size = 1024

            [loggers.console]
            type = "stdout"
            channel-buffer-size = 8
            "#
        .parse()
        .unwrap();

        // the override is visible through the config helper the builder uses
        let entry = entry(&config, "console");
        assert_eq!(config.channel_buffer_size(entry.channel_buffer_size), 8);
        build_logger("console", &entry, &config).unwrap();
    }
}
