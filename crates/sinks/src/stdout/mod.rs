//! Stdout sink - render messages to standard output
//!
//! The smallest logger; mostly useful for demo topologies, debugging
//! and tests. Still a full worker: transform chain, routes, metrics,
//! reload.

use dnsflow_config::{Config, LoggerEntry, LoggerKind, StdoutLoggerConfig};
use dnsflow_pipeline::{CollectEvent, Worker, WorkerCore};
use dnsflow_transform::{Chain, Verdict};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::format::Serializer;
use crate::Result;

pub struct StdoutSink {
    core: WorkerCore,
    chain: Chain,
    serializer: Serializer,
}

impl StdoutSink {
    pub fn new(
        name: &str,
        cfg: &StdoutLoggerConfig,
        entry: &LoggerEntry,
        config: &Config,
        queue_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            core: WorkerCore::new(name, queue_size),
            chain: Chain::build(&entry.transforms)?,
            serializer: Serializer::new(cfg.mode, cfg.text_format.as_deref(), &config.global)?,
        })
    }

    fn apply_reload(&mut self, config: &Config) {
        let name = self.core.name().to_string();
        let Some(entry) = config.loggers.get(&name) else {
            tracing::warn!(worker = %name, "reload has no entry for this worker, keeping config");
            return;
        };
        let LoggerKind::Stdout(cfg) = &entry.kind else {
            tracing::warn!(worker = %name, "reload changed worker type, keeping config");
            return;
        };
        match Serializer::new(cfg.mode, cfg.text_format.as_deref(), &config.global) {
            Ok(serializer) => self.serializer = serializer,
            Err(e) => {
                tracing::warn!(worker = %name, error = %e, "reload rejected, keeping config");
                return;
            }
        }
        if let Err(e) = self.chain.reload(&entry.transforms) {
            tracing::warn!(worker = %name, error = %e, "transform reload rejected, keeping chain");
        }
        tracing::info!(worker = %name, "config reloaded");
    }
}

impl Worker for StdoutSink {
    fn worker_type(&self) -> &'static str {
        "stdout"
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
            tracing::info!(worker = %self.core.name(), "stdout logger starting");
            let mut out = tokio::io::stdout();

            loop {
                match channels.next().await {
                    CollectEvent::Stop => break,
                    CollectEvent::InputClosed => {
                        tracing::info!(worker = %self.core.name(), "input channel closed");
                        break;
                    }
                    CollectEvent::Reload(config) => self.apply_reload(&config),
                    CollectEvent::Message(mut dm) => {
                        self.core.count_ingress();
                        if self.chain.process(&mut dm) == Verdict::Drop {
                            self.core.send_dropped(&dm);
                            continue;
                        }
                        self.core.send_forwarded(&dm);

                        match self.serializer.render(&dm) {
                            Ok(mut line) => {
                                line.push('\n');
                                if let Err(e) = out.write_all(line.as_bytes()).await {
                                    tracing::error!(
                                        worker = %self.core.name(),
                                        error = %e,
                                        "stdout write failed"
                                    );
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    worker = %self.core.name(),
                                    error = %e,
                                    "serialization failed, message skipped"
                                );
                            }
                        }
                    }
                }
            }

            self.chain.reset();
            let _ = out.flush().await;
            tracing::info!(worker = %self.core.name(), "stdout logger stopped");
        })
    }
}
