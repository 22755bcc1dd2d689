//! Bulk HTTP sink - search-backend bulk indexing
//!
//! Accumulates flat-JSON documents into newline-delimited bulk bodies,
//! each document preceded by a `{"create":{}}` action line. A body
//! ships when it reaches `bulk-size` bytes or when `flush-interval`
//! elapses. Ready bodies travel over a bounded queue to the HTTP loop;
//! when that queue is full the body is dropped and counted, so a slow
//! receiver never grows memory.

use std::sync::Arc;
use std::time::Duration;

use dnsflow_config::{BulkHttpLoggerConfig, Config, LoggerEntry, LoggerKind};
use dnsflow_metrics::WorkerMetrics;
use dnsflow_pipeline::{CollectEvent, Worker, WorkerCore};
use dnsflow_protocol::DnsMessage;
use dnsflow_transform::{Chain, Verdict};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::util::RateLimitedLogger;
use crate::{Result, SinkError};

/// Bound for one bulk POST, connection setup included
const BULK_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the collect-loop to buffer-loop queue, in messages
const OUTPUT_QUEUE: usize = 512;

/// The action line preceding every document
const ACTION_LINE: &[u8] = b"{\"create\":{}}\n";

pub struct BulkHttpSink {
    core: WorkerCore,
    chain: Chain,
    cfg: BulkHttpLoggerConfig,
    client: reqwest::Client,
    bulk_url: String,
}

impl BulkHttpSink {
    pub fn new(
        name: &str,
        cfg: &BulkHttpLoggerConfig,
        entry: &LoggerEntry,
        _config: &Config,
        queue_size: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout.max(1)))
            .timeout(BULK_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::HttpClient(e.to_string()))?;

        let mut server = cfg.server.clone();
        if !server.ends_with('/') {
            server.push('/');
        }
        let bulk_url = format!("{server}{}/_bulk", cfg.index);

        Ok(Self {
            core: WorkerCore::new(name, queue_size),
            chain: Chain::build(&entry.transforms)?,
            cfg: cfg.clone(),
            client,
            bulk_url,
        })
    }

    fn apply_reload(&mut self, config: &Config) {
        let name = self.core.name().to_string();
        let Some(entry) = config.loggers.get(&name) else {
            tracing::warn!(worker = %name, "reload has no entry for this worker, keeping config");
            return;
        };
        let LoggerKind::BulkHttp(cfg) = &entry.kind else {
            tracing::warn!(worker = %name, "reload changed worker type, keeping config");
            return;
        };
        if let Err(e) = self.chain.reload(&entry.transforms) {
            tracing::warn!(worker = %name, error = %e, "transform reload rejected, keeping chain");
        }
        if cfg.server != self.cfg.server || cfg.index != self.cfg.index {
            tracing::warn!(
                worker = %name,
                "server and index changes require a restart, keeping current endpoint"
            );
        }
        tracing::info!(worker = %name, "config reloaded");
    }
}

impl Worker for BulkHttpSink {
    fn worker_type(&self) -> &'static str {
        "bulk-http"
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
            let name = self.core.name().to_string();
            tracing::info!(
                worker = %name,
                url = %self.bulk_url,
                bulk_size = self.cfg.bulk_size,
                "bulk http logger starting"
            );

            let (output_tx, output_rx) = mpsc::channel::<DnsMessage>(OUTPUT_QUEUE);
            let (bulk_tx, bulk_rx) = mpsc::channel::<Vec<u8>>(self.cfg.bulk_channel_size.max(1));

            let buffering = tokio::spawn(buffer_loop(BufferLoop {
                name: name.clone(),
                bulk_size: self.cfg.bulk_size,
                flush_interval: self.cfg.flush_interval.max(1),
                output_rx,
                bulk_tx,
                stop: self.core.logger_stop_token(),
                errors: RateLimitedLogger::default(),
            }));

            let posting = tokio::spawn(http_loop(HttpLoop {
                name: name.clone(),
                cfg: self.cfg.clone(),
                client: self.client.clone(),
                bulk_url: self.bulk_url.clone(),
                bulk_rx,
                metrics: self.core.metrics_arc(),
                errors: RateLimitedLogger::default(),
            }));

            let stop_token = self.core.stop_token();
            loop {
                match channels.next().await {
                    CollectEvent::Stop => break,
                    CollectEvent::InputClosed => {
                        tracing::info!(worker = %name, "input channel closed");
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

                        tokio::select! {
                            _ = stop_token.cancelled() => break,
                            result = output_tx.send(*dm) => {
                                if result.is_err() {
                                    tracing::warn!(worker = %name, "output channel closed");
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            self.chain.reset();
            self.core.stop_logger();
            drop(output_tx);
            let _ = buffering.await;
            let _ = posting.await;
            tracing::info!(worker = %name, "bulk http logger stopped");
        })
    }
}

struct BufferLoop {
    name: String,
    bulk_size: usize,
    flush_interval: u64,
    output_rx: mpsc::Receiver<DnsMessage>,
    bulk_tx: mpsc::Sender<Vec<u8>>,
    stop: tokio_util::sync::CancellationToken,
    errors: RateLimitedLogger,
}

/// Accumulate documents into bulk bodies and hand them to the HTTP loop
async fn buffer_loop(mut ctx: BufferLoop) {
    let mut body: Vec<u8> = Vec::with_capacity(ctx.bulk_size + 1024);
    let mut flush_ticker = interval(Duration::from_secs(ctx.flush_interval));
    flush_ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            message = ctx.output_rx.recv() => match message {
                None => break,
                Some(dm) => {
                    let line = match dm.to_flat_json() {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!(
                                worker = %ctx.name,
                                error = %e,
                                "flatten failed, message skipped"
                            );
                            continue;
                        }
                    };
                    body.extend_from_slice(ACTION_LINE);
                    body.extend_from_slice(line.as_bytes());
                    body.push(b'\n');

                    if body.len() >= ctx.bulk_size {
                        ship(&mut body, &ctx.bulk_tx, &ctx.errors);
                    }
                }
            },
            _ = flush_ticker.tick() => {
                if !body.is_empty() {
                    ship(&mut body, &ctx.bulk_tx, &ctx.errors);
                }
            }
        }
    }

    if !body.is_empty() {
        ship(&mut body, &ctx.bulk_tx, &ctx.errors);
    }
}

/// Move the accumulated body onto the bulk queue; drop it when full
fn ship(body: &mut Vec<u8>, bulk_tx: &mpsc::Sender<Vec<u8>>, errors: &RateLimitedLogger) {
    let bulk = std::mem::take(body);
    if let Err(e) = bulk_tx.try_send(bulk) {
        errors.error("bulk queue full, bulk dropped", &e);
    }
}

struct HttpLoop {
    name: String,
    cfg: BulkHttpLoggerConfig,
    client: reqwest::Client,
    bulk_url: String,
    bulk_rx: mpsc::Receiver<Vec<u8>>,
    metrics: Arc<WorkerMetrics>,
    errors: RateLimitedLogger,
}

/// Ship bulk bodies until the queue closes
async fn http_loop(mut ctx: HttpLoop) {
    while let Some(body) = ctx.bulk_rx.recv().await {
        let mut request = ctx
            .client
            .post(&ctx.bulk_url)
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        if ctx.cfg.basic_auth_enabled {
            request = request.basic_auth(
                &ctx.cfg.basic_auth_login,
                Some(&ctx.cfg.basic_auth_pwd),
            );
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                ctx.metrics.set_writer_ready(true);
            }
            Ok(response) => {
                ctx.metrics.set_writer_ready(false);
                ctx.errors.error(
                    "bulk rejected",
                    &format!("http status {}", response.status()),
                );
            }
            Err(e) => {
                ctx.metrics.set_writer_ready(false);
                ctx.errors.error("bulk post failed", &e);
            }
        }
    }
    tracing::debug!(worker = %ctx.name, "http loop drained");
}
