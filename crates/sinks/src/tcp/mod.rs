//! TCP sink - buffered publisher with reconnection
//!
//! Three cooperating loops:
//!
//! - the **collect loop** drives the worker contract and enqueues
//!   accepted messages onto the internal output queue;
//! - the **logging loop** owns the buffer, flushing when `buffer-size`
//!   messages accumulate or `flush-interval` elapses. Messages arriving
//!   while the writer is down are discarded, and a time-triggered flush
//!   with the writer down discards the buffer - memory stays bounded
//!   through an outage at the price of durability;
//! - the **connection loop** owns the TCP (and TLS) client: connect
//!   with `connect-timeout`, sleep `retry-interval` on failure, signal
//!   `ready` on success, then wait for `reconnect` before dialing
//!   again. It observes its own stop signal and returns immediately,
//!   even mid-sleep.
//!
//! Each publish gets [`crate::PUBLISH_TIMEOUT`]; a failed or timed-out
//! write marks the writer unready, wakes the connection loop and
//! abandons the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use dnsflow_config::{Config, LoggerEntry, LoggerKind, TcpLoggerConfig};
use dnsflow_metrics::WorkerMetrics;
use dnsflow_pipeline::{CollectEvent, Worker, WorkerCore};
use dnsflow_protocol::DnsMessage;
use dnsflow_transform::{Chain, Verdict};
use parking_lot::RwLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use crate::format::Serializer;
use crate::util::RateLimitedLogger;
use crate::{tls, Result, PUBLISH_TIMEOUT};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type Connection = Arc<Mutex<Option<BoxedWriter>>>;

pub struct TcpSink {
    core: WorkerCore,
    chain: Chain,
    /// Shared with the logging loop; reload swaps it in place
    serializer: Arc<RwLock<Serializer>>,
    cfg: TcpLoggerConfig,
    tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl TcpSink {
    pub fn new(
        name: &str,
        cfg: &TcpLoggerConfig,
        entry: &LoggerEntry,
        config: &Config,
        queue_size: usize,
    ) -> Result<Self> {
        let tls_config = if cfg.tls.enable {
            Some(Arc::new(tls::client_config(&cfg.tls)?))
        } else {
            None
        };
        Ok(Self {
            core: WorkerCore::new(name, queue_size),
            chain: Chain::build(&entry.transforms)?,
            serializer: Arc::new(RwLock::new(Serializer::new(
                cfg.mode,
                cfg.text_format.as_deref(),
                &config.global,
            )?)),
            cfg: cfg.clone(),
            tls_config,
        })
    }

    fn apply_reload(&mut self, config: &Config) {
        let name = self.core.name().to_string();
        let Some(entry) = config.loggers.get(&name) else {
            tracing::warn!(worker = %name, "reload has no entry for this worker, keeping config");
            return;
        };
        let LoggerKind::Tcp(cfg) = &entry.kind else {
            tracing::warn!(worker = %name, "reload changed worker type, keeping config");
            return;
        };
        match Serializer::new(cfg.mode, cfg.text_format.as_deref(), &config.global) {
            Ok(serializer) => *self.serializer.write() = serializer,
            Err(e) => {
                tracing::warn!(worker = %name, error = %e, "reload rejected, keeping config");
                return;
            }
        }
        if let Err(e) = self.chain.reload(&entry.transforms) {
            tracing::warn!(worker = %name, error = %e, "transform reload rejected, keeping chain");
        }
        if cfg.remote_address != self.cfg.remote_address || cfg.remote_port != self.cfg.remote_port
        {
            tracing::warn!(
                worker = %name,
                "remote endpoint changes require a restart, keeping current endpoint"
            );
        }
        tracing::info!(worker = %name, "config reloaded");
    }
}

impl Worker for TcpSink {
    fn worker_type(&self) -> &'static str {
        "tcp"
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
                remote = %self.cfg.remote_address,
                port = self.cfg.remote_port,
                tls = self.cfg.tls.enable,
                "tcp logger starting"
            );

            let (output_tx, output_rx) = mpsc::channel(self.cfg.buffer_size.max(1));
            let (ready_tx, ready_rx) = mpsc::channel(1);
            let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
            let connection: Connection = Arc::new(Mutex::new(None));
            let stop_reconnect = CancellationToken::new();

            let logging = tokio::spawn(logging_loop(LoggingLoop {
                name: name.clone(),
                cfg: self.cfg.clone(),
                serializer: Arc::clone(&self.serializer),
                output_rx,
                ready_rx,
                reconnect_tx: reconnect_tx.clone(),
                connection: Arc::clone(&connection),
                metrics: self.core.metrics_arc(),
                stop: self.core.logger_stop_token(),
                errors: RateLimitedLogger::default(),
            }));

            let connector = tokio::spawn(connection_loop(ConnectionLoop {
                name: name.clone(),
                cfg: self.cfg.clone(),
                tls_config: self.tls_config.clone(),
                ready_tx,
                reconnect_rx,
                connection: Arc::clone(&connection),
                metrics: self.core.metrics_arc(),
                stop: stop_reconnect.clone(),
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
            stop_reconnect.cancel();
            drop(output_tx);
            let _ = logging.await;
            let _ = connector.await;
            tracing::info!(worker = %name, "tcp logger stopped");
        })
    }
}

struct LoggingLoop {
    name: String,
    cfg: TcpLoggerConfig,
    serializer: Arc<RwLock<Serializer>>,
    output_rx: mpsc::Receiver<DnsMessage>,
    ready_rx: mpsc::Receiver<()>,
    reconnect_tx: mpsc::Sender<()>,
    connection: Connection,
    metrics: Arc<WorkerMetrics>,
    stop: CancellationToken,
    errors: RateLimitedLogger,
}

async fn logging_loop(mut ctx: LoggingLoop) {
    let mut buffer: Vec<DnsMessage> = Vec::with_capacity(ctx.cfg.buffer_size);
    let mut flush_ticker = interval(Duration::from_secs(ctx.cfg.flush_interval));
    flush_ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            Some(()) = ctx.ready_rx.recv() => {
                tracing::info!(worker = %ctx.name, "tcp endpoint connected");
            }
            message = ctx.output_rx.recv() => match message {
                None => break,
                Some(dm) => {
                    // a down writer sheds load instead of buffering it
                    if !ctx.metrics.is_writer_ready() {
                        continue;
                    }
                    buffer.push(dm);
                    if buffer.len() >= ctx.cfg.buffer_size {
                        flush_buffer(&mut buffer, &mut ctx).await;
                    }
                }
            },
            _ = flush_ticker.tick() => {
                if !ctx.metrics.is_writer_ready() {
                    // deliberate durability tradeoff: drop, don't grow
                    buffer.clear();
                }
                if !buffer.is_empty() {
                    flush_buffer(&mut buffer, &mut ctx).await;
                }
            }
        }
    }

    if !buffer.is_empty() && ctx.metrics.is_writer_ready() {
        flush_buffer(&mut buffer, &mut ctx).await;
    }
    ctx.connection.lock().await.take();
}

/// Publish the buffer, message by message
///
/// A failed or timed-out write abandons the remaining messages, marks
/// the writer unready and wakes the connection loop.
async fn flush_buffer(buffer: &mut Vec<DnsMessage>, ctx: &mut LoggingLoop) {
    let mut conn = ctx.connection.lock().await;
    let Some(writer) = conn.as_mut() else {
        buffer.clear();
        return;
    };

    let mut failed = false;
    for dm in buffer.drain(..) {
        let mut line = match ctx.serializer.read().render(&dm) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(worker = %ctx.name, error = %e, "serialization failed, message skipped");
                continue;
            }
        };
        line.push('\n');

        match timeout(PUBLISH_TIMEOUT, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                ctx.errors.error("publish failed", &e);
                failed = true;
                break;
            }
            Err(_) => {
                ctx.errors.error("publish timed out", &"deadline exceeded");
                failed = true;
                break;
            }
        }
    }
    buffer.clear();

    if failed {
        ctx.metrics.set_writer_ready(false);
        *conn = None;
        let _ = ctx.reconnect_tx.try_send(());
    } else if let Some(writer) = conn.as_mut() {
        if let Ok(Err(e)) = timeout(PUBLISH_TIMEOUT, writer.flush()).await {
            ctx.errors.error("flush failed", &e);
            ctx.metrics.set_writer_ready(false);
            *conn = None;
            let _ = ctx.reconnect_tx.try_send(());
        }
    }
}

struct ConnectionLoop {
    name: String,
    cfg: TcpLoggerConfig,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    ready_tx: mpsc::Sender<()>,
    reconnect_rx: mpsc::Receiver<()>,
    connection: Connection,
    metrics: Arc<WorkerMetrics>,
    stop: CancellationToken,
}

async fn connection_loop(mut ctx: ConnectionLoop) {
    let retry = Duration::from_secs(ctx.cfg.retry_interval.max(1));
    loop {
        if ctx.stop.is_cancelled() {
            return;
        }

        // tear down whatever is left from the previous attempt
        ctx.connection.lock().await.take();

        match establish(&ctx.cfg, ctx.tls_config.as_ref()).await {
            Ok(writer) => {
                *ctx.connection.lock().await = Some(writer);
                ctx.metrics.set_writer_ready(true);
                let _ = ctx.ready_tx.try_send(());
                tracing::debug!(
                    worker = %ctx.name,
                    remote = %ctx.cfg.remote_address,
                    "connected"
                );

                tokio::select! {
                    _ = ctx.stop.cancelled() => return,
                    _ = ctx.reconnect_rx.recv() => {
                        tracing::info!(worker = %ctx.name, "reconnecting to tcp endpoint");
                    }
                }
            }
            Err(e) => {
                tracing::error!(worker = %ctx.name, error = %e, "connection failed");
                tracing::info!(
                    worker = %ctx.name,
                    retry_secs = retry.as_secs(),
                    "retrying connection"
                );
                tokio::select! {
                    _ = ctx.stop.cancelled() => return,
                    _ = tokio::time::sleep(retry) => {}
                }
            }
        }
    }
}

/// One connection attempt, bounded by `connect-timeout`
async fn establish(
    cfg: &TcpLoggerConfig,
    tls_config: Option<&Arc<rustls::ClientConfig>>,
) -> std::result::Result<BoxedWriter, String> {
    let address = format!("{}:{}", cfg.remote_address, cfg.remote_port);
    let connect_timeout = Duration::from_secs(cfg.connect_timeout.max(1));

    let stream = match timeout(connect_timeout, TcpStream::connect(&address)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(format!("connect to {address}: {e}")),
        Err(_) => return Err(format!("connect to {address}: timed out")),
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }
    let keepalive = socket2::TcpKeepalive::new().with_time(Duration::from_secs(30));
    if let Err(e) = socket2::SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "failed to set TCP keep-alive");
    }

    match tls_config {
        None => Ok(Box::new(stream)),
        Some(config) => {
            let server_name =
                tls::server_name(&cfg.remote_address).map_err(|e| e.to_string())?;
            let connector = TlsConnector::from(Arc::clone(config));
            match timeout(connect_timeout, connector.connect(server_name, stream)).await {
                Ok(Ok(tls_stream)) => Ok(Box::new(tls_stream)),
                Ok(Err(e)) => Err(format!("tls handshake with {address}: {e}")),
                Err(_) => Err(format!("tls handshake with {address}: timed out")),
            }
        }
    }
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
