//! File sink - buffered log file with rotation
//!
//! Writes one serialized message per line. The current file lives at
//! the configured path; rotation renames it to the next numbered
//! sibling (`<path>.<n>`) and reopens a fresh file. Rotation triggers
//! on size (`max-size` megabytes) and on wall-clock cadence
//! (`rotation-interval` seconds); both can be active at once. Old
//! siblings beyond `max-files` are deleted, oldest first.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use dnsflow_config::{Config, FileLoggerConfig, LoggerEntry, LoggerKind};
use dnsflow_pipeline::{CollectEvent, Worker, WorkerCore};
use dnsflow_transform::{Chain, Verdict};
use tokio::task::JoinHandle;

use crate::format::Serializer;
use crate::{Result, SinkError};

/// Sentinel period for tickers whose trigger is disabled
const DISABLED_TICKER: Duration = Duration::from_secs(3600);

pub struct FileSink {
    core: WorkerCore,
    chain: Chain,
    serializer: Serializer,
    writer: RotatingWriter,
    rotation_interval: u64,
    flush_interval: u64,
}

impl FileSink {
    pub fn new(
        name: &str,
        cfg: &FileLoggerConfig,
        entry: &LoggerEntry,
        config: &Config,
        queue_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            core: WorkerCore::new(name, queue_size),
            chain: Chain::build(&entry.transforms)?,
            serializer: Serializer::new(cfg.mode, cfg.text_format.as_deref(), &config.global)?,
            writer: RotatingWriter::open(cfg)?,
            rotation_interval: cfg.rotation_interval,
            flush_interval: cfg.flush_interval,
        })
    }

    fn apply_reload(&mut self, config: &Config) {
        let name = self.core.name().to_string();
        let Some(entry) = config.loggers.get(&name) else {
            tracing::warn!(worker = %name, "reload has no entry for this worker, keeping config");
            return;
        };
        let LoggerKind::File(cfg) = &entry.kind else {
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
        self.writer.reconfigure(cfg);
        tracing::info!(worker = %name, "config reloaded");
    }
}

impl Worker for FileSink {
    fn worker_type(&self) -> &'static str {
        "file"
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
            tracing::info!(worker = %name, path = %self.writer.path.display(), "file logger starting");

            let rotation_enabled = self.rotation_interval > 0;
            let mut rotation_ticker = tokio::time::interval(if rotation_enabled {
                Duration::from_secs(self.rotation_interval)
            } else {
                DISABLED_TICKER
            });
            rotation_ticker.tick().await;

            let flush_enabled = self.flush_interval > 0;
            let mut flush_ticker = tokio::time::interval(if flush_enabled {
                Duration::from_secs(self.flush_interval)
            } else {
                DISABLED_TICKER
            });
            flush_ticker.tick().await;

            loop {
                tokio::select! {
                    event = channels.next() => match event {
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

                            let line = match self.serializer.render(&dm) {
                                Ok(line) => line,
                                Err(e) => {
                                    tracing::warn!(
                                        worker = %name,
                                        error = %e,
                                        "serialization failed, message skipped"
                                    );
                                    continue;
                                }
                            };
                            if let Err(e) = self.writer.write_line(&line) {
                                tracing::error!(worker = %name, error = %e, "file write failed");
                            } else if !flush_enabled {
                                if let Err(e) = self.writer.flush() {
                                    tracing::error!(worker = %name, error = %e, "file flush failed");
                                }
                            }
                        }
                    },
                    _ = rotation_ticker.tick(), if rotation_enabled => {
                        if self.writer.bytes_written > 0 {
                            if let Err(e) = self.writer.rotate() {
                                tracing::error!(worker = %name, error = %e, "rotation failed");
                            }
                        }
                    },
                    _ = flush_ticker.tick(), if flush_enabled => {
                        if let Err(e) = self.writer.flush() {
                            tracing::error!(worker = %name, error = %e, "file flush failed");
                        }
                    },
                }
            }

            self.chain.reset();
            if let Err(e) = self.writer.flush() {
                tracing::error!(worker = %name, error = %e, "final flush failed");
            }
            tracing::info!(worker = %name, "file logger stopped");
        })
    }
}

/// The current file plus its rotation bookkeeping
struct RotatingWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
    max_bytes: u64,
    max_files: usize,
    rotated: VecDeque<PathBuf>,
    next_index: u64,
}

impl RotatingWriter {
    fn open(cfg: &FileLoggerConfig) -> Result<Self> {
        if let Some(parent) = cfg.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SinkError::OpenFile {
                    path: cfg.file_path.display().to_string(),
                    source,
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.file_path)
            .map_err(|source| SinkError::OpenFile {
                path: cfg.file_path.display().to_string(),
                source,
            })?;
        let bytes_written = file
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(Self {
            next_index: next_sibling_index(&cfg.file_path),
            path: cfg.file_path.clone(),
            writer: BufWriter::new(file),
            bytes_written,
            max_bytes: cfg.max_size * 1024 * 1024,
            max_files: cfg.max_files,
            rotated: VecDeque::new(),
        })
    }

    /// Adopt reloaded size limits; the path itself is fixed for the
    /// worker's lifetime
    fn reconfigure(&mut self, cfg: &FileLoggerConfig) {
        self.max_bytes = cfg.max_size * 1024 * 1024;
        self.max_files = cfg.max_files;
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.bytes_written += line.len() as u64 + 1;

        if self.max_bytes > 0 && self.bytes_written >= self.max_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Rename the current file to the next numbered sibling and reopen
    fn rotate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;

        let sibling = sibling_path(&self.path, self.next_index);
        fs::rename(&self.path, &sibling)?;
        tracing::debug!(from = %self.path.display(), to = %sibling.display(), "file rotated");

        self.next_index += 1;
        self.rotated.push_back(sibling);
        while self.rotated.len() > self.max_files {
            if let Some(oldest) = self.rotated.pop_front() {
                if let Err(e) = fs::remove_file(&oldest) {
                    tracing::warn!(path = %oldest.display(), error = %e, "failed to prune rotated file");
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.bytes_written = 0;
        Ok(())
    }
}

fn sibling_path(path: &PathBuf, index: u64) -> PathBuf {
    PathBuf::from(format!("{}.{index}", path.display()))
}

/// First free sibling index, so restarts never overwrite earlier logs
fn next_sibling_index(path: &PathBuf) -> u64 {
    let Some(parent) = path.parent() else {
        return 1;
    };
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return 1;
    };
    let prefix = format!("{file_name}.");

    let mut max_seen = 0;
    if let Ok(entries) = fs::read_dir(if parent.as_os_str().is_empty() {
        std::path::Path::new(".")
    } else {
        parent
    }) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(suffix) = name.strip_prefix(&prefix) {
                    if let Ok(index) = suffix.parse::<u64>() {
                        max_seen = max_seen.max(index);
                    }
                }
            }
        }
    }
    max_seen + 1
}
