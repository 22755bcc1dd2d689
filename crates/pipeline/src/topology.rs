//! Topology - build and run the worker graph
//!
//! Workers are registered by the wiring layer, routes are resolved from
//! configuration by name, and the declared graph is checked before
//! anything starts: unknown targets, routes into collectors, duplicate
//! names and cycles are all startup errors.
//!
//! Start order is loggers first so every queue has its consumer before
//! producers exist; shutdown stops collectors first and lets loggers
//! drain, bounded by [`crate::SHUTDOWN_TIMEOUT`] per worker.

use std::collections::HashMap;
use std::sync::Arc;

use dnsflow_config::Config;
use dnsflow_protocol::DnsMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::route::RouteHandle;
use crate::worker::{Worker, WorkerHandle};
use crate::{PipelineError, Result, SHUTDOWN_TIMEOUT};

/// A declared but not yet running worker graph
pub struct Topology {
    config: Arc<Config>,
    workers: Vec<Box<dyn Worker>>,
}

impl Topology {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            workers: Vec::new(),
        }
    }

    /// Register a worker built from one config entry
    pub fn register(&mut self, worker: Box<dyn Worker>) -> Result<()> {
        if self.workers.iter().any(|w| w.name() == worker.name()) {
            return Err(PipelineError::DuplicateWorker(worker.name().to_string()));
        }
        self.workers.push(worker);
        Ok(())
    }

    /// Route lists declared in config for one worker
    fn declared_routes(&self, name: &str) -> (Vec<String>, Vec<String>) {
        if let Some(entry) = self.config.collectors.get(name) {
            (entry.forward.clone(), entry.dropped.clone())
        } else if let Some(entry) = self.config.loggers.get(name) {
            (entry.forward.clone(), entry.dropped.clone())
        } else {
            (Vec::new(), Vec::new())
        }
    }

    /// Resolve named routes and validate the graph
    pub fn wire(&mut self) -> Result<()> {
        // every config entry must have a registered worker
        for name in self.config.collectors.keys().chain(self.config.loggers.keys()) {
            if !self.workers.iter().any(|w| w.name() == name) {
                return Err(PipelineError::MissingWorker(name.clone()));
            }
        }

        let inputs: HashMap<String, mpsc::Sender<DnsMessage>> = self
            .workers
            .iter()
            .map(|w| (w.name().to_string(), w.core().input()))
            .collect();
        let collectors: HashMap<String, bool> = self
            .workers
            .iter()
            .map(|w| (w.name().to_string(), w.is_collector()))
            .collect();

        // validate edges and detect cycles before any handle is attached
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for worker in &self.workers {
            let name = worker.name().to_string();
            let (forward, dropped) = self.declared_routes(&name);
            for target in forward.iter().chain(dropped.iter()) {
                if !inputs.contains_key(target) {
                    return Err(PipelineError::UnknownRoute {
                        worker: name.clone(),
                        target: target.clone(),
                    });
                }
                if collectors[target] {
                    return Err(PipelineError::RouteToCollector {
                        worker: name.clone(),
                        target: target.clone(),
                    });
                }
                edges.entry(name.clone()).or_default().push(target.clone());
            }
        }
        reject_cycles(&edges)?;

        for worker in &mut self.workers {
            let name = worker.name().to_string();
            let (forward, dropped) = if let Some(entry) = self.config.collectors.get(&name) {
                (entry.forward.clone(), entry.dropped.clone())
            } else if let Some(entry) = self.config.loggers.get(&name) {
                (entry.forward.clone(), entry.dropped.clone())
            } else {
                (Vec::new(), Vec::new())
            };

            for target in forward {
                let route = RouteHandle::new(target.as_str(), inputs[&target].clone());
                worker.core_mut().add_default_route(route);
            }
            for target in dropped {
                let route = RouteHandle::new(target.as_str(), inputs[&target].clone());
                worker.core_mut().add_dropped_route(route);
            }

            tracing::debug!(
                worker = %name,
                default_routes = ?worker.core().default_routes().names(),
                dropped_routes = ?worker.core().dropped_routes().names(),
                "worker wired"
            );
        }

        Ok(())
    }

    /// Spawn every worker and hand back the running graph
    ///
    /// Loggers start before collectors so no edge exists before its
    /// consumer.
    pub fn start(mut self) -> RunningTopology {
        self.workers.sort_by_key(|w| w.is_collector());

        let mut running = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            let name = worker.name().to_string();
            let handle = worker.core().handle(worker.worker_type());
            let is_collector = worker.is_collector();
            tracing::info!(worker = %name, kind = worker.worker_type(), "worker starting");
            let join = worker.spawn();
            running.push(RunningWorker {
                name,
                is_collector,
                handle,
                join,
            });
        }

        RunningTopology { workers: running }
    }
}

struct RunningWorker {
    name: String,
    is_collector: bool,
    handle: WorkerHandle,
    join: JoinHandle<()>,
}

/// A started worker graph
pub struct RunningTopology {
    workers: Vec<RunningWorker>,
}

impl RunningTopology {
    /// Control handles for every worker, collectors included
    pub fn worker_handles(&self) -> Vec<WorkerHandle> {
        self.workers.iter().map(|w| w.handle.clone()).collect()
    }

    /// Deliver a new configuration to every worker
    ///
    /// Workers install it between messages; one that cannot accept the
    /// reload keeps its previous config and is reported.
    pub fn reload(&self, config: Arc<Config>) {
        for worker in &self.workers {
            if worker.handle.reload(Arc::clone(&config)) {
                tracing::info!(worker = %worker.name, "reload delivered");
            } else {
                tracing::warn!(worker = %worker.name, "reload rejected, keeping previous config");
            }
        }
    }

    /// Stop everything: collectors first, then loggers
    ///
    /// Each worker gets [`SHUTDOWN_TIMEOUT`] to drain; one that misses
    /// the deadline is aborted so shutdown itself stays bounded.
    pub async fn shutdown(self) {
        let (collectors, loggers): (Vec<_>, Vec<_>) =
            self.workers.into_iter().partition(|w| w.is_collector);

        for phase in [collectors, loggers] {
            for worker in &phase {
                worker.handle.stop();
            }
            for mut worker in phase {
                match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut worker.join).await {
                    Ok(_) => tracing::info!(worker = %worker.name, "worker stopped"),
                    Err(_) => {
                        tracing::warn!(worker = %worker.name, "worker missed shutdown deadline");
                        worker.join.abort();
                    }
                }
            }
        }
    }
}

/// Depth-first cycle check over the declared edges
fn reject_cycles(edges: &HashMap<String, Vec<String>>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: &str,
        edges: &HashMap<String, Vec<String>>,
        marks: &mut HashMap<String, Mark>,
    ) -> Result<()> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(PipelineError::CycleDetected(node.to_string()));
            }
            None => {}
        }
        marks.insert(node.to_string(), Mark::Visiting);
        if let Some(targets) = edges.get(node) {
            for target in targets {
                visit(target, edges, marks)?;
            }
        }
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for node in edges.keys() {
        visit(node, edges, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "topology_test.rs"]
mod topology_test;
