//! Pipeline error types

use thiserror::Error;

/// Errors from topology construction
///
/// These are all startup errors - once a topology is running, failures
/// stay inside their worker and are counted, not propagated.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two workers share a name
    #[error("duplicate worker name `{0}`")]
    DuplicateWorker(String),

    /// A route names a worker that does not exist
    #[error("worker `{worker}` routes to unknown worker `{target}`")]
    UnknownRoute { worker: String, target: String },

    /// A route targets a collector, whose input belongs to the outside
    #[error("worker `{worker}` routes to collector `{target}`")]
    RouteToCollector { worker: String, target: String },

    /// The declared graph contains a cycle
    #[error("topology cycle detected through `{0}`")]
    CycleDetected(String),

    /// A worker was declared in config but never registered
    #[error("no worker registered for `{0}`")]
    MissingWorker(String),
}
