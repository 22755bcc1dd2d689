//! Processor chain - sequential message transformation
//!
//! The chain applies processors in the fixed pipeline order (filtering
//! first, relabeling last), short-circuiting on the first `Drop`
//! verdict.
//!
//! # Reload
//!
//! The processor list lives behind an `Arc` swapped under a short
//! `parking_lot` lock. `process` clones the `Arc` once per message, so
//! a concurrent reload never changes the set of processors applied to
//! an in-flight message.

use std::sync::Arc;

use dnsflow_config::TransformsConfig;
use dnsflow_protocol::DnsMessage;
use parking_lot::RwLock;

use crate::{
    ATagsProcessor, ExtractProcessor, FilteringProcessor, MachineLearningProcessor, Processor,
    PublicSuffixProcessor, ReducerProcessor, RelabelingProcessor, Result, SuspiciousProcessor,
    Verdict,
};

/// Ordered, reloadable processor chain
pub struct Chain {
    processors: RwLock<Arc<Vec<Box<dyn Processor>>>>,
}

impl Chain {
    /// Build a chain from configuration
    ///
    /// Only enabled processors are instantiated. An empty chain is a
    /// no-op that always returns `Keep`.
    pub fn build(config: &TransformsConfig) -> Result<Self> {
        let processors = Self::instantiate(config)?;
        Ok(Self {
            processors: RwLock::new(Arc::new(processors)),
        })
    }

    /// Create an empty chain (no-op)
    pub fn empty() -> Self {
        Self {
            processors: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn instantiate(config: &TransformsConfig) -> Result<Vec<Box<dyn Processor>>> {
        let mut processors: Vec<Box<dyn Processor>> = Vec::new();
        if config.filtering.enable {
            processors.push(Box::new(FilteringProcessor::new(&config.filtering)));
        }
        if config.extract.enable {
            processors.push(Box::new(ExtractProcessor::new()));
        }
        if config.public_suffix.enable {
            processors.push(Box::new(PublicSuffixProcessor::new(&config.public_suffix)));
        }
        if config.suspicious.enable {
            processors.push(Box::new(SuspiciousProcessor::new(&config.suspicious)));
        }
        if config.reducer.enable {
            processors.push(Box::new(ReducerProcessor::new(&config.reducer)));
        }
        if config.machine_learning.enable {
            processors.push(Box::new(MachineLearningProcessor::new()));
        }
        if config.atags.enable {
            processors.push(Box::new(ATagsProcessor::new(&config.atags)));
        }
        if config.relabeling.enable {
            processors.push(Box::new(RelabelingProcessor::new(&config.relabeling)?));
        }
        Ok(processors)
    }

    /// Number of active processors
    pub fn len(&self) -> usize {
        self.processors.read().len()
    }

    /// Whether the chain has no active processors
    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }

    /// Names of the active processors, in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.processors.read().iter().map(|p| p.name()).collect()
    }

    /// Run the chain over one message
    ///
    /// The first `Drop` verdict stops the chain; later processors never
    /// observe the message.
    pub fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let processors = Arc::clone(&self.processors.read());
        for processor in processors.iter() {
            if processor.process(dm) == Verdict::Drop {
                return Verdict::Drop;
            }
        }
        Verdict::Keep
    }

    /// Replace the processor list from a new configuration
    ///
    /// Safe while the chain is live: in-flight messages finish under
    /// the list they started with. On error the previous list stays
    /// installed.
    pub fn reload(&self, config: &TransformsConfig) -> Result<()> {
        let processors = Self::instantiate(config)?;
        *self.processors.write() = Arc::new(processors);
        Ok(())
    }

    /// Clear accumulated processor state
    pub fn reset(&self) {
        for processor in self.processors.read().iter() {
            processor.reset();
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod chain_test;
