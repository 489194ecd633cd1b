//! Whole-run driver
//!
//! Reads the context list, processes each context in document order and
//! persists the resulting list in one write.

use std::sync::Arc;
use tracing::{info, warn};

use crate::abstractions::ContextStore;
use crate::context::ContextList;
use crate::error::{Error, ErrorReport, Result};
use crate::processor::{ContextProcessor, ProcessOutcome};

/// What to do when the context document cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReadFailurePolicy {
    /// End the run without writing anything
    #[default]
    Abort,
    /// Continue with an empty list, which overwrites the stored document
    Proceed,
}

/// Outcome of one context, by position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRun {
    pub index: usize,
    pub outcome: ProcessOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub runs: Vec<ContextRun>,
    /// Number of contexts in the written document
    pub persisted: usize,
}

impl RunReport {
    pub fn sent(&self) -> usize {
        self.runs.iter().filter(|r| r.outcome.was_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.outcome == ProcessOutcome::AlreadyDoneToday)
            .count()
    }
}

pub struct Orchestrator {
    store: Arc<dyn ContextStore>,
    processor: ContextProcessor,
    read_failure_policy: ReadFailurePolicy,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ContextStore>, processor: ContextProcessor) -> Self {
        Self {
            store,
            processor,
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    /// Run every context once and persist the result.
    ///
    /// Per-context failures are contained in the report. Only a failed read
    /// (under [`ReadFailurePolicy::Abort`]) or a failed write is an error.
    pub async fn run(&self) -> Result<RunReport> {
        let contexts = self.load().await?;
        info!(count = contexts.len(), "Loaded contexts");

        let mut next: ContextList = Vec::with_capacity(contexts.len());
        let mut runs = Vec::with_capacity(contexts.len());

        for (index, context) in contexts.iter().enumerate() {
            info!(index = index + 1, "Processing context {} of {}", index + 1, contexts.len());

            let (updated, outcome) = self.processor.process(context).await;
            next.push(updated);
            runs.push(ContextRun { index, outcome });
        }

        self.store.write(&next).await.map_err(Error::StoreWrite)?;

        let report = RunReport {
            runs,
            persisted: next.len(),
        };
        info!(
            severity = "NOTICE",
            contexts = report.persisted,
            sent = report.sent(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }

    async fn load(&self) -> Result<ContextList> {
        match self.store.read().await {
            Ok(contexts) => Ok(contexts),
            Err(e) => match self.read_failure_policy {
                ReadFailurePolicy::Abort => Err(Error::StoreRead(e)),
                ReadFailurePolicy::Proceed => {
                    let report = ErrorReport::new("StoreReadError", &e);
                    warn!(
                        kind = %report.kind,
                        "Context document unreadable, continuing with an empty list: {}",
                        report.message
                    );
                    Ok(Vec::new())
                }
            },
        }
    }
}
