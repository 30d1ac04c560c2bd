//! In-memory nodes for exercising composition without a database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Named, Operation, Parallelizable, Provisionable};
use crate::error::{ProvisionError, Result};

/// Shared record of which node ran which operation, in completion order.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} never ran"))
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }
}

pub struct Probe {
    named: Named,
    parallel: Parallelizable,
    journal: Journal,
    delay: Duration,
    fail_on: Option<Operation>,
    /// Entries that must already be in the journal when this node provisions.
    requires: Vec<String>,
}

impl Probe {
    pub fn new(name: &str, parallel: bool, journal: &Journal) -> Self {
        Self {
            named: Named::new(name),
            parallel: if parallel {
                Parallelizable::All
            } else {
                Parallelizable::None
            },
            journal: journal.clone(),
            delay: Duration::ZERO,
            fail_on: None,
            requires: Vec::new(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_on(mut self, op: Operation) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn requires(mut self, entries: &[&str]) -> Self {
        self.requires = entries.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn shared(self) -> Arc<dyn Provisionable> {
        Arc::new(self)
    }

    async fn run(&self, op: Operation) -> Result<()> {
        let now = self.journal.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.journal.running.fetch_sub(1, Ordering::SeqCst);

        if op == Operation::Provision {
            let done = self.journal.entries();
            if let Some(missing) = self.requires.iter().find(|r| !done.contains(r)) {
                return Err(ProvisionError::Config(format!("{missing} has not run yet")));
            }
        }
        if self.fail_on == Some(op) {
            return Err(ProvisionError::DatabaseNotFound(self.named.name().to_string()));
        }
        self.journal.push(format!("{op}:{}", self.named.name()));
        Ok(())
    }
}

#[async_trait]
impl Provisionable for Probe {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        self.parallel.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        self.run(Operation::Provision).await
    }

    async fn validate(&self) -> Result<()> {
        self.run(Operation::Validate).await
    }

    async fn cleanup(&self) -> Result<()> {
        self.run(Operation::Cleanup).await
    }

    async fn close(&self) -> Result<()> {
        self.run(Operation::Close).await
    }
}
