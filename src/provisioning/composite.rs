use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{Named, Operation, Provisionable};
use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Children run one after another in list order.
    Sequential,
    /// Consecutive parallelizable children run concurrently; every
    /// non-parallelizable child waits for all earlier children to finish.
    RestrictedParallel,
}

/// An ordered list of nodes run as one.
///
/// A child's error stops the composite and is returned wrapped with the
/// child's name. Under [`Strategy::RestrictedParallel`], the first failing
/// concurrent child cancels the siblings still running alongside it.
pub struct Composite {
    named: Named,
    strategy: Strategy,
    parallel_validate: bool,
    children: Vec<Arc<dyn Provisionable>>,
}

impl Composite {
    pub fn new(
        name: impl Into<String>,
        strategy: Strategy,
        children: Vec<Arc<dyn Provisionable>>,
    ) -> Self {
        Self {
            named: Named::new(name),
            strategy,
            parallel_validate: true,
            children,
        }
    }

    pub fn sequential(name: impl Into<String>, children: Vec<Arc<dyn Provisionable>>) -> Self {
        Self::new(name, Strategy::Sequential, children)
    }

    pub fn restricted_parallel(
        name: impl Into<String>,
        children: Vec<Arc<dyn Provisionable>>,
    ) -> Self {
        Self::new(name, Strategy::RestrictedParallel, children)
    }

    /// When set (the default), `validate` runs on every child at once
    /// whatever the strategy.
    pub fn with_parallel_validate(mut self, parallel_validate: bool) -> Self {
        self.parallel_validate = parallel_validate;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn children(&self) -> &[Arc<dyn Provisionable>] {
        &self.children
    }

    async fn run(&self, op: Operation) -> Result<()> {
        debug!(
            "[{}] {op} on {} children ({:?})",
            self.name(),
            self.children.len(),
            self.strategy
        );
        if op == Operation::Validate && self.parallel_validate {
            return self.run_all_at_once(op).await;
        }
        match self.strategy {
            Strategy::Sequential => self.run_in_order(op).await,
            Strategy::RestrictedParallel => self.run_restricted(op).await,
        }
    }

    async fn run_in_order(&self, op: Operation) -> Result<()> {
        for child in &self.children {
            run_child(child.as_ref(), op).await?;
        }
        Ok(())
    }

    async fn run_all_at_once(&self, op: Operation) -> Result<()> {
        try_join_all(self.children.iter().map(|child| run_child(child.as_ref(), op))).await?;
        Ok(())
    }

    async fn run_restricted(&self, op: Operation) -> Result<()> {
        let mut running = JoinSet::new();
        for child in &self.children {
            if child.is_executable_in_parallel(op) {
                let child = Arc::clone(child);
                running.spawn(async move { run_child(child.as_ref(), op).await });
            } else {
                join_running(&mut running).await?;
                run_child(child.as_ref(), op).await?;
            }
        }
        join_running(&mut running).await
    }

    async fn close_all(&self) -> Result<()> {
        let mut first_error = None;
        for child in &self.children {
            if let Err(e) = run_child(child.as_ref(), Operation::Close).await {
                warn!("[{}] {e}", self.name());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_child(child: &dyn Provisionable, op: Operation) -> Result<()> {
    op.execute(child)
        .await
        .map_err(|e| e.in_node(child.name(), op))
}

/// Waits for every spawned child. On the first failure the rest are
/// aborted and that failure is returned.
async fn join_running(running: &mut JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = running.join_next().await {
        let outcome = joined.map_err(ProvisionError::from).and_then(|r| r);
        if let Err(e) = outcome {
            running.shutdown().await;
            return Err(e);
        }
    }
    Ok(())
}

#[async_trait]
impl Provisionable for Composite {
    fn name(&self) -> &str {
        self.named.name()
    }

    /// A composite may run beside its siblings only if all its children may.
    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        self.children.iter().all(|c| c.is_executable_in_parallel(op))
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
        self.close_all().await
    }
}
