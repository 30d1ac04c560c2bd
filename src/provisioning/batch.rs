use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Composite, Named, Operation, Provisionable};
use crate::error::{ProvisionError, Result};

/// Runs many independent nodes a bounded number at a time. Each batch gets
/// every requested operation before the next batch starts.
pub struct BatchProvisioner {
    named: Named,
    children: Vec<Arc<dyn Provisionable>>,
    batch_size: usize,
}

impl BatchProvisioner {
    pub fn new(
        name: impl Into<String>,
        children: Vec<Arc<dyn Provisionable>>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ProvisionError::Config("batch size must be at least 1".into()));
        }
        Ok(Self {
            named: Named::new(name),
            children,
            batch_size,
        })
    }

    pub fn batch_count(&self) -> usize {
        self.children.len().div_ceil(self.batch_size)
    }

    pub async fn execute(&self, ops: &[Operation]) -> Result<()> {
        let total = self.batch_count();
        for (idx, batch) in self.children.chunks(self.batch_size).enumerate() {
            let composite =
                Composite::restricted_parallel(format!("{}[{idx}]", self.name()), batch.to_vec());
            info!(
                "[{}] batch {}/{total}: {} nodes",
                self.name(),
                idx + 1,
                batch.len()
            );
            for &op in ops {
                op.execute(&composite)
                    .await
                    .map_err(|e| e.in_node(composite.name(), op))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Provisionable for BatchProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, _op: Operation) -> bool {
        false
    }

    async fn provision(&self) -> Result<()> {
        self.execute(&[Operation::Provision]).await
    }

    async fn validate(&self) -> Result<()> {
        self.execute(&[Operation::Validate]).await
    }

    async fn cleanup(&self) -> Result<()> {
        self.execute(&[Operation::Cleanup]).await
    }

    async fn close(&self) -> Result<()> {
        self.execute(&[Operation::Close]).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provisioning::testing::{Journal, Probe};

    fn probes(journal: &Journal, n: usize) -> Vec<Arc<dyn Provisionable>> {
        (0..n)
            .map(|i| {
                Probe::new(&format!("t{i}"), true, journal)
                    .delay(Duration::from_millis(2))
                    .shared()
            })
            .collect()
    }

    #[test]
    fn rejects_empty_batches() {
        assert!(BatchProvisioner::new("b", Vec::new(), 0).is_err());
        let journal = Journal::default();
        let batch = BatchProvisioner::new("b", probes(&journal, 5), 2).unwrap();
        assert_eq!(batch.batch_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn batches_run_one_after_another() {
        let journal = Journal::default();
        let batch = BatchProvisioner::new("tenants", probes(&journal, 5), 2).unwrap();
        batch
            .execute(&[Operation::Provision, Operation::Validate])
            .await
            .unwrap();

        assert!(journal.peak_concurrency() <= 2);
        assert_eq!(journal.count_prefix("Provision:"), 5);
        assert_eq!(journal.count_prefix("Validate:"), 5);

        // the second batch starts only after the first has been validated
        let first_done = journal
            .position("Validate:t0")
            .max(journal.position("Validate:t1"));
        assert!(journal.position("Provision:t2") > first_done);
        assert!(journal.position("Provision:t4") > journal.position("Validate:t3"));
    }

    #[tokio::test]
    async fn failure_names_the_batch() {
        let journal = Journal::default();
        let mut children = probes(&journal, 3);
        children.push(
            Probe::new("bad", true, &journal)
                .fail_on(Operation::Validate)
                .shared(),
        );
        let batch = BatchProvisioner::new("tenants", children, 2).unwrap();
        let err = batch.execute(&[Operation::Validate]).await.unwrap_err();
        assert_eq!(err.node_path(), vec!["tenants[1]", "bad"]);
    }
}
