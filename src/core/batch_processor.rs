//! Batch processing with user-group partitioning for async replay
//!
//! This module provides the `BatchProcessor` struct, which runs one batch of
//! wallet operations concurrently and still ends in the same state as running
//! the batch row by row.
//!
//! # Design
//!
//! A batch is planned as a sequence of steps:
//!
//! 1. Every run of consecutive registrations becomes a sequential step, at its
//!    place in file order. An operation naming a user therefore sees that user
//!    exactly when a row-by-row replay would.
//! 2. The rows between two registration runs form a segment. A segment is
//!    split into groups of connected users: a transfer joins its sender and
//!    recipient into one group. Each group runs in file order on a tokio
//!    blocking task and the groups of a segment run concurrently.
//!
//! No two groups of a segment share a user, so no operation can see a balance
//! another group is changing and the interleaving does not affect the result.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── WalletEngine<S>  (shared, cheap to clone into each task)
//! ```

use crate::core::engine::WalletEngine;
use crate::core::traits::WalletStore;
use crate::types::{OperationKind, WalletError, WalletOperation};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of executing a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The operation that was executed
    pub operation: WalletOperation,

    /// The result of executing it
    pub result: Result<(), WalletError>,
}

/// Execute one operation, logging a failure instead of propagating it
///
/// A failed operation leaves no trace in the store, so replay simply moves on.
pub fn execute_logged<S: WalletStore>(
    engine: &WalletEngine<S>,
    operation: &WalletOperation,
) -> Result<(), WalletError> {
    let result = engine.execute(operation);
    if let Err(e) = &result {
        warn!(
            op = %operation.kind(),
            user = operation.initiator(),
            error = %e,
            "operation failed"
        );
    }
    result
}

fn run_in_order<S: WalletStore>(
    engine: &WalletEngine<S>,
    operations: Vec<WalletOperation>,
) -> Vec<ProcessingResult> {
    operations
        .into_iter()
        .map(|operation| {
            let result = execute_logged(engine, &operation);
            ProcessingResult { operation, result }
        })
        .collect()
}

/// Collect the results of a finished task
///
/// A task that panicked returns nothing, so each operation it was given is
/// reported as failed with the join error.
fn collect_task(
    outcome: Result<Vec<ProcessingResult>, tokio::task::JoinError>,
    operations: Vec<WalletOperation>,
) -> Vec<ProcessingResult> {
    match outcome {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, operations = operations.len(), "replay task failed");
            let error = WalletError::from(e);
            operations
                .into_iter()
                .map(|operation| ProcessingResult {
                    operation,
                    result: Err(error.clone()),
                })
                .collect()
        }
    }
}

/// One step of a planned batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStep {
    /// Consecutive registrations, run in file order
    Registrations(Vec<WalletOperation>),

    /// Groups sharing no user, each in file order, run concurrently
    Groups(Vec<Vec<WalletOperation>>),
}

/// Disjoint sets of usernames
#[derive(Default)]
struct UserSets {
    index: HashMap<String, usize>,
    parent: Vec<usize>,
}

impl UserSets {
    fn id(&mut self, username: &str) -> usize {
        if let Some(&id) = self.index.get(username) {
            return id;
        }
        let id = self.parent.len();
        self.parent.push(id);
        self.index.insert(username.to_string(), id);
        id
    }

    fn root(&mut self, mut id: usize) -> usize {
        while self.parent[id] != id {
            self.parent[id] = self.parent[self.parent[id]];
            id = self.parent[id];
        }
        id
    }

    fn join(&mut self, a: &str, b: &str) {
        let a = self.id(a);
        let b = self.id(b);
        let (a, b) = (self.root(a), self.root(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }
}

/// Split operations into groups that share no user
///
/// Groups come out in order of their first operation and keep file order
/// inside. Each operation lands in exactly one group.
pub fn group_by_participants(operations: Vec<WalletOperation>) -> Vec<Vec<WalletOperation>> {
    let mut sets = UserSets::default();
    for operation in &operations {
        let participants = operation.participants();
        let first = participants[0];
        sets.id(first);
        for other in &participants[1..] {
            sets.join(first, other);
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<WalletOperation>> = Vec::new();
    for operation in operations {
        let id = sets.id(operation.initiator());
        let root = sets.root(id);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(operation);
    }

    groups
}

/// Batch processor with user-group partitioning
pub struct BatchProcessor<S: WalletStore> {
    engine: WalletEngine<S>,
}

impl<S: WalletStore> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<S: WalletStore + 'static> BatchProcessor<S> {
    pub fn new(engine: WalletEngine<S>) -> Self {
        Self { engine }
    }

    /// Plan a batch as registration runs and concurrent segments
    ///
    /// # Guarantees
    ///
    /// - Each operation appears in exactly one step
    /// - Steps follow file order; a registration never moves past another row
    /// - Within a segment, groups share no user
    pub fn plan_batch(&self, batch: Vec<WalletOperation>) -> Vec<BatchStep> {
        let mut steps = Vec::new();
        let mut registrations = Vec::new();
        let mut segment = Vec::new();

        for operation in batch {
            if operation.kind() == OperationKind::Register {
                if !segment.is_empty() {
                    steps.push(BatchStep::Groups(group_by_participants(std::mem::take(
                        &mut segment,
                    ))));
                }
                registrations.push(operation);
            } else {
                if !registrations.is_empty() {
                    steps.push(BatchStep::Registrations(std::mem::take(&mut registrations)));
                }
                segment.push(operation);
            }
        }

        if !registrations.is_empty() {
            steps.push(BatchStep::Registrations(registrations));
        }
        if !segment.is_empty() {
            steps.push(BatchStep::Groups(group_by_participants(segment)));
        }

        steps
    }

    /// Process a batch of operations
    ///
    /// Results come back step by step; within a step of groups, group by
    /// group.
    pub async fn process_batch(&self, batch: Vec<WalletOperation>) -> Vec<ProcessingResult> {
        let steps = self.plan_batch(batch);
        debug!(steps = steps.len(), "processing batch");

        let mut results = Vec::new();

        for step in steps {
            match step {
                BatchStep::Registrations(operations) => {
                    let engine = self.engine.clone();
                    let pending = operations.clone();
                    let task =
                        tokio::task::spawn_blocking(move || run_in_order(&engine, operations));
                    results.extend(collect_task(task.await, pending));
                }
                BatchStep::Groups(groups) => {
                    debug!(groups = groups.len(), "running segment");

                    let mut tasks = Vec::with_capacity(groups.len());
                    for operations in groups {
                        let engine = self.engine.clone();
                        let pending = operations.clone();
                        let task = tokio::task::spawn_blocking(move || {
                            run_in_order(&engine, operations)
                        });
                        tasks.push((task, pending));
                    }

                    for (task, pending) in tasks {
                        results.extend(collect_task(task.await, pending));
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::engine::WalletConfig;
    use crate::core::store::MemoryStore;
    use crate::types::Coins;
    use std::sync::Arc;

    fn processor() -> BatchProcessor<MemoryStore> {
        BatchProcessor::new(WalletEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Catalog::default()),
            WalletConfig::default(),
        ))
    }

    fn register(name: &str) -> WalletOperation {
        WalletOperation::Register { username: name.into() }
    }

    fn transfer(from: &str, to: &str, amount: Coins) -> WalletOperation {
        WalletOperation::Transfer { from: from.into(), to: to.into(), amount }
    }

    fn buy(name: &str, item: &str, quantity: i64) -> WalletOperation {
        WalletOperation::Purchase { username: name.into(), item: item.into(), quantity }
    }

    fn balance(processor: &BatchProcessor<MemoryStore>, name: &str) -> Coins {
        let engine = &processor.engine;
        engine.get_balance(engine.resolve(name).unwrap()).unwrap()
    }

    #[test]
    fn test_group_joins_transfer_sender_and_recipient() {
        let groups = group_by_participants(vec![
            transfer("alice", "bob", 1),
            buy("carol", "cup", 1),
            buy("bob", "pen", 1),
            transfer("dave", "carol", 2),
            buy("erin", "cup", 1),
        ]);

        assert_eq!(
            groups,
            vec![
                vec![transfer("alice", "bob", 1), buy("bob", "pen", 1)],
                vec![buy("carol", "cup", 1), transfer("dave", "carol", 2)],
                vec![buy("erin", "cup", 1)],
            ]
        );
    }

    #[test]
    fn test_group_follows_transfer_chains() {
        // a-b and c-d start apart and are joined later by b-c
        let groups = group_by_participants(vec![
            transfer("a", "b", 1),
            transfer("c", "d", 1),
            transfer("b", "c", 1),
            transfer("x", "y", 1),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[0],
            vec![transfer("a", "b", 1), transfer("c", "d", 1), transfer("b", "c", 1)]
        );
        assert_eq!(groups[1], vec![transfer("x", "y", 1)]);
    }

    #[test]
    fn test_plan_splits_at_registrations() {
        let batch = vec![
            register("alice"),
            register("bob"),
            transfer("alice", "bob", 1),
            register("carol"),
            transfer("bob", "carol", 2),
        ];

        let steps = processor().plan_batch(batch);

        assert_eq!(
            steps,
            vec![
                BatchStep::Registrations(vec![register("alice"), register("bob")]),
                BatchStep::Groups(vec![vec![transfer("alice", "bob", 1)]]),
                BatchStep::Registrations(vec![register("carol")]),
                BatchStep::Groups(vec![vec![transfer("bob", "carol", 2)]]),
            ]
        );
    }

    #[test]
    fn test_plan_no_duplicates() {
        let batch: Vec<_> = (0..20)
            .map(|i| transfer(&format!("user-{}", i % 4), &format!("user-{}", 4 + i % 3), i + 1))
            .collect();

        let steps = processor().plan_batch(batch);

        let total: usize = steps
            .iter()
            .map(|step| match step {
                BatchStep::Registrations(ops) => ops.len(),
                BatchStep::Groups(groups) => groups.iter().map(Vec::len).sum(),
            })
            .sum();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_collect_task_reports_every_operation_of_panicked_task() {
        let operations = vec![transfer("alice", "bob", 1), buy("bob", "pen", 2)];
        let outcome = tokio::task::spawn_blocking(|| -> Vec<ProcessingResult> {
            panic!("worker blew up")
        })
        .await;

        let results = collect_task(outcome, operations.clone());

        assert_eq!(results.len(), 2);
        for (result, operation) in results.iter().zip(&operations) {
            assert_eq!(&result.operation, operation);
            assert!(matches!(result.result, Err(WalletError::TaskFailed { .. })));
        }
    }

    #[tokio::test]
    async fn test_collect_task_passes_through_results() {
        let operation = register("alice");
        let returned = vec![ProcessingResult { operation: operation.clone(), result: Ok(()) }];
        let outcome = tokio::task::spawn_blocking(move || returned).await;

        let results = collect_task(outcome, vec![operation]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result, Ok(()));
    }

    #[tokio::test]
    async fn test_process_batch_empty() {
        assert!(processor().process_batch(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn test_process_batch_keeps_registration_in_file_order() {
        let processor = processor();

        // The transfer precedes bob's registration, so it cannot find bob
        let results = processor
            .process_batch(vec![register("alice"), transfer("alice", "bob", 10), register("bob")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].result, Err(WalletError::user_not_found("bob")));
        assert_eq!(balance(&processor, "alice"), 1000);
        assert_eq!(balance(&processor, "bob"), 1000);
    }

    #[tokio::test]
    async fn test_process_batch_spends_credit_received_in_same_batch() {
        let processor = processor();
        let names: Vec<String> = (0..8).map(|i| format!("u{}", i)).collect();

        let mut batch: Vec<_> = names.iter().map(|n| register(n)).collect();
        for i in 0..names.len() {
            let next = &names[(i + 1) % names.len()];
            batch.push(transfer(&names[i], next, 900));
            batch.push(buy(next, "pink-hoody", 3));
        }

        processor.process_batch(batch).await;

        // Row by row: u1 spends the 900 it just received, so its own transfer
        // fails, which leaves u2 short for the hoodies, and so on round the ring
        for (i, name) in names.iter().enumerate() {
            let expected = if i % 2 == 0 { 100 } else { 400 };
            assert_eq!(balance(&processor, name), expected, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_process_batch_continues_after_error() {
        let processor = processor();
        processor.process_batch(vec![register("alice"), register("bob")]).await;

        let results = processor
            .process_batch(vec![
                transfer("alice", "bob", 5000),
                transfer("alice", "bob", 100),
                transfer("mallory", "bob", 1),
            ])
            .await;

        let failures: Vec<_> = results.iter().filter_map(|r| r.result.clone().err()).collect();
        assert_eq!(failures.len(), 2);
        assert!(failures.contains(&WalletError::user_not_found("mallory")));
        assert_eq!(balance(&processor, "alice"), 900);
        assert_eq!(balance(&processor, "bob"), 1100);
    }

    #[tokio::test]
    async fn test_process_batch_many_initiators_conserve_supply() {
        let processor = processor();
        let names: Vec<String> = (0..8).map(|i| format!("user-{}", i)).collect();

        let mut batch: Vec<_> = names.iter().map(|n| register(n)).collect();
        for round in 0..25 {
            for (i, name) in names.iter().enumerate() {
                let to = &names[(i + round + 1) % names.len()];
                batch.push(transfer(name, to, 30));
            }
        }

        let results = processor.process_batch(batch).await;
        assert_eq!(results.len(), 8 + 200);

        let total: Coins = processor
            .engine
            .accounts()
            .unwrap()
            .iter()
            .map(|account| {
                assert!(account.balance >= 0);
                account.balance
            })
            .sum();
        assert_eq!(total, 8000);
    }
}
