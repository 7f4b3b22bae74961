//! Transactional action execution
//!
//! An action handler may declare itself transactional; its business
//! logic then runs inside its own database transaction, scoped strictly
//! to that one handler call. Failures are classified into three
//! distinguishable kinds, each carrying the original cause.

use crate::domain::context::FlowContext;
use crate::{FlowAction, FlowError};
use async_trait::async_trait;
use tracing::warn;

/// A single open database transaction
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(&mut self) -> Result<(), FlowError>;

    /// Roll the transaction back
    async fn rollback(&mut self) -> Result<(), FlowError>;
}

/// Opens database transactions for transactional action handlers
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Begin a new transaction
    async fn begin(&self) -> Result<Box<dyn Transaction>, FlowError>;
}

/// Run a transactional action handler inside its own transaction
///
/// Classification of failures:
/// - commit fails: rolled back once, surfaced as
///   [`FlowError::TransactionCommitFailed`]
/// - handler raises [`FlowError::TransactionAbortRequested`]: rolled
///   back once, surfaced as [`FlowError::TransactionAborted`]
/// - handler raises anything else: rolled back once, surfaced as
///   [`FlowError::TransactionUncaught`]
pub async fn run_transactional(
    manager: &dyn TransactionManager,
    action: &dyn FlowAction,
    context: &mut FlowContext,
) -> Result<(), FlowError> {
    let mut transaction = manager.begin().await?;

    match action.handle(context).await {
        Ok(()) => match transaction.commit().await {
            Ok(()) => Ok(()),
            Err(commit_err) => {
                rollback_quietly(transaction.as_mut(), action.name()).await;
                Err(FlowError::TransactionCommitFailed {
                    source: Box::new(commit_err),
                })
            }
        },
        Err(abort @ FlowError::TransactionAbortRequested(_)) => {
            rollback_quietly(transaction.as_mut(), action.name()).await;
            Err(FlowError::TransactionAborted {
                source: Box::new(abort),
            })
        }
        Err(other) => {
            rollback_quietly(transaction.as_mut(), action.name()).await;
            Err(FlowError::TransactionUncaught {
                source: Box::new(other),
            })
        }
    }
}

async fn rollback_quietly(transaction: &mut dyn Transaction, action: &str) {
    if let Err(err) = transaction.rollback().await {
        warn!(
            action = %action,
            error = %err,
            "rollback failed after transactional action failure"
        );
    }
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct TransactionLog {
        begun: AtomicUsize,
        committed: AtomicUsize,
        rolled_back: AtomicUsize,
        fail_commits: AtomicBool,
    }

    /// In-memory transaction manager that records every operation
    #[derive(Default)]
    pub struct MemoryTransactionManager {
        log: Arc<TransactionLog>,
    }

    impl MemoryTransactionManager {
        /// Create a manager with a clean log
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent commit fail
        pub fn fail_commits(&self) {
            self.log.fail_commits.store(true, Ordering::SeqCst);
        }

        /// Number of transactions begun so far
        pub fn begun(&self) -> usize {
            self.log.begun.load(Ordering::SeqCst)
        }

        /// Number of commits that succeeded so far
        pub fn committed(&self) -> usize {
            self.log.committed.load(Ordering::SeqCst)
        }

        /// Number of rollbacks performed so far
        pub fn rolled_back(&self) -> usize {
            self.log.rolled_back.load(Ordering::SeqCst)
        }
    }

    struct MemoryTransaction {
        log: Arc<TransactionLog>,
    }

    #[async_trait]
    impl Transaction for MemoryTransaction {
        async fn commit(&mut self) -> Result<(), FlowError> {
            if self.log.fail_commits.load(Ordering::SeqCst) {
                return Err(FlowError::Transaction("commit refused".to_string()));
            }
            self.log.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), FlowError> {
            self.log.rolled_back.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl TransactionManager for MemoryTransactionManager {
        async fn begin(&self) -> Result<Box<dyn Transaction>, FlowError> {
            self.log.begun.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryTransaction {
                log: self.log.clone(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryTransactionManager;
    use super::*;
    use crate::domain::context::EventScope;

    struct SucceedingAction;

    #[async_trait]
    impl FlowAction for SucceedingAction {
        fn name(&self) -> &str {
            "succeeding-action"
        }

        fn transactional(&self) -> bool {
            true
        }

        async fn handle(&self, _context: &mut FlowContext) -> Result<(), FlowError> {
            Ok(())
        }
    }

    struct AbortingAction;

    #[async_trait]
    impl FlowAction for AbortingAction {
        fn name(&self) -> &str {
            "aborting-action"
        }

        fn transactional(&self) -> bool {
            true
        }

        async fn handle(&self, _context: &mut FlowContext) -> Result<(), FlowError> {
            Err(FlowError::TransactionAbortRequested(
                "order already shipped".to_string(),
            ))
        }
    }

    struct FailingAction;

    #[async_trait]
    impl FlowAction for FailingAction {
        fn name(&self) -> &str {
            "failing-action"
        }

        fn transactional(&self) -> bool {
            true
        }

        async fn handle(&self, _context: &mut FlowContext) -> Result<(), FlowError> {
            Err(FlowError::Other("handler exploded".to_string()))
        }
    }

    fn context() -> FlowContext {
        FlowContext::new("checkout.order.placed", EventScope::new("tenant-1"))
    }

    #[tokio::test]
    async fn test_success_commits_without_rollback() {
        let manager = MemoryTransactionManager::new();
        let mut ctx = context();

        run_transactional(&manager, &SucceedingAction, &mut ctx)
            .await
            .unwrap();

        assert_eq!(manager.begun(), 1);
        assert_eq!(manager.committed(), 1);
        assert_eq!(manager.rolled_back(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back_once() {
        let manager = MemoryTransactionManager::new();
        manager.fail_commits();
        let mut ctx = context();

        let err = run_transactional(&manager, &SucceedingAction, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::TransactionCommitFailed { .. }));
        assert_eq!(manager.rolled_back(), 1);
        assert_eq!(manager.committed(), 0);
    }

    #[tokio::test]
    async fn test_abort_signal_rolls_back_once() {
        let manager = MemoryTransactionManager::new();
        let mut ctx = context();

        let err = run_transactional(&manager, &AbortingAction, &mut ctx)
            .await
            .unwrap_err();

        match err {
            FlowError::TransactionAborted { source } => {
                assert!(matches!(*source, FlowError::TransactionAbortRequested(_)));
            }
            other => panic!("expected aborted kind, got {:?}", other),
        }
        assert_eq!(manager.rolled_back(), 1);
        assert_eq!(manager.committed(), 0);
    }

    #[tokio::test]
    async fn test_arbitrary_failure_rolls_back_once() {
        let manager = MemoryTransactionManager::new();
        let mut ctx = context();

        let err = run_transactional(&manager, &FailingAction, &mut ctx)
            .await
            .unwrap_err();

        match err {
            FlowError::TransactionUncaught { source } => {
                assert_eq!(source.to_string(), "handler exploded");
            }
            other => panic!("expected uncaught kind, got {:?}", other),
        }
        assert_eq!(manager.rolled_back(), 1);
        assert_eq!(manager.committed(), 0);
    }
}
