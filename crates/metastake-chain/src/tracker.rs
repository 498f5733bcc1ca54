//! Lifecycle of a single transaction attempt.
//!
//! ```text
//! Idle -> Submitting -> AwaitingConfirmation -> Confirmed
//!            |                  |
//!            +------> Failed <--+
//! ```
//!
//! Terminal states never change again.

use std::time::Duration;

use metastake_core::{ActionKind, Amount, AttemptId, AttemptState, FailureReason, TxHash};
use thiserror::Error;

use crate::client::ContractWriter;
use crate::transactions::WriteCall;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

fn allowed(from: &AttemptState, to: &AttemptState) -> bool {
    use AttemptState::*;
    matches!(
        (from, to),
        (Idle, Submitting)
            | (Submitting, AwaitingConfirmation { .. })
            | (Submitting, Failed { .. })
            | (AwaitingConfirmation { .. }, Confirmed { .. })
            | (AwaitingConfirmation { .. }, Failed { .. })
    )
}

/// State machine for one attempt.
#[derive(Debug, Clone)]
pub struct TransactionTracker {
    id: AttemptId,
    kind: ActionKind,
    amount: Option<Amount>,
    state: AttemptState,
}

impl TransactionTracker {
    pub fn new(id: AttemptId, kind: ActionKind, amount: Option<Amount>) -> Self {
        Self {
            id,
            kind,
            amount,
            state: AttemptState::Idle,
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    fn transition(&mut self, next: AttemptState) -> Result<(), TrackerError> {
        if !allowed(&self.state, &next) {
            return Err(TrackerError::InvalidTransition {
                from: self.state.label(),
                to: next.label(),
            });
        }
        tracing::debug!(
            "Attempt {} ({}): {} -> {}",
            self.id,
            self.kind,
            self.state.label(),
            next.label()
        );
        self.state = next;
        Ok(())
    }

    /// The wallet was asked to sign.
    pub fn begin_submission(&mut self) -> Result<(), TrackerError> {
        self.transition(AttemptState::Submitting)
    }

    /// The wallet broadcast the transaction.
    pub fn submitted(&mut self, tx_hash: TxHash) -> Result<(), TrackerError> {
        self.transition(AttemptState::AwaitingConfirmation { tx_hash })
    }

    /// The transaction was included in `block_number`.
    pub fn confirmed(&mut self, block_number: u64) -> Result<(), TrackerError> {
        let AttemptState::AwaitingConfirmation { tx_hash } = self.state else {
            return Err(TrackerError::InvalidTransition {
                from: self.state.label(),
                to: "Confirmed",
            });
        };
        self.transition(AttemptState::Confirmed {
            tx_hash,
            block_number,
        })
    }

    /// The attempt failed. Keeps the chain handle if one was obtained.
    pub fn failed(&mut self, reason: FailureReason) -> Result<(), TrackerError> {
        let tx_hash = self.state.tx_hash();
        self.transition(AttemptState::Failed { tx_hash, reason })
    }

    /// Run `call` from `Idle` to a terminal state.
    ///
    /// `on_transition` sees every state the attempt enters. Waiting for
    /// inclusion is bounded by `timeout`; when it elapses the attempt fails
    /// with [`FailureReason::Timeout`] even though the transaction may still
    /// land later.
    pub async fn drive<F>(
        &mut self,
        writer: &dyn ContractWriter,
        call: WriteCall,
        timeout: Duration,
        mut on_transition: F,
    ) -> Result<AttemptState, TrackerError>
    where
        F: FnMut(&AttemptState),
    {
        self.begin_submission()?;
        on_transition(&self.state);

        let tx_hash = match call.send(writer).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!("Attempt {} ({}) not submitted: {}", self.id, self.kind, e);
                self.failed(e.into_submit_failure())?;
                on_transition(&self.state);
                return Ok(self.state.clone());
            }
        };
        self.submitted(tx_hash)?;
        on_transition(&self.state);
        tracing::info!(
            "Attempt {} ({}) submitted as {}",
            self.id,
            self.kind,
            tx_hash
        );

        match tokio::time::timeout(timeout, writer.wait_for_receipt(tx_hash)).await {
            Ok(Ok(receipt)) => {
                tracing::info!(
                    "Attempt {} ({}) confirmed in block {}",
                    self.id,
                    self.kind,
                    receipt.block_number
                );
                self.confirmed(receipt.block_number)?;
            }
            Ok(Err(e)) => {
                tracing::warn!("Attempt {} ({}) failed: {}", self.id, self.kind, e);
                self.failed(e.into_receipt_failure())?;
            }
            Err(_) => {
                tracing::warn!(
                    "Attempt {} ({}) timed out after {:?}; {} may still be included",
                    self.id,
                    self.kind,
                    timeout,
                    tx_hash
                );
                self.failed(FailureReason::Timeout)?;
            }
        }
        on_transition(&self.state);
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Receipt;
    use crate::error::WriteError;
    use async_trait::async_trait;
    use metastake_core::PoolId;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const HASH: TxHash = TxHash::new([7; 32]);

    fn tracker() -> TransactionTracker {
        TransactionTracker::new(AttemptId(1), ActionKind::Claim, None)
    }

    // ==================== Transitions ====================

    #[test]
    fn test_happy_path() {
        let mut t = tracker();
        t.begin_submission().unwrap();
        t.submitted(HASH).unwrap();
        t.confirmed(12).unwrap();
        assert_eq!(
            t.state(),
            &AttemptState::Confirmed {
                tx_hash: HASH,
                block_number: 12
            }
        );
    }

    #[test]
    fn test_fail_while_submitting_has_no_hash() {
        let mut t = tracker();
        t.begin_submission().unwrap();
        t.failed(FailureReason::WalletRejected).unwrap();
        assert_eq!(
            t.state(),
            &AttemptState::Failed {
                tx_hash: None,
                reason: FailureReason::WalletRejected
            }
        );
    }

    #[test]
    fn test_fail_while_awaiting_keeps_hash() {
        let mut t = tracker();
        t.begin_submission().unwrap();
        t.submitted(HASH).unwrap();
        t.failed(FailureReason::Timeout).unwrap();
        assert_eq!(t.state().tx_hash(), Some(HASH));
    }

    #[test]
    fn test_cannot_skip_submission() {
        let mut t = tracker();
        assert_eq!(
            t.submitted(HASH),
            Err(TrackerError::InvalidTransition {
                from: "Idle",
                to: "Awaiting Confirmation"
            })
        );
        assert!(t.confirmed(1).is_err());
        assert!(t.failed(FailureReason::Timeout).is_err());
        assert_eq!(t.state(), &AttemptState::Idle);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut t = tracker();
        t.begin_submission().unwrap();
        t.submitted(HASH).unwrap();
        t.confirmed(3).unwrap();

        assert!(t.failed(FailureReason::Timeout).is_err());
        assert!(t.begin_submission().is_err());
        assert!(t.confirmed(4).is_err());
        assert_eq!(t.state().label(), "Confirmed");

        let mut t = tracker();
        t.begin_submission().unwrap();
        t.failed(FailureReason::WalletRejected).unwrap();
        assert!(t.submitted(HASH).is_err());
        assert!(t.failed(FailureReason::Timeout).is_err());
    }

    // ==================== Driving ====================

    enum Outcome {
        Included(u64),
        Revert(&'static str),
        Never,
    }

    struct StubWriter {
        submit: Mutex<Option<WriteError>>,
        outcome: Outcome,
    }

    impl StubWriter {
        fn new(outcome: Outcome) -> Self {
            Self {
                submit: Mutex::new(None),
                outcome,
            }
        }

        fn rejecting() -> Self {
            Self {
                submit: Mutex::new(Some(WriteError::Rejected)),
                outcome: Outcome::Never,
            }
        }

        fn send(&self) -> Result<TxHash, WriteError> {
            match self.submit.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(HASH),
            }
        }
    }

    #[async_trait]
    impl ContractWriter for StubWriter {
        async fn deposit(&self, _amount: Amount) -> Result<TxHash, WriteError> {
            self.send()
        }

        async fn request_unstake(&self, _pool_id: PoolId, _amount: Amount) -> Result<TxHash, WriteError> {
            self.send()
        }

        async fn withdraw(&self, _pool_id: PoolId) -> Result<TxHash, WriteError> {
            self.send()
        }

        async fn claim(&self, _pool_id: PoolId) -> Result<TxHash, WriteError> {
            self.send()
        }

        async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WriteError> {
            match self.outcome {
                Outcome::Included(block_number) => Ok(Receipt {
                    tx_hash,
                    block_number,
                }),
                Outcome::Revert(reason) => Err(WriteError::Reverted(reason.to_string())),
                Outcome::Never => std::future::pending().await,
            }
        }
    }

    async fn drive(writer: &StubWriter) -> (AttemptState, Vec<&'static str>) {
        let mut t = tracker();
        let mut seen = Vec::new();
        let state = t
            .drive(
                writer,
                WriteCall::Claim { pool_id: 0 },
                Duration::from_secs(10),
                |s| seen.push(s.label()),
            )
            .await
            .unwrap();
        (state, seen)
    }

    #[tokio::test]
    async fn test_drive_to_confirmed() {
        let (state, seen) = drive(&StubWriter::new(Outcome::Included(99))).await;
        assert_eq!(
            state,
            AttemptState::Confirmed {
                tx_hash: HASH,
                block_number: 99
            }
        );
        assert_eq!(seen, vec!["Submitting", "Awaiting Confirmation", "Confirmed"]);
    }

    #[tokio::test]
    async fn test_drive_wallet_rejection() {
        let (state, seen) = drive(&StubWriter::rejecting()).await;
        assert_eq!(
            state,
            AttemptState::Failed {
                tx_hash: None,
                reason: FailureReason::WalletRejected
            }
        );
        assert_eq!(seen, vec!["Submitting", "Failed"]);
    }

    #[tokio::test]
    async fn test_drive_revert() {
        let (state, _) = drive(&StubWriter::new(Outcome::Revert("no rewards"))).await;
        assert_eq!(
            state,
            AttemptState::Failed {
                tx_hash: Some(HASH),
                reason: FailureReason::Reverted("no rewards".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_timeout() {
        let (state, seen) = drive(&StubWriter::new(Outcome::Never)).await;
        assert_eq!(
            state,
            AttemptState::Failed {
                tx_hash: Some(HASH),
                reason: FailureReason::Timeout
            }
        );
        assert_eq!(seen.last(), Some(&"Failed"));
    }

    #[tokio::test]
    async fn test_drive_twice_is_rejected() {
        let writer = StubWriter::new(Outcome::Included(1));
        let mut t = tracker();
        t.drive(&writer, WriteCall::Claim { pool_id: 0 }, Duration::from_secs(1), |_| {})
            .await
            .unwrap();
        let again = t
            .drive(&writer, WriteCall::Claim { pool_id: 0 }, Duration::from_secs(1), |_| {})
            .await;
        assert!(matches!(again, Err(TrackerError::InvalidTransition { .. })));
    }
}
