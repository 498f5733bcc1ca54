//! Staking controller.
//!
//! Turns user intents into tracked transactions. At most one attempt per
//! action kind is in flight for an account; attempts of different kinds run
//! independently. Each attempt is driven on its own task, publishes its
//! transitions to subscribers and the notifier, and on confirmation refreshes
//! the reads the action changed before it settles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metastake_core::{
    ActionKind, Address, Amount, AttemptId, AttemptState, CacheField, ControllerConfig,
    FailureReason, ReadSnapshot, StakingSummary, ValidationError, max_input, parse_action_input,
    validate_action,
};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::cache::ReadCache;
use crate::client::{ContractReader, ContractWriter, Notifier, WalletProvider};
use crate::error::ChainError;
use crate::notify::Notification;
use crate::tracker::TransactionTracker;
use crate::transactions::WriteCall;

/// Why `perform_action` refused to start an attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} already in progress")]
    DuplicateInFlight(ActionKind),
}

/// External parties the controller works with.
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn WalletProvider>,
    pub reader: Arc<dyn ContractReader>,
    pub writer: Arc<dyn ContractWriter>,
    pub notifier: Arc<dyn Notifier>,
}

/// A live attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    pub id: AttemptId,
    pub account: Address,
    pub kind: ActionKind,
    pub amount: Option<Amount>,
    pub state: AttemptState,
}

/// Published to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// An attempt entered a new state.
    StateChanged {
        id: AttemptId,
        kind: ActionKind,
        state: AttemptState,
    },
    /// An attempt is finished and left the live table. `refreshed` lists the
    /// reads successfully re-fetched after confirmation.
    Settled {
        id: AttemptId,
        kind: ActionKind,
        state: AttemptState,
        refreshed: Vec<CacheField>,
    },
}

impl ControllerEvent {
    pub fn id(&self) -> AttemptId {
        match self {
            ControllerEvent::StateChanged { id, .. } | ControllerEvent::Settled { id, .. } => *id,
        }
    }
}

struct Inner {
    wallet: Arc<dyn WalletProvider>,
    writer: Arc<dyn ContractWriter>,
    notifier: Arc<dyn Notifier>,
    cache: ReadCache,
    config: ControllerConfig,
    attempts: Mutex<HashMap<AttemptId, AttemptInfo>>,
    next_id: AtomicU64,
    events: broadcast::Sender<ControllerEvent>,
}

/// Entry point for the UI layer. Cheap to clone.
#[derive(Clone)]
pub struct StakingController {
    inner: Arc<Inner>,
}

impl StakingController {
    pub fn new(collaborators: Collaborators, config: ControllerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let cache = ReadCache::new(collaborators.reader, config.cache_max_age());
        Self {
            inner: Arc::new(Inner {
                wallet: collaborators.wallet,
                writer: collaborators.writer,
                notifier: collaborators.notifier,
                cache,
                config,
                attempts: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Validate and start `kind` with the user's raw input.
    ///
    /// Returns as soon as the attempt is registered; the transaction itself
    /// is driven on a spawned task, so this must run inside a Tokio runtime.
    /// Refusals are also sent to the notifier.
    pub fn perform_action(&self, kind: ActionKind, raw_input: &str) -> Result<AttemptId, ActionError> {
        let result = self.inner.start_attempt(kind, raw_input);
        match &result {
            Ok((id, ..)) => tracing::info!("Started {} attempt {}", kind, id),
            Err(e) => {
                tracing::info!("Refused {}: {}", kind, e);
                self.inner
                    .notifier
                    .notify(Notification::error(format!("{} not sent", kind), e.to_string()));
            }
        }
        let (id, account, amount, call) = result?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_attempt(id, account, amount, call).await });
        Ok(id)
    }

    /// Bind the cache to the wallet's account and refresh every read.
    ///
    /// All reads are attempted; the first failure is returned.
    pub async fn sync_account(&self) -> Result<(), ChainError> {
        let account = self.inner.wallet_account();
        self.inner.cache.bind_account(account);
        let failures = self.inner.cache.refresh_all().await;
        match failures.into_iter().next() {
            Some((field, e)) => {
                tracing::warn!("Account sync incomplete, {} unavailable: {}", field.label(), e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    pub fn cache(&self) -> &ReadCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> ReadSnapshot {
        self.inner.cache.snapshot()
    }

    pub fn summary(&self) -> StakingSummary {
        StakingSummary::from_snapshot(&self.snapshot())
    }

    /// Value for the MAX button of `kind`.
    pub fn max_amount(&self, kind: ActionKind) -> Option<String> {
        max_input(kind, &self.snapshot())
    }

    /// A live attempt. Settled attempts are gone.
    pub fn attempt(&self, id: AttemptId) -> Option<AttemptInfo> {
        self.inner.attempts().get(&id).cloned()
    }

    /// All live attempts, oldest first.
    pub fn attempts(&self) -> Vec<AttemptInfo> {
        let mut attempts: Vec<AttemptInfo> = self.inner.attempts().values().cloned().collect();
        attempts.sort_by_key(|a| a.id);
        attempts
    }

    /// Whether `kind` is in flight for the connected account.
    pub fn is_in_flight(&self, kind: ActionKind) -> bool {
        match self.inner.wallet_account() {
            Some(account) => self.inner.in_flight(&self.inner.attempts(), account, kind),
            None => false,
        }
    }
}

impl Inner {
    fn attempts(&self) -> MutexGuard<'_, HashMap<AttemptId, AttemptInfo>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wallet_account(&self) -> Option<Address> {
        if !self.wallet.is_connected() {
            return None;
        }
        self.wallet.current_account()
    }

    /// An attempt stays live until its confirmation refresh has finished.
    fn in_flight(
        &self,
        attempts: &HashMap<AttemptId, AttemptInfo>,
        account: Address,
        kind: ActionKind,
    ) -> bool {
        attempts
            .values()
            .any(|a| a.account == account && a.kind == kind)
    }

    /// Duplicate check, parse, validate and register, all under the
    /// attempts lock so two calls cannot both pass the duplicate check.
    fn start_attempt(
        &self,
        kind: ActionKind,
        raw_input: &str,
    ) -> Result<(AttemptId, Address, Option<Amount>, WriteCall), ActionError> {
        let account = self.wallet_account();
        self.cache.bind_account(account);

        let mut attempts = self.attempts();
        if let Some(account) = account
            && self.in_flight(&attempts, account, kind)
        {
            return Err(ActionError::DuplicateInFlight(kind));
        }

        let amount = parse_action_input(kind, raw_input)?;
        let snapshot = self.cache.snapshot();
        validate_action(kind, amount, &snapshot)?;
        let account = snapshot.account.ok_or(ValidationError::NotConnected)?;
        let call = WriteCall::for_action(kind, amount, snapshot.pool_id)?;

        let id = AttemptId(self.next_id.fetch_add(1, Ordering::Relaxed));
        attempts.insert(
            id,
            AttemptInfo {
                id,
                account,
                kind,
                amount,
                state: AttemptState::Idle,
            },
        );
        Ok((id, account, amount, call))
    }

    async fn run_attempt(
        self: Arc<Self>,
        id: AttemptId,
        account: Address,
        amount: Option<Amount>,
        call: WriteCall,
    ) {
        let kind = call.kind();
        tracing::info!("Attempt {}: {}", id, call.description());
        let mut tracker = TransactionTracker::new(id, kind, amount);
        let result = tracker
            .drive(
                self.writer.as_ref(),
                call,
                self.config.confirmation_timeout(),
                |state| self.record(id, kind, state),
            )
            .await;
        let state = match result {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Attempt {} stopped: {}", id, e);
                tracker.state().clone()
            }
        };

        let refreshed = match &state {
            AttemptState::Confirmed { block_number, .. } => {
                let refreshed = self.refresh_after_confirmation(account, kind).await;
                self.notifier
                    .notify(Notification::confirmed(kind, *block_number));
                refreshed
            }
            AttemptState::Failed { reason, .. } => {
                if *reason == FailureReason::Timeout {
                    tracing::warn!(
                        "Attempt {} gave up waiting; balances refresh on the next sync",
                        id
                    );
                }
                self.notifier.notify(Notification::failed(kind, reason));
                Vec::new()
            }
            _ => Vec::new(),
        };

        self.attempts().remove(&id);
        let _ = self.events.send(ControllerEvent::Settled {
            id,
            kind,
            state,
            refreshed,
        });
    }

    fn record(&self, id: AttemptId, kind: ActionKind, state: &AttemptState) {
        if let Some(info) = self.attempts().get_mut(&id) {
            info.state = state.clone();
        }
        if let AttemptState::AwaitingConfirmation { tx_hash } = state {
            self.notifier.notify(Notification::submitted(kind, *tx_hash));
        }
        // No subscribers is fine.
        let _ = self.events.send(ControllerEvent::StateChanged {
            id,
            kind,
            state: state.clone(),
        });
    }

    async fn refresh_after_confirmation(&self, account: Address, kind: ActionKind) -> Vec<CacheField> {
        if self.cache.account() != Some(account) {
            tracing::info!("Account changed since {} was sent, skipping refresh", kind);
            return Vec::new();
        }
        let fields = kind.refresh_fields();
        self.cache.invalidate(fields);
        let failures = self.cache.refresh_fields(fields).await;
        for (field, e) in &failures {
            tracing::warn!("{} stays stale after {}: {}", field.label(), kind, e);
        }
        fields
            .iter()
            .copied()
            .filter(|f| !failures.iter().any(|(failed, _)| failed == f))
            .collect()
    }
}
