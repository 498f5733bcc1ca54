//! Cache of contract reads for the connected account.
//!
//! Every field keeps its last value together with a staleness flag. A field
//! is stale once it was invalidated, when its last refresh failed, or when it
//! is older than the configured maximum age. Values are only ever replaced
//! by a successful refresh, and a refresh started for one account never
//! lands in the cache of another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use metastake_core::{Address, Amount, CacheField, PoolId, ReadSnapshot, WithdrawAmounts};
use tokio::time::Instant;

use crate::client::ContractReader;
use crate::error::ChainError;

/// Value of any cache field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    PoolId(PoolId),
    Amount(Amount),
    WithdrawAmounts(WithdrawAmounts),
}

impl FieldValue {
    pub fn as_pool_id(&self) -> Option<PoolId> {
        match self {
            FieldValue::PoolId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            FieldValue::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_withdraw_amounts(&self) -> Option<WithdrawAmounts> {
        match self {
            FieldValue::WithdrawAmounts(w) => Some(*w),
            _ => None,
        }
    }
}

/// A cached value and whether it may lag the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cached<T> {
    /// `None` while the value is not yet available.
    pub value: Option<T>,
    pub stale: bool,
}

impl<T> Cached<T> {
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn map<U>(self, f: impl FnOnce(T) -> Option<U>) -> Cached<U> {
        Cached {
            value: self.value.and_then(f),
            stale: self.stale,
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    value: Option<T>,
    refreshed_at: Option<Instant>,
    invalidated: bool,
    failed: bool,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            value: None,
            refreshed_at: None,
            invalidated: false,
            failed: false,
        }
    }
}

impl<T: Copy> Entry<T> {
    fn cached(&self, max_age: Duration) -> Cached<T> {
        let aged = match self.refreshed_at {
            None => true,
            Some(at) => !max_age.is_zero() && at.elapsed() > max_age,
        };
        Cached {
            value: self.value,
            stale: self.invalidated || self.failed || aged,
        }
    }

    fn store(&mut self, value: Option<T>) {
        self.value = value;
        self.refreshed_at = Some(Instant::now());
        self.invalidated = false;
        self.failed = false;
    }
}

#[derive(Debug, Default)]
struct CacheState {
    account: Option<Address>,
    /// Bumped on every account change so late reads can be recognised.
    generation: u64,
    pool_id: Entry<PoolId>,
    wallet_balance: Entry<Amount>,
    staking_balance: Entry<Amount>,
    withdraw_amounts: Entry<WithdrawAmounts>,
    pending_rewards: Entry<Amount>,
}

impl CacheState {
    fn get(&self, field: CacheField, max_age: Duration) -> Cached<FieldValue> {
        match field {
            CacheField::PoolId => self.pool_id.cached(max_age).map(|v| Some(FieldValue::PoolId(v))),
            CacheField::WalletBalance => self
                .wallet_balance
                .cached(max_age)
                .map(|v| Some(FieldValue::Amount(v))),
            CacheField::StakingBalance => self
                .staking_balance
                .cached(max_age)
                .map(|v| Some(FieldValue::Amount(v))),
            CacheField::WithdrawAmounts => self
                .withdraw_amounts
                .cached(max_age)
                .map(|v| Some(FieldValue::WithdrawAmounts(v))),
            CacheField::PendingRewards => self
                .pending_rewards
                .cached(max_age)
                .map(|v| Some(FieldValue::Amount(v))),
        }
    }

    fn store(&mut self, field: CacheField, value: Option<FieldValue>) {
        match field {
            CacheField::PoolId => self.pool_id.store(value.and_then(|v| v.as_pool_id())),
            CacheField::WalletBalance => self.wallet_balance.store(value.and_then(|v| v.as_amount())),
            CacheField::StakingBalance => self.staking_balance.store(value.and_then(|v| v.as_amount())),
            CacheField::WithdrawAmounts => self
                .withdraw_amounts
                .store(value.and_then(|v| v.as_withdraw_amounts())),
            CacheField::PendingRewards => self.pending_rewards.store(value.and_then(|v| v.as_amount())),
        }
    }

    fn flags(&mut self, field: CacheField) -> (&mut bool, &mut bool) {
        match field {
            CacheField::PoolId => (&mut self.pool_id.invalidated, &mut self.pool_id.failed),
            CacheField::WalletBalance => (
                &mut self.wallet_balance.invalidated,
                &mut self.wallet_balance.failed,
            ),
            CacheField::StakingBalance => (
                &mut self.staking_balance.invalidated,
                &mut self.staking_balance.failed,
            ),
            CacheField::WithdrawAmounts => (
                &mut self.withdraw_amounts.invalidated,
                &mut self.withdraw_amounts.failed,
            ),
            CacheField::PendingRewards => (
                &mut self.pending_rewards.invalidated,
                &mut self.pending_rewards.failed,
            ),
        }
    }
}

/// Contract reads for the currently bound account.
pub struct ReadCache {
    reader: Arc<dyn ContractReader>,
    max_age: Duration,
    state: Mutex<CacheState>,
}

impl ReadCache {
    /// A `max_age` of zero disables age-based staleness.
    pub fn new(reader: Arc<dyn ContractReader>, max_age: Duration) -> Self {
        Self {
            reader,
            max_age,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Account the cached values belong to.
    pub fn account(&self) -> Option<Address> {
        self.state().account
    }

    /// Bind the cache to `account`. Switching accounts drops every value,
    /// the pool id included. Returns true if the binding changed.
    pub fn bind_account(&self, account: Option<Address>) -> bool {
        let mut state = self.state();
        if state.account == account {
            return false;
        }
        let generation = state.generation.wrapping_add(1);
        *state = CacheState {
            account,
            generation,
            ..Default::default()
        };
        match account {
            Some(account) => tracing::info!("Read cache bound to {}", account),
            None => tracing::info!("Read cache unbound"),
        }
        true
    }

    pub fn get(&self, field: CacheField) -> Cached<FieldValue> {
        self.state().get(field, self.max_age)
    }

    pub fn pool_id(&self) -> Cached<PoolId> {
        self.state().pool_id.cached(self.max_age)
    }

    pub fn wallet_balance(&self) -> Cached<Amount> {
        self.state().wallet_balance.cached(self.max_age)
    }

    pub fn staking_balance(&self) -> Cached<Amount> {
        self.state().staking_balance.cached(self.max_age)
    }

    pub fn withdraw_amounts(&self) -> Cached<WithdrawAmounts> {
        self.state().withdraw_amounts.cached(self.max_age)
    }

    pub fn pending_rewards(&self) -> Cached<Amount> {
        self.state().pending_rewards.cached(self.max_age)
    }

    /// Current values, stale or not, for validation and display.
    pub fn snapshot(&self) -> ReadSnapshot {
        let state = self.state();
        ReadSnapshot {
            account: state.account,
            pool_id: state.pool_id.value,
            wallet_balance: state.wallet_balance.value,
            staking_balance: state.staking_balance.value,
            withdraw_amounts: state.withdraw_amounts.value,
            pending_rewards: state.pending_rewards.value,
        }
    }

    /// Mark fields stale without touching their values.
    pub fn invalidate(&self, fields: &[CacheField]) {
        let mut state = self.state();
        for field in fields {
            *state.flags(*field).0 = true;
        }
    }

    /// Re-read one field from the contract.
    ///
    /// A failed read keeps the previous value and marks it stale.
    pub async fn refresh(&self, field: CacheField) -> Result<(), ChainError> {
        let (account, generation) = {
            let state = self.state();
            (state.account, state.generation)
        };

        let result = self.read(field, account, generation).await;

        let mut state = self.state();
        if state.generation != generation {
            tracing::debug!("Discarding {} read for a previous account", field.label());
            return Ok(());
        }
        match result {
            Ok(value) => {
                state.store(field, value);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to refresh {}: {}", field.label(), e);
                *state.flags(field).1 = true;
                Err(e)
            }
        }
    }

    /// Refresh several fields concurrently. Returns the fields that failed.
    pub async fn refresh_fields(&self, fields: &[CacheField]) -> Vec<(CacheField, ChainError)> {
        let mut reads = Vec::with_capacity(fields.len());
        for &field in fields {
            reads.push(async move { (field, self.refresh(field).await) });
        }
        join_all(reads)
            .await
            .into_iter()
            .filter_map(|(field, result)| result.err().map(|e| (field, e)))
            .collect()
    }

    /// Refresh everything, pool id first.
    pub async fn refresh_all(&self) -> Vec<(CacheField, ChainError)> {
        let mut failures = Vec::new();
        if let Err(e) = self.refresh(CacheField::PoolId).await {
            failures.push((CacheField::PoolId, e));
        }
        let rest: Vec<CacheField> = CacheField::all()
            .iter()
            .copied()
            .filter(|f| *f != CacheField::PoolId)
            .collect();
        failures.extend(self.refresh_fields(&rest).await);
        failures
    }

    async fn read(
        &self,
        field: CacheField,
        account: Option<Address>,
        generation: u64,
    ) -> Result<Option<FieldValue>, ChainError> {
        if field == CacheField::PoolId {
            return Ok(self.reader.read_pool_id().await?.map(FieldValue::PoolId));
        }
        let Some(account) = account else {
            return Ok(None);
        };
        if !field.requires_pool() {
            return Ok(self
                .reader
                .read_wallet_balance(account)
                .await?
                .map(FieldValue::Amount));
        }
        let Some(pool_id) = self.ensure_pool_id(generation).await? else {
            return Ok(None);
        };
        let value = match field {
            CacheField::StakingBalance => self
                .reader
                .read_staking_balance(pool_id, account)
                .await?
                .map(FieldValue::Amount),
            CacheField::WithdrawAmounts => self
                .reader
                .read_withdraw_amounts(pool_id, account)
                .await?
                .map(FieldValue::WithdrawAmounts),
            CacheField::PendingRewards => self
                .reader
                .read_pending_rewards(pool_id, account)
                .await?
                .map(FieldValue::Amount),
            CacheField::PoolId | CacheField::WalletBalance => None,
        };
        Ok(value)
    }

    /// Cached pool id, fetched on first use.
    async fn ensure_pool_id(&self, generation: u64) -> Result<Option<PoolId>, ChainError> {
        let cached = self.state().pool_id.value;
        if cached.is_some() {
            return Ok(cached);
        }
        let pool_id = self.reader.read_pool_id().await?;
        let mut state = self.state();
        if state.generation == generation {
            state.pool_id.store(pool_id);
        }
        Ok(pool_id)
    }
}
