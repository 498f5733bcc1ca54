//! In-memory staking pool.
//!
//! Plays wallet, contract reader and contract writer at once so the
//! controller can run without a node. A write takes effect when its receipt
//! is awaited, which is where a real chain would include it. Confirmations
//! can be held back and failures injected for the next call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use metastake_core::{Address, Amount, PoolId, TxHash, WithdrawAmounts};
use tokio::sync::watch;

use crate::client::{ContractReader, ContractWriter, Notifier, Receipt, WalletProvider};
use crate::controller::Collaborators;
use crate::error::{ChainError, WriteError};
use crate::transactions::WriteCall;

/// Everything the pool tracks for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountBalances {
    pub wallet: Amount,
    pub staked: Amount,
    pub withdrawable: Amount,
    pub pending_unlock: Amount,
    pub rewards: Amount,
}

#[derive(Debug, Default)]
struct SimState {
    account: Option<Address>,
    pool_id: PoolId,
    balances: HashMap<Address, AccountBalances>,
    pending: HashMap<TxHash, (Address, WriteCall)>,
    calls: Vec<WriteCall>,
    nonce: u64,
    block_number: u64,
    next_submit_error: Option<WriteError>,
    next_revert: Option<String>,
    read_error: Option<ChainError>,
}

impl SimState {
    fn balances(&self, account: Address) -> AccountBalances {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn check_pool(&self, pool_id: PoolId) -> Result<(), String> {
        if pool_id != self.pool_id {
            return Err("invalid pid".to_string());
        }
        Ok(())
    }

    fn apply(&mut self, account: Address, call: WriteCall) -> Result<(), String> {
        let overflow = || "arithmetic overflow".to_string();
        match call {
            WriteCall::Deposit { amount } => {
                let b = self.balances.entry(account).or_default();
                b.wallet = b
                    .wallet
                    .checked_sub(amount)
                    .ok_or_else(|| "insufficient funds".to_string())?;
                b.staked = b.staked.checked_add(amount).ok_or_else(overflow)?;
            }
            WriteCall::RequestUnstake { pool_id, amount } => {
                self.check_pool(pool_id)?;
                let b = self.balances.entry(account).or_default();
                b.staked = b
                    .staked
                    .checked_sub(amount)
                    .ok_or_else(|| "Not enough staking token balance".to_string())?;
                b.pending_unlock = b.pending_unlock.checked_add(amount).ok_or_else(overflow)?;
            }
            WriteCall::Withdraw { pool_id } => {
                self.check_pool(pool_id)?;
                let b = self.balances.entry(account).or_default();
                if b.withdrawable.is_zero() {
                    return Err("nothing to withdraw".to_string());
                }
                b.wallet = b.wallet.checked_add(b.withdrawable).ok_or_else(overflow)?;
                b.withdrawable = Amount::ZERO;
            }
            WriteCall::Claim { pool_id } => {
                self.check_pool(pool_id)?;
                let b = self.balances.entry(account).or_default();
                if b.rewards.is_zero() {
                    return Err("no pending rewards".to_string());
                }
                b.rewards = Amount::ZERO;
            }
        }
        Ok(())
    }
}

fn tx_hash_for(nonce: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x5e;
    bytes[24..].copy_from_slice(&nonce.to_be_bytes());
    TxHash::new(bytes)
}

/// A single-pool staking contract living in memory.
#[derive(Debug)]
pub struct SimulatedPool {
    state: Mutex<SimState>,
    hold: watch::Sender<bool>,
}

impl Default for SimulatedPool {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedPool {
    pub fn new(pool_id: PoolId) -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            state: Mutex::new(SimState {
                pool_id,
                ..Default::default()
            }),
            hold,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Use this pool for every collaborator role.
    pub fn collaborators(self: &Arc<Self>, notifier: Arc<dyn Notifier>) -> Collaborators {
        Collaborators {
            wallet: self.clone(),
            reader: self.clone(),
            writer: self.clone(),
            notifier,
        }
    }

    // ==================== Wallet ====================

    pub fn connect(&self, account: Address) {
        self.state().account = Some(account);
    }

    pub fn disconnect(&self) {
        self.state().account = None;
    }

    // ==================== Chain State ====================

    pub fn pool_id(&self) -> PoolId {
        self.state().pool_id
    }

    pub fn balances(&self, account: Address) -> AccountBalances {
        self.state().balances(account)
    }

    pub fn set_wallet_balance(&self, account: Address, amount: Amount) {
        self.state().balances.entry(account).or_default().wallet = amount;
    }

    /// Credit rewards to `account`.
    pub fn accrue_rewards(&self, account: Address, amount: Amount) {
        let mut state = self.state();
        let b = state.balances.entry(account).or_default();
        b.rewards = b.rewards.checked_add(amount).unwrap_or(b.rewards);
    }

    /// End the unlock period for everything `account` has requested.
    pub fn unlock(&self, account: Address) {
        let mut state = self.state();
        let b = state.balances.entry(account).or_default();
        b.withdrawable = b
            .withdrawable
            .checked_add(b.pending_unlock)
            .unwrap_or(b.withdrawable);
        b.pending_unlock = Amount::ZERO;
    }

    pub fn block_number(&self) -> u64 {
        self.state().block_number
    }

    /// Every write call the pool was asked to send, rejected ones included.
    pub fn write_calls(&self) -> Vec<WriteCall> {
        self.state().calls.clone()
    }

    // ==================== Fault Injection ====================

    /// Keep submitted transactions out of blocks until released.
    ///
    /// Transactions whose receipt wait is abandoned while held are dropped.
    pub fn hold_confirmations(&self) {
        self.hold.send_replace(true);
    }

    pub fn release_confirmations(&self) {
        self.hold.send_replace(false);
    }

    /// The next write is rejected in the wallet.
    pub fn reject_next(&self) {
        self.state().next_submit_error = Some(WriteError::Rejected);
    }

    /// The next write fails to broadcast.
    pub fn fail_next_broadcast(&self, message: impl Into<String>) {
        self.state().next_submit_error = Some(WriteError::Broadcast(message.into()));
    }

    /// The next included transaction reverts.
    pub fn revert_next(&self, reason: impl Into<String>) {
        self.state().next_revert = Some(reason.into());
    }

    /// Make every read fail with `error` until cleared with `None`.
    pub fn set_read_error(&self, error: Option<ChainError>) {
        self.state().read_error = error;
    }

    fn submit(&self, call: WriteCall) -> Result<TxHash, WriteError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(e) = state.next_submit_error.take() {
            return Err(e);
        }
        let Some(account) = state.account else {
            return Err(WriteError::Broadcast("no account connected".to_string()));
        };
        state.nonce += 1;
        let tx_hash = tx_hash_for(state.nonce);
        state.pending.insert(tx_hash, (account, call));
        tracing::debug!("Broadcast {} as {}", call.description(), tx_hash);
        Ok(tx_hash)
    }

    fn read<T>(&self, f: impl FnOnce(&SimState) -> Result<T, ChainError>) -> Result<T, ChainError> {
        let state = self.state();
        if let Some(e) = &state.read_error {
            return Err(e.clone());
        }
        f(&state)
    }

    fn read_pool_balance<T>(
        &self,
        pool_id: PoolId,
        f: impl FnOnce(&SimState) -> T,
    ) -> Result<Option<T>, ChainError> {
        self.read(|state| {
            state.check_pool(pool_id).map_err(ChainError::Call)?;
            Ok(Some(f(state)))
        })
    }
}

impl WalletProvider for SimulatedPool {
    fn current_account(&self) -> Option<Address> {
        self.state().account
    }
}

#[async_trait]
impl ContractReader for SimulatedPool {
    async fn read_pool_id(&self) -> Result<Option<PoolId>, ChainError> {
        self.read(|state| Ok(Some(state.pool_id)))
    }

    async fn read_wallet_balance(&self, account: Address) -> Result<Option<Amount>, ChainError> {
        self.read(|state| Ok(Some(state.balances(account).wallet)))
    }

    async fn read_staking_balance(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<Amount>, ChainError> {
        self.read_pool_balance(pool_id, |state| state.balances(account).staked)
    }

    async fn read_withdraw_amounts(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<WithdrawAmounts>, ChainError> {
        self.read_pool_balance(pool_id, |state| {
            let b = state.balances(account);
            WithdrawAmounts {
                withdrawable: b.withdrawable,
                pending_unlock: b.pending_unlock,
            }
        })
    }

    async fn read_pending_rewards(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<Amount>, ChainError> {
        self.read_pool_balance(pool_id, |state| state.balances(account).rewards)
    }
}

#[async_trait]
impl ContractWriter for SimulatedPool {
    async fn deposit(&self, amount: Amount) -> Result<TxHash, WriteError> {
        self.submit(WriteCall::Deposit { amount })
    }

    async fn request_unstake(&self, pool_id: PoolId, amount: Amount) -> Result<TxHash, WriteError> {
        self.submit(WriteCall::RequestUnstake { pool_id, amount })
    }

    async fn withdraw(&self, pool_id: PoolId) -> Result<TxHash, WriteError> {
        self.submit(WriteCall::Withdraw { pool_id })
    }

    async fn claim(&self, pool_id: PoolId) -> Result<TxHash, WriteError> {
        self.submit(WriteCall::Claim { pool_id })
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WriteError> {
        let _abandon = Abandon {
            pool: self,
            tx_hash,
        };
        let mut hold = self.hold.subscribe();
        let _ = hold.wait_for(|held| !*held).await;

        let mut state = self.state();
        let Some((account, call)) = state.pending.remove(&tx_hash) else {
            return Err(WriteError::Chain(ChainError::Call(format!(
                "unknown transaction {}",
                tx_hash
            ))));
        };
        state.block_number += 1;
        let block_number = state.block_number;
        if let Some(reason) = state.next_revert.take() {
            return Err(WriteError::Reverted(reason));
        }
        state.apply(account, call).map_err(WriteError::Reverted)?;
        tracing::debug!("Included {} in block {}", tx_hash, block_number);
        Ok(Receipt {
            tx_hash,
            block_number,
        })
    }
}

/// Forgets a transaction whose receipt wait was dropped, e.g. on timeout.
/// A transaction nobody waits for is never included.
struct Abandon<'a> {
    pool: &'a SimulatedPool,
    tx_hash: TxHash,
}

impl Drop for Abandon<'_> {
    fn drop(&mut self) {
        if self.pool.state().pending.remove(&self.tx_hash).is_some() {
            tracing::debug!("Dropped {} before inclusion", self.tx_hash);
        }
    }
}
