//! Collaborators the controller talks to.
//!
//! The wallet, the contract read/write endpoints and the notification sink
//! sit behind traits so the controller can run against a live connection or
//! the in-memory [`SimulatedPool`](crate::sim::SimulatedPool).

use async_trait::async_trait;
use metastake_core::{Address, Amount, PoolId, TxHash, WithdrawAmounts};

use crate::error::{ChainError, WriteError};
use crate::notify::Notification;

/// Inclusion proof returned once a transaction lands in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// The connected wallet.
pub trait WalletProvider: Send + Sync {
    /// Account currently selected in the wallet, if any.
    fn current_account(&self) -> Option<Address>;

    fn is_connected(&self) -> bool {
        self.current_account().is_some()
    }
}

/// Read-only view of the staking contract.
///
/// `Ok(None)` means the value is not yet available. It is never the same
/// thing as a zero amount.
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Pool id of the native-token pool. Takes no account.
    async fn read_pool_id(&self) -> Result<Option<PoolId>, ChainError>;

    /// Native balance held by the wallet itself.
    async fn read_wallet_balance(&self, account: Address) -> Result<Option<Amount>, ChainError>;

    async fn read_staking_balance(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<Amount>, ChainError>;

    async fn read_withdraw_amounts(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<WithdrawAmounts>, ChainError>;

    async fn read_pending_rewards(
        &self,
        pool_id: PoolId,
        account: Address,
    ) -> Result<Option<Amount>, ChainError>;
}

/// Mutating calls on the staking contract, signed by the connected wallet.
///
/// Each call returns as soon as the wallet has broadcast the transaction.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// Deposit `amount` of native tokens as the call value.
    async fn deposit(&self, amount: Amount) -> Result<TxHash, WriteError>;

    async fn request_unstake(&self, pool_id: PoolId, amount: Amount) -> Result<TxHash, WriteError>;

    /// Pay out everything whose unlock period has ended.
    async fn withdraw(&self, pool_id: PoolId) -> Result<TxHash, WriteError>;

    async fn claim(&self, pool_id: PoolId) -> Result<TxHash, WriteError>;

    /// Wait until `tx_hash` is included. A revert is reported as
    /// [`WriteError::Reverted`].
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WriteError>;
}

/// Sink for user-facing toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
