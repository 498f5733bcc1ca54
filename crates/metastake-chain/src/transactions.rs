//! Contract calls built from validated user actions.

use metastake_core::{ActionKind, Amount, PoolId, TxHash, ValidationError};

use crate::client::ContractWriter;
use crate::error::WriteError;

/// One mutating call on the staking contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCall {
    /// Native deposit into the native-token pool.
    Deposit { amount: Amount },
    /// Start the unlock period for `amount` of staked tokens.
    RequestUnstake { pool_id: PoolId, amount: Amount },
    /// Pay out all unlocked tokens.
    Withdraw { pool_id: PoolId },
    /// Collect accrued rewards.
    Claim { pool_id: PoolId },
}

impl WriteCall {
    /// Build the call for an action that already passed validation.
    ///
    /// Withdraw pays out everything unlocked, so its amount is only used for
    /// validation and never reaches the contract.
    pub fn for_action(
        kind: ActionKind,
        amount: Option<Amount>,
        pool_id: Option<PoolId>,
    ) -> Result<Self, ValidationError> {
        let pool = || pool_id.ok_or(ValidationError::PoolUnavailable);
        let amount = || amount.ok_or(ValidationError::ZeroAmount);
        Ok(match kind {
            ActionKind::Stake => WriteCall::Deposit { amount: amount()? },
            ActionKind::Unstake => WriteCall::RequestUnstake {
                pool_id: pool()?,
                amount: amount()?,
            },
            ActionKind::Withdraw => WriteCall::Withdraw { pool_id: pool()? },
            ActionKind::Claim => WriteCall::Claim { pool_id: pool()? },
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            WriteCall::Deposit { .. } => ActionKind::Stake,
            WriteCall::RequestUnstake { .. } => ActionKind::Unstake,
            WriteCall::Withdraw { .. } => ActionKind::Withdraw,
            WriteCall::Claim { .. } => ActionKind::Claim,
        }
    }

    /// Human-readable description of the call.
    pub fn description(&self) -> String {
        match self {
            WriteCall::Deposit { amount } => format!("depositETH(value: {})", amount),
            WriteCall::RequestUnstake { pool_id, amount } => {
                format!("unstake(pid: {}, amount: {})", pool_id, amount)
            }
            WriteCall::Withdraw { pool_id } => format!("withdraw(pid: {})", pool_id),
            WriteCall::Claim { pool_id } => format!("claim(pid: {})", pool_id),
        }
    }

    /// Hand the call to the wallet for signing and broadcast.
    pub async fn send(&self, writer: &dyn ContractWriter) -> Result<TxHash, WriteError> {
        match *self {
            WriteCall::Deposit { amount } => writer.deposit(amount).await,
            WriteCall::RequestUnstake { pool_id, amount } => {
                writer.request_unstake(pool_id, amount).await
            }
            WriteCall::Withdraw { pool_id } => writer.withdraw(pool_id).await,
            WriteCall::Claim { pool_id } => writer.claim(pool_id).await,
        }
    }
}
