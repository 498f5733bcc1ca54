//! Pre-flight checks run before any staking transaction is submitted.
//!
//! Validation works on a [`ReadSnapshot`] of the read cache. The snapshot may
//! lag the chain slightly; the contract stays the final arbiter.

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, AmountError, to_chain_units};
use crate::types::{ActionKind, Address, PoolId, WithdrawAmounts};

/// Point-in-time view of everything validation needs.
///
/// `None` means "not yet available", which is distinct from a zero amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSnapshot {
    pub account: Option<Address>,
    pub pool_id: Option<PoolId>,
    pub wallet_balance: Option<Amount>,
    pub staking_balance: Option<Amount>,
    pub withdraw_amounts: Option<WithdrawAmounts>,
    pub pending_rewards: Option<Amount>,
}

/// Why an action was refused before submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("pool information unavailable")]
    PoolUnavailable,

    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("wallet balance not yet available")]
    WalletBalanceUnavailable,

    #[error("insufficient wallet balance")]
    InsufficientBalance,

    #[error("staking balance not yet available")]
    StakingBalanceUnavailable,

    #[error("exceeds staked balance")]
    ExceedsStakedBalance,

    #[error("nothing available to withdraw")]
    NothingToWithdraw,

    #[error("exceeds withdrawable amount")]
    ExceedsWithdrawable,

    #[error("no pending rewards to claim")]
    NoPendingRewards,
}

/// Convert the raw user input for `kind` into chain units.
///
/// Claim carries no amount, so its input is ignored.
pub fn parse_action_input(kind: ActionKind, raw_input: &str) -> Result<Option<Amount>, ValidationError> {
    if !kind.takes_amount() {
        return Ok(None);
    }
    Ok(Some(to_chain_units(raw_input)?))
}

/// Check the preconditions of `kind` against the cached reads.
pub fn validate_action(
    kind: ActionKind,
    amount: Option<Amount>,
    snapshot: &ReadSnapshot,
) -> Result<(), ValidationError> {
    if snapshot.account.is_none() {
        return Err(ValidationError::NotConnected);
    }

    match kind {
        ActionKind::Stake => {
            let amount = positive(amount)?;
            let balance = snapshot
                .wallet_balance
                .ok_or(ValidationError::WalletBalanceUnavailable)?;
            if amount > balance {
                return Err(ValidationError::InsufficientBalance);
            }
        }
        ActionKind::Unstake => {
            require_pool(snapshot)?;
            let amount = positive(amount)?;
            let staked = snapshot
                .staking_balance
                .ok_or(ValidationError::StakingBalanceUnavailable)?;
            if amount > staked {
                return Err(ValidationError::ExceedsStakedBalance);
            }
        }
        ActionKind::Withdraw => {
            require_pool(snapshot)?;
            let withdrawable = snapshot
                .withdraw_amounts
                .map(|w| w.withdrawable)
                .filter(|w| !w.is_zero())
                .ok_or(ValidationError::NothingToWithdraw)?;
            let amount = positive(amount)?;
            if amount > withdrawable {
                return Err(ValidationError::ExceedsWithdrawable);
            }
        }
        ActionKind::Claim => {
            require_pool(snapshot)?;
            match snapshot.pending_rewards {
                Some(rewards) if !rewards.is_zero() => {}
                _ => return Err(ValidationError::NoPendingRewards),
            }
        }
    }
    Ok(())
}

fn require_pool(snapshot: &ReadSnapshot) -> Result<PoolId, ValidationError> {
    snapshot.pool_id.ok_or(ValidationError::PoolUnavailable)
}

fn positive(amount: Option<Amount>) -> Result<Amount, ValidationError> {
    match amount {
        Some(a) if !a.is_zero() => Ok(a),
        _ => Err(ValidationError::ZeroAmount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::UNIT;

    fn connected() -> ReadSnapshot {
        ReadSnapshot {
            account: Some("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap()),
            pool_id: Some(0),
            wallet_balance: Some(Amount::from_tokens(10)),
            staking_balance: Some(Amount::from_tokens(5)),
            withdraw_amounts: Some(WithdrawAmounts {
                withdrawable: Amount::from_tokens(2),
                pending_unlock: Amount::from_tokens(1),
            }),
            pending_rewards: Some(Amount::from_raw(UNIT / 10)),
        }
    }

    fn tokens(s: &str) -> Option<Amount> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_disconnected_rejects_everything() {
        let snapshot = ReadSnapshot::default();
        for kind in ActionKind::all() {
            assert_eq!(
                validate_action(*kind, tokens("1"), &snapshot),
                Err(ValidationError::NotConnected)
            );
        }
    }

    #[test]
    fn test_stake_within_balance() {
        assert_eq!(validate_action(ActionKind::Stake, tokens("10"), &connected()), Ok(()));
    }

    #[test]
    fn test_stake_does_not_need_pool() {
        let mut snapshot = connected();
        snapshot.pool_id = None;
        assert_eq!(validate_action(ActionKind::Stake, tokens("1"), &snapshot), Ok(()));
    }

    #[test]
    fn test_stake_over_balance() {
        assert_eq!(
            validate_action(ActionKind::Stake, tokens("10.000000000000000001"), &connected()),
            Err(ValidationError::InsufficientBalance)
        );
    }

    #[test]
    fn test_stake_zero() {
        assert_eq!(
            validate_action(ActionKind::Stake, tokens("0"), &connected()),
            Err(ValidationError::ZeroAmount)
        );
        assert_eq!(
            validate_action(ActionKind::Stake, None, &connected()),
            Err(ValidationError::ZeroAmount)
        );
    }

    #[test]
    fn test_stake_without_wallet_balance() {
        let mut snapshot = connected();
        snapshot.wallet_balance = None;
        assert_eq!(
            validate_action(ActionKind::Stake, tokens("1"), &snapshot),
            Err(ValidationError::WalletBalanceUnavailable)
        );
    }

    #[test]
    fn test_unstake_exceeds_staked_by_one_unit() {
        let result = validate_action(ActionKind::Unstake, tokens("5.000000000000000001"), &connected());
        assert_eq!(result, Err(ValidationError::ExceedsStakedBalance));
        assert_eq!(result.unwrap_err().to_string(), "exceeds staked balance");
    }

    #[test]
    fn test_unstake_full_balance() {
        assert_eq!(validate_action(ActionKind::Unstake, tokens("5"), &connected()), Ok(()));
    }

    #[test]
    fn test_unstake_requires_pool() {
        let mut snapshot = connected();
        snapshot.pool_id = None;
        assert_eq!(
            validate_action(ActionKind::Unstake, tokens("1"), &snapshot),
            Err(ValidationError::PoolUnavailable)
        );
    }

    #[test]
    fn test_unstake_without_staking_balance() {
        let mut snapshot = connected();
        snapshot.staking_balance = None;
        assert_eq!(
            validate_action(ActionKind::Unstake, tokens("1"), &snapshot),
            Err(ValidationError::StakingBalanceUnavailable)
        );
    }

    #[test]
    fn test_withdraw_nothing_available() {
        let mut snapshot = connected();
        snapshot.withdraw_amounts = Some(WithdrawAmounts {
            withdrawable: Amount::ZERO,
            pending_unlock: Amount::from_tokens(3),
        });
        assert_eq!(
            validate_action(ActionKind::Withdraw, tokens("1"), &snapshot),
            Err(ValidationError::NothingToWithdraw)
        );

        snapshot.withdraw_amounts = None;
        assert_eq!(
            validate_action(ActionKind::Withdraw, tokens("1"), &snapshot),
            Err(ValidationError::NothingToWithdraw)
        );
    }

    #[test]
    fn test_withdraw_checks_amount() {
        let snapshot = connected();
        assert_eq!(validate_action(ActionKind::Withdraw, tokens("2"), &snapshot), Ok(()));
        assert_eq!(
            validate_action(ActionKind::Withdraw, tokens("2.1"), &snapshot),
            Err(ValidationError::ExceedsWithdrawable)
        );
        assert_eq!(
            validate_action(ActionKind::Withdraw, tokens("0"), &snapshot),
            Err(ValidationError::ZeroAmount)
        );
    }

    #[test]
    fn test_claim_with_rewards() {
        assert_eq!(validate_action(ActionKind::Claim, None, &connected()), Ok(()));
    }

    #[test]
    fn test_claim_without_rewards() {
        let mut snapshot = connected();
        snapshot.pending_rewards = Some(Amount::ZERO);
        assert_eq!(
            validate_action(ActionKind::Claim, None, &snapshot),
            Err(ValidationError::NoPendingRewards)
        );
        snapshot.pending_rewards = None;
        assert_eq!(
            validate_action(ActionKind::Claim, None, &snapshot),
            Err(ValidationError::NoPendingRewards)
        );
    }

    #[test]
    fn test_parse_action_input() {
        assert_eq!(
            parse_action_input(ActionKind::Stake, "1.5"),
            Ok(Some(Amount::from_raw(UNIT + UNIT / 2)))
        );
        assert_eq!(parse_action_input(ActionKind::Claim, "garbage"), Ok(None));
        assert_eq!(
            parse_action_input(ActionKind::Unstake, "-1"),
            Err(ValidationError::InvalidAmount(AmountError::Negative))
        );
    }

    #[test]
    fn test_invalid_amount_message_passes_through() {
        let err = parse_action_input(ActionKind::Withdraw, "abc").unwrap_err();
        assert!(err.to_string().starts_with("Invalid amount"));
    }
}
