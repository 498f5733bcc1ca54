//! Core domain types for the staking front-end.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;

/// Identifier of an asset pool on the staking contract.
pub type PoolId = u64;

/// Error parsing a hex-encoded identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexParseError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    Hex(String),
}

fn parse_hex_fixed<const N: usize>(input: &str) -> Result<[u8; N], HexParseError> {
    let s = input.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() != N * 2 {
        return Err(HexParseError::Length {
            expected: N * 2,
            actual: s.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|e| HexParseError::Hex(e.to_string()))?;
    Ok(out)
}

/// A 20-byte account address, rendered as `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_fixed::<20>(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Chain handle of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_fixed::<32>(s).map(Self)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// The two withdraw-related amounts reported by the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAmounts {
    /// Unlocked and payable now.
    pub withdrawable: Amount,
    /// Still inside the unlock period.
    pub pending_unlock: Amount,
}

/// User-facing staking actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Deposit native tokens into the pool.
    Stake,
    /// Request release of staked tokens.
    Unstake,
    /// Withdraw unlocked tokens.
    Withdraw,
    /// Claim pending rewards.
    Claim,
}

impl ActionKind {
    /// Get display label for the action.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Stake => "Stake",
            ActionKind::Unstake => "Unstake",
            ActionKind::Withdraw => "Withdraw",
            ActionKind::Claim => "Claim",
        }
    }

    /// Get description for the action.
    pub fn description(&self) -> &'static str {
        match self {
            ActionKind::Stake => "Lock tokens in the pool to earn rewards",
            ActionKind::Unstake => "Start the unlock period for staked tokens",
            ActionKind::Withdraw => "Withdraw tokens whose unlock period has ended",
            ActionKind::Claim => "Collect accrued rewards",
        }
    }

    /// Whether the action carries a user-entered amount.
    pub fn takes_amount(&self) -> bool {
        !matches!(self, ActionKind::Claim)
    }

    /// Cached reads that must be re-fetched once the action is confirmed.
    pub fn refresh_fields(&self) -> &'static [CacheField] {
        match self {
            ActionKind::Stake => &[CacheField::StakingBalance, CacheField::WalletBalance],
            ActionKind::Unstake => &[CacheField::StakingBalance, CacheField::WithdrawAmounts],
            ActionKind::Withdraw => &[CacheField::WithdrawAmounts, CacheField::WalletBalance],
            ActionKind::Claim => &[CacheField::PendingRewards, CacheField::StakingBalance],
        }
    }

    /// Returns all actions.
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Stake,
            ActionKind::Unstake,
            ActionKind::Withdraw,
            ActionKind::Claim,
        ]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stake" | "deposit" => Ok(ActionKind::Stake),
            "unstake" => Ok(ActionKind::Unstake),
            "withdraw" => Ok(ActionKind::Withdraw),
            "claim" => Ok(ActionKind::Claim),
            _ => Err(format!(
                "Unknown action '{}'. Valid options: stake, unstake, withdraw, claim",
                s
            )),
        }
    }
}

/// Contract-derived values held by the read cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheField {
    PoolId,
    StakingBalance,
    WithdrawAmounts,
    PendingRewards,
    WalletBalance,
}

impl CacheField {
    pub fn label(&self) -> &'static str {
        match self {
            CacheField::PoolId => "Pool ID",
            CacheField::StakingBalance => "Staked Amount",
            CacheField::WithdrawAmounts => "Withdraw Amounts",
            CacheField::PendingRewards => "Pending Rewards",
            CacheField::WalletBalance => "Wallet Balance",
        }
    }

    /// Whether reading the field needs the pool id first.
    pub fn requires_pool(&self) -> bool {
        matches!(
            self,
            CacheField::StakingBalance | CacheField::WithdrawAmounts | CacheField::PendingRewards
        )
    }

    /// Returns all fields, pool id first.
    pub fn all() -> &'static [CacheField] {
        &[
            CacheField::PoolId,
            CacheField::WalletBalance,
            CacheField::StakingBalance,
            CacheField::WithdrawAmounts,
            CacheField::PendingRewards,
        ]
    }
}

/// Identifier of one transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why an attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("Transaction rejected in wallet")]
    WalletRejected,

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Confirmation timed out")]
    Timeout,
}

/// Lifecycle state of a transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttemptState {
    /// Created, nothing sent yet.
    #[default]
    Idle,
    /// Wallet asked to sign and broadcast.
    Submitting,
    /// Broadcast, waiting for inclusion.
    AwaitingConfirmation { tx_hash: TxHash },
    /// Included successfully.
    Confirmed { tx_hash: TxHash, block_number: u64 },
    /// Rejected, reverted or timed out.
    Failed {
        tx_hash: Option<TxHash>,
        reason: FailureReason,
    },
}

impl AttemptState {
    /// Check if the attempt reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Confirmed { .. } | AttemptState::Failed { .. }
        )
    }

    /// Check if the attempt is still in flight.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Chain handle, once the wallet has returned one.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            AttemptState::Idle | AttemptState::Submitting => None,
            AttemptState::AwaitingConfirmation { tx_hash }
            | AttemptState::Confirmed { tx_hash, .. } => Some(*tx_hash),
            AttemptState::Failed { tx_hash, .. } => *tx_hash,
        }
    }

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptState::Idle => "Idle",
            AttemptState::Submitting => "Submitting",
            AttemptState::AwaitingConfirmation { .. } => "Awaiting Confirmation",
            AttemptState::Confirmed { .. } => "Confirmed",
            AttemptState::Failed { .. } => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    #[test]
    fn test_address_roundtrip() {
        let addr: Address = ADDR.parse().unwrap();
        assert_eq!(addr.to_string(), ADDR);
    }

    #[test]
    fn test_address_accepts_missing_prefix_and_uppercase() {
        let a: Address = "5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED".parse().unwrap();
        let b: Address = ADDR.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_rejects_bad_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            HexParseError::Length {
                expected: 40,
                actual: 4
            }
        );
    }

    #[test]
    fn test_address_rejects_non_hex() {
        let result = "0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>();
        assert!(matches!(result, Err(HexParseError::Hex(_))));
    }

    #[test]
    fn test_tx_hash_display() {
        let hash = TxHash::new([0xab; 32]);
        let s = hash.to_string();
        assert!(s.starts_with("0xabab"));
        assert_eq!(s.len(), 66);
        assert_eq!(s.parse::<TxHash>().unwrap(), hash);
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(ActionKind::Stake.label(), "Stake");
        assert_eq!(ActionKind::Unstake.label(), "Unstake");
        assert_eq!(ActionKind::Withdraw.label(), "Withdraw");
        assert_eq!(ActionKind::Claim.label(), "Claim");
        assert!(!ActionKind::Claim.description().is_empty());
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("stake".parse::<ActionKind>(), Ok(ActionKind::Stake));
        assert_eq!("DEPOSIT".parse::<ActionKind>(), Ok(ActionKind::Stake));
        assert_eq!("Claim".parse::<ActionKind>(), Ok(ActionKind::Claim));
        assert!("bond".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_action_takes_amount() {
        assert!(ActionKind::Stake.takes_amount());
        assert!(ActionKind::Unstake.takes_amount());
        assert!(ActionKind::Withdraw.takes_amount());
        assert!(!ActionKind::Claim.takes_amount());
    }

    #[test]
    fn test_refresh_table() {
        assert!(ActionKind::Stake.refresh_fields().contains(&CacheField::StakingBalance));
        assert_eq!(
            ActionKind::Unstake.refresh_fields(),
            &[CacheField::StakingBalance, CacheField::WithdrawAmounts]
        );
        assert!(ActionKind::Withdraw.refresh_fields().contains(&CacheField::WithdrawAmounts));
        assert!(!ActionKind::Withdraw.refresh_fields().contains(&CacheField::StakingBalance));
        assert_eq!(
            ActionKind::Claim.refresh_fields(),
            &[CacheField::PendingRewards, CacheField::StakingBalance]
        );
    }

    #[test]
    fn test_no_action_refreshes_pool_id() {
        for kind in ActionKind::all() {
            assert!(!kind.refresh_fields().contains(&CacheField::PoolId));
        }
    }

    #[test]
    fn test_cache_field_requires_pool() {
        assert!(!CacheField::PoolId.requires_pool());
        assert!(!CacheField::WalletBalance.requires_pool());
        assert!(CacheField::StakingBalance.requires_pool());
        assert!(CacheField::WithdrawAmounts.requires_pool());
        assert!(CacheField::PendingRewards.requires_pool());
        assert_eq!(CacheField::all()[0], CacheField::PoolId);
    }

    #[test]
    fn test_attempt_state_pending() {
        let hash = TxHash::new([1; 32]);
        assert!(AttemptState::Idle.is_pending());
        assert!(AttemptState::Submitting.is_pending());
        assert!(AttemptState::AwaitingConfirmation { tx_hash: hash }.is_pending());
        assert!(
            AttemptState::Confirmed {
                tx_hash: hash,
                block_number: 7
            }
            .is_terminal()
        );
        assert!(
            AttemptState::Failed {
                tx_hash: None,
                reason: FailureReason::Timeout
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_attempt_state_tx_hash() {
        let hash = TxHash::new([2; 32]);
        assert_eq!(AttemptState::Submitting.tx_hash(), None);
        assert_eq!(
            AttemptState::AwaitingConfirmation { tx_hash: hash }.tx_hash(),
            Some(hash)
        );
        assert_eq!(
            AttemptState::Failed {
                tx_hash: Some(hash),
                reason: FailureReason::Reverted("out of gas".into())
            }
            .tx_hash(),
            Some(hash)
        );
    }

    #[test]
    fn test_attempt_state_labels() {
        assert_eq!(AttemptState::default().label(), "Idle");
        assert_eq!(AttemptState::Submitting.label(), "Submitting");
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::WalletRejected.to_string(),
            "Transaction rejected in wallet"
        );
        assert!(
            FailureReason::Reverted("exceeds balance".into())
                .to_string()
                .contains("exceeds balance")
        );
    }

    #[test]
    fn test_attempt_id_display() {
        assert_eq!(AttemptId(12).to_string(), "#12");
    }
}
