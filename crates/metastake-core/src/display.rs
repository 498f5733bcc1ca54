//! Display types for UI frontends.
//!
//! Renderers only ever see strings; unavailable reads show as `"0"`, the
//! same way the staking pages always have.

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, to_display_string};
use crate::types::ActionKind;
use crate::validation::ReadSnapshot;

/// Dashboard numbers for the connected account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StakingSummary {
    /// Truncated account address, if connected.
    pub account: Option<String>,
    pub wallet_balance: String,
    pub staked: String,
    pub withdrawable: String,
    pub pending_unlock: String,
    pub pending_rewards: String,
}

impl StakingSummary {
    pub fn from_snapshot(snapshot: &ReadSnapshot) -> Self {
        let withdraw = snapshot.withdraw_amounts.unwrap_or_default();
        Self {
            account: snapshot
                .account
                .map(|a| truncate_address(&a.to_string(), 6, 4)),
            wallet_balance: format_or_zero(snapshot.wallet_balance),
            staked: format_or_zero(snapshot.staking_balance),
            withdrawable: to_display_string(withdraw.withdrawable),
            pending_unlock: to_display_string(withdraw.pending_unlock),
            pending_rewards: format_or_zero(snapshot.pending_rewards),
        }
    }

    /// Returns true if the account has any staked funds.
    pub fn is_staking(&self) -> bool {
        self.staked != "0"
    }

    /// Returns true if there are rewards to claim.
    pub fn has_pending_rewards(&self) -> bool {
        self.pending_rewards != "0"
    }
}

/// Largest amount the user may enter for `kind`, as a display string.
///
/// `None` for claim (no amount) and while the bounding value is unavailable.
pub fn max_input(kind: ActionKind, snapshot: &ReadSnapshot) -> Option<String> {
    let bound = match kind {
        ActionKind::Stake => snapshot.wallet_balance,
        ActionKind::Unstake => snapshot.staking_balance,
        ActionKind::Withdraw => snapshot.withdraw_amounts.map(|w| w.withdrawable),
        ActionKind::Claim => None,
    };
    bound.map(to_display_string)
}

fn format_or_zero(amount: Option<Amount>) -> String {
    to_display_string(amount.unwrap_or(Amount::ZERO))
}

/// Shorten an address to `prefix...suffix`.
pub fn truncate_address(address: &str, prefix_len: usize, suffix_len: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= prefix_len + suffix_len + 3 {
        return address.to_string();
    }
    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[chars.len() - suffix_len..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
