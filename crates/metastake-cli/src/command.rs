//! Shell commands.

use std::str::FromStr;

use metastake_core::{ActionKind, Amount};

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a staking action with the raw amount as typed.
    Action { kind: ActionKind, input: String },
    /// Fill in the largest allowed amount and run the action.
    Max(ActionKind),
    Status,
    Pending,
    Sync,

    // Simulated chain controls
    Unlock,
    Accrue(Amount),
    Hold,
    Release,
    Reject,
    Revert(String),

    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("Empty command".to_string());
        };
        let rest: Vec<&str> = parts.collect();
        let arg = rest.join(" ");

        let command = match head.to_lowercase().as_str() {
            "status" | "s" => Command::Status,
            "pending" | "p" => Command::Pending,
            "sync" => Command::Sync,
            "unlock" => Command::Unlock,
            "accrue" => Command::Accrue(arg.parse().map_err(|e| format!("{}", e))?),
            "hold" => Command::Hold,
            "release" => Command::Release,
            "reject" => Command::Reject,
            "revert" => Command::Revert(if arg.is_empty() {
                "execution reverted".to_string()
            } else {
                arg
            }),
            "max" => Command::Max(arg.parse()?),
            "help" | "h" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => {
                let kind: ActionKind = other.parse()?;
                if kind.takes_amount() && arg.eq_ignore_ascii_case("max") {
                    Command::Max(kind)
                } else {
                    Command::Action { kind, input: arg }
                }
            }
        };
        Ok(command)
    }
}

pub fn help_text() -> &'static str {
    "\
Actions:
  stake <amount>      deposit native tokens
  unstake <amount>    start the unlock period
  withdraw <amount>   withdraw unlocked tokens
  claim               collect rewards
  <action> max        use the largest allowed amount
Info:
  status              balances of the connected account
  pending             transactions in flight
  sync                re-read everything from the contract
Simulation:
  unlock              end the unlock period
  accrue <amount>     credit rewards
  hold / release      hold back or release confirmations
  reject              wallet rejects the next request
  revert [reason]     next included transaction reverts
  quit"
}
