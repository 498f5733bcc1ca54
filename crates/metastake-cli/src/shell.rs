//! Interactive prompt driving the controller.

use std::sync::Arc;

use color_eyre::Result;
use metastake_chain::{ControllerEvent, Notification, SimulatedPool, StakingController};
use metastake_core::{ActionKind, Address, AttemptState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::command::{Command, help_text};

pub struct Shell {
    controller: StakingController,
    pool: Arc<SimulatedPool>,
    account: Address,
}

impl Shell {
    pub fn new(controller: StakingController, pool: Arc<SimulatedPool>, account: Address) -> Self {
        Self {
            controller,
            pool,
            account,
        }
    }

    /// Read commands until `quit` or end of input.
    pub async fn run(&self, mut notes: mpsc::UnboundedReceiver<Notification>) -> Result<()> {
        let mut events = self.controller.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        self.print_status();
        println!("Type 'help' for commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.execute(command).await,
                        Err(e) => println!("{}", e),
                    }
                }
                Some(note) = notes.recv() => {
                    println!("{} {}: {}", note.severity.icon(), note.title, note.message);
                }
                event = events.recv() => match event {
                    Ok(ControllerEvent::Settled { state: AttemptState::Confirmed { .. }, .. }) => {
                        self.print_status();
                    }
                    Ok(ControllerEvent::StateChanged { id, kind, state }) => {
                        tracing::debug!("{} {} is now {}", kind, id, state.label());
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} controller events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::Action { kind, input } => self.perform(kind, &input),
            Command::Max(kind) => match self.controller.max_amount(kind) {
                Some(max) => {
                    println!("{} {}", kind, max);
                    self.perform(kind, &max);
                }
                None => println!("No maximum available for {}", kind),
            },
            Command::Status => self.print_status(),
            Command::Pending => self.print_pending(),
            Command::Sync => self.sync().await,
            Command::Unlock => {
                self.pool.unlock(self.account);
                self.sync().await;
            }
            Command::Accrue(amount) => {
                self.pool.accrue_rewards(self.account, amount);
                self.sync().await;
            }
            Command::Hold => {
                self.pool.hold_confirmations();
                println!("Confirmations on hold");
            }
            Command::Release => {
                self.pool.release_confirmations();
                println!("Confirmations released");
            }
            Command::Reject => self.pool.reject_next(),
            Command::Revert(reason) => self.pool.revert_next(reason),
            Command::Help => println!("{}", help_text()),
            Command::Quit => {}
        }
    }

    fn perform(&self, kind: ActionKind, input: &str) {
        // Refusals already reach the user as notifications.
        if let Ok(id) = self.controller.perform_action(kind, input) {
            println!("{} {} started", kind, id);
        }
    }

    async fn sync(&self) {
        match self.controller.sync_account().await {
            Ok(()) => self.print_status(),
            Err(e) => println!("Sync failed: {}", e),
        }
    }

    fn print_status(&self) {
        let summary = self.controller.summary();
        println!(
            "Account:         {}",
            summary.account.as_deref().unwrap_or("not connected")
        );
        println!("Wallet balance:  {}", summary.wallet_balance);
        println!("Staked:          {}", summary.staked);
        println!("Withdrawable:    {}", summary.withdrawable);
        println!("Pending unlock:  {}", summary.pending_unlock);
        println!("Pending rewards: {}", summary.pending_rewards);
    }

    fn print_pending(&self) {
        let attempts = self.controller.attempts();
        if attempts.is_empty() {
            println!("No transactions in flight");
            return;
        }
        for attempt in attempts {
            let amount = attempt
                .amount
                .map(|a| format!(" {}", a))
                .unwrap_or_default();
            let hash = attempt
                .state
                .tx_hash()
                .map(|h| format!(" {}", h))
                .unwrap_or_default();
            println!(
                "{} {}{}: {}{}",
                attempt.id,
                attempt.kind,
                amount,
                attempt.state.label(),
                hash
            );
        }
    }
}
