use std::time::Duration;

use anyhow::{Result, bail, ensure};
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::ShellSession;
use crate::target::TargetDescriptor;

/// Driver states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum DriverState {
    Off,
    Booted,
    Shell,
}

/// Driver state machine for one board.
///
/// Power and boot are owned by the lab infrastructure; what this strategy
/// adds is the ordered walk up to `Shell` and the liveness probe that decides
/// when the shell is actually usable. A failed transition is fatal for the
/// whole test session.
pub struct BoardStrategy {
    session: ShellSession,
    state: DriverState,
    probe_deadline: Duration,
}

impl BoardStrategy {
    pub fn new(target: &TargetDescriptor) -> Self {
        Self {
            session: ShellSession::new(target),
            state: DriverState::Off,
            probe_deadline: Duration::from_secs(60),
        }
    }

    pub fn with_probe_deadline(mut self, deadline: Duration) -> Self {
        self.probe_deadline = deadline;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Walk the state machine forward until `wanted` is reached.
    pub async fn transition(&mut self, wanted: DriverState) -> Result<()> {
        if wanted < self.state {
            bail!(
                "Cannot transition backwards from {current} to {wanted}",
                current = self.state
            );
        }

        while self.state < wanted {
            match self.state {
                DriverState::Off => {
                    debug!("Board power is managed by the lab, marking booted");
                    self.state = DriverState::Booted;
                }
                DriverState::Booted => {
                    self.wait_for_shell().await?;
                    self.state = DriverState::Shell;
                    info!(
                        "Shell ready on {host}",
                        host = self.session.host()
                    );
                }
                DriverState::Shell => unreachable!("Shell is the final state"),
            }
        }

        Ok(())
    }

    /// The shell handle. Only valid once the strategy has reached `Shell`.
    pub fn shell(&self) -> Result<&ShellSession> {
        ensure!(
            self.state == DriverState::Shell,
            "Shell not available in state {state}",
            state = self.state
        );
        Ok(&self.session)
    }

    async fn wait_for_shell(&self) -> Result<()> {
        let deadline = Instant::now() + self.probe_deadline;
        let interval = Duration::from_secs(2);

        loop {
            let probe = self.session.run("true").await?;
            if probe.success() {
                return Ok(());
            }

            if Instant::now() + interval > deadline {
                bail!(
                    "Shell on {host} not reachable within {deadline}",
                    host = self.session.host(),
                    deadline = humantime::format_duration(self.probe_deadline)
                );
            }

            debug!(
                "Shell probe failed (status {status}), retrying",
                status = probe.status
            );
            tokio::time::sleep(interval).await;
        }
    }
}
