//! Optional pause between rounds.

use anyhow::{Context, Result};
use std::io::{self, Write};

/// Gate the driver passes through after each round.
///
/// The stores are flushed before the gate blocks, so ending the process
/// while waiting never loses an emitted round.
pub trait Gate {
    fn wait(&mut self, round: u32) -> Result<()>;
}

/// Gate that never blocks.
pub struct NoopGate;

impl Gate for NoopGate {
    fn wait(&mut self, _round: u32) -> Result<()> {
        Ok(())
    }
}

/// Gate that blocks until the user acknowledges on stdin.
pub struct StdinGate;

impl Gate for StdinGate {
    fn wait(&mut self, round: u32) -> Result<()> {
        print!("round {round} complete, press enter to continue...");
        io::stdout().flush().context("failed to flush stdout")?;

        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        Ok(())
    }
}
