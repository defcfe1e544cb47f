//! Delay task: log a value, then block the calling thread.

use std::thread;
use std::time::Duration;

use log::info;

use super::TaskContext;
use crate::error::Result;
use crate::workflow::Operand;

/// Resolves `input`, logs it, and sleeps for `duration` delay units.
pub fn run(ctx: &TaskContext<'_>, input: &Operand, duration: u64, unit: Duration) -> Result<()> {
    let value = match input {
        Operand::Literal(text) => text.clone(),
        Operand::Reference(key) => ctx.store.get(key)?.to_string(),
    };

    info!("{} Executing Delay ({}, {})", ctx.path, value, duration);

    let multiplier = u32::try_from(duration).unwrap_or(u32::MAX);
    thread::sleep(unit.saturating_mul(multiplier));
    Ok(())
}
