use std::fs;

use anyhow::{Context, Result};
use siskin_engine::harness::{run_script, HarnessOptions};
use siskin_engine::scripts::RhaiScript;

/// Headless script driver: runs a script for a fixed number of steps with no
/// window or GPU and prints a JSON report of what it would have drawn.
///
/// Usage: harness <script.rhai> [steps] [dt_ms]
fn main() {
    if let Err(err) = run() {
        eprintln!("[harness] {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let script_path = args.next().context("Usage: harness <script.rhai> [steps] [dt_ms]")?;
    let mut options = HarnessOptions::default();
    if let Some(steps) = args.next() {
        options.steps = steps.parse().with_context(|| format!("Invalid steps '{steps}'"))?;
    }
    if let Some(dt) = args.next() {
        options.dt_ms = dt.parse().with_context(|| format!("Invalid dt '{dt}'"))?;
    }

    let source =
        fs::read_to_string(&script_path).with_context(|| format!("Reading {script_path}"))?;
    let mut script = RhaiScript::new(&source)?;
    let report = run_script(&mut script, &options)?;
    println!("{}", serde_json::to_string_pretty(&report).context("Serializing report")?);
    Ok(())
}
