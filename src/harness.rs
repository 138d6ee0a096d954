use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::commands::quad_count;
use crate::input::TouchEvent;
use crate::scripts::ScriptBridge;

/// Drives a script through the full bridge surface without a window or GPU:
/// startup, scripted touches, fixed-step updates, render validation, and a
/// final save. Integration tests and the `harness` binary both run on this.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub steps: usize,
    pub dt_ms: f64,
    pub width: u32,
    pub height: u32,
    /// Touches delivered before the update of the step they are keyed to.
    pub touches: Vec<(usize, TouchEvent)>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self { steps: 8, dt_ms: 1000.0 / 30.0, width: 720, height: 1280, touches: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub touches: usize,
    pub changed: bool,
    pub quads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessReport {
    pub steps: Vec<StepReport>,
    pub final_state: String,
}

impl HarnessReport {
    pub fn total_quads(&self) -> usize {
        self.steps.iter().map(|s| s.quads).sum()
    }
}

pub fn run_script(script: &mut dyn ScriptBridge, options: &HarnessOptions) -> Result<HarnessReport> {
    script.startup(options.width, options.height)?;

    let mut steps = Vec::with_capacity(options.steps);
    for step in 0..options.steps {
        let events: Vec<TouchEvent> = options
            .touches
            .iter()
            .filter(|(at, _)| *at == step)
            .map(|(_, event)| *event)
            .collect();
        let changed = script.update(options.dt_ms, &events)?;
        let frame = script.render()?;
        let quads = quad_count(&frame)?;
        steps.push(StepReport { step, touches: events.len(), changed, quads });
    }

    let final_state = script.save()?;
    Ok(HarnessReport { steps, final_state })
}
