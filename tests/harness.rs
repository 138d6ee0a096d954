use anyhow::Result;
use siskin_engine::commands::build_batches;
use siskin_engine::harness::{run_script, HarnessOptions};
use siskin_engine::input::{TouchEvent, TouchPhase};
use siskin_engine::scripts::{RhaiScript, ScriptBridge};
use siskin_engine::textures::TextureInfo;

// A script pinned to one fixed quad per frame, sourced from the whole of a
// 10x10 texture at slot 0.
const FIXED_QUAD_SCRIPT: &str = r#"
    fn update(dt) { false }
    fn render() {
        [0.0, 0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
    }
"#;

#[test]
fn fixed_quad_script_draws_one_quad_per_frame() -> Result<()> {
    let mut script = RhaiScript::new(FIXED_QUAD_SCRIPT)?;
    let options = HarnessOptions { steps: 4, ..Default::default() };
    let report = run_script(&mut script, &options)?;

    assert_eq!(report.steps.len(), 4);
    for step in &report.steps {
        assert_eq!(step.quads, 1, "exactly one draw per frame");
        assert!(!step.changed);
    }

    // The frame decodes to a single batch with full-texture UVs and
    // identity-scaled placement at the origin.
    let frame = script.render()?;
    let batches = build_batches(&frame, &[TextureInfo { width: 10.0, height: 10.0 }])?;
    assert_eq!(batches.quad_count(), 1);
    assert_eq!(batches.batches.len(), 1);
    assert_eq!(batches.batches[0].texture_index, 0);
    assert_eq!(batches.instances[0].uv_rect, [0.0, 0.0, 1.0, 1.0]);
    Ok(())
}

#[test]
fn scheduled_touches_reach_the_script_on_their_step() -> Result<()> {
    const COUNTING_SCRIPT: &str = r#"
        fn startup(width, height) { this.taps = 0; }
        fn on_touch_down(x, y) { this.taps += 1; }
        fn update(dt) { false }
        fn render() {
            let cmds = [];
            for i in 0..this.taps {
                cmds += [0.0, 0.0, 0.0, 4.0, 4.0, i * 10.0, 0.0, 4.0, 4.0,
                         0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
            }
            cmds
        }
    "#;
    let mut script = RhaiScript::new(COUNTING_SCRIPT)?;
    let options = HarnessOptions {
        steps: 3,
        touches: vec![
            (1, TouchEvent::new(TouchPhase::Down, 5.0, 5.0)),
            (1, TouchEvent::new(TouchPhase::Down, 6.0, 6.0)),
        ],
        ..Default::default()
    };
    let report = run_script(&mut script, &options)?;

    assert_eq!(report.steps[0].quads, 0, "no taps yet");
    assert_eq!(report.steps[0].touches, 0);
    assert_eq!(report.steps[1].quads, 2, "both taps land on step 1");
    assert_eq!(report.steps[1].touches, 2);
    assert_eq!(report.steps[2].quads, 2, "taps persist");
    Ok(())
}

#[test]
fn harness_rejects_partial_quads() {
    const BROKEN_SCRIPT: &str = r#"
        fn update(dt) { false }
        fn render() { [1.0, 2.0, 3.0] }
    "#;
    let mut script = RhaiScript::new(BROKEN_SCRIPT).expect("compile");
    let err = run_script(&mut script, &HarnessOptions::default()).unwrap_err();
    assert!(err.to_string().contains("multiple of 16"), "got: {err}");
}
