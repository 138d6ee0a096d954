use siskin_engine::input::{TouchEvent, TouchPhase};
use siskin_engine::scripts::{RhaiScript, ScriptBridge};

// Deterministic script: every touch leaves a block, update slides them.
const BLOCKS_SCRIPT: &str = r#"
    fn startup(width, height) {
        this.width = width * 1.0;
        this.blocks = [];
    }
    fn on_touch_down(x, y) {
        this.blocks.push(#{ x: x, y: y });
    }
    fn update(dt) {
        let moving = false;
        let next = [];
        for block in this.blocks {
            if block.x < this.width {
                block.x += dt * 0.1;
                moving = true;
            }
            next.push(block);
        }
        this.blocks = next;
        moving
    }
    fn render() {
        let cmds = [];
        for block in this.blocks {
            cmds += [0.0, 0.0, 0.0, 8.0, 8.0,
                     block.x, block.y, 8.0, 8.0,
                     0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        }
        cmds
    }
    fn save() { to_json(this) }
    fn load(blob) { this.mixin(from_json(blob)); }
"#;

fn drive(script: &mut dyn ScriptBridge, dt: f64, frames: usize) {
    for _ in 0..frames {
        script.update(dt, &[]).expect("update");
    }
}

#[test]
fn saved_state_reproduces_identical_render_output() {
    let mut original = RhaiScript::new(BLOCKS_SCRIPT).expect("compile");
    original.startup(400, 300).expect("startup");
    original
        .update(16.0, &[TouchEvent::new(TouchPhase::Down, 20.0, 40.0)])
        .expect("touch frame");
    drive(&mut original, 16.0, 5);
    let blob = original.save().expect("save");

    let mut restored = RhaiScript::new(BLOCKS_SCRIPT).expect("compile");
    restored.startup(400, 300).expect("startup");
    restored.load(&blob).expect("load");

    // Identical subsequent inputs must produce identical frames.
    let inputs = [TouchEvent::new(TouchPhase::Down, 100.0, 120.0)];
    original.update(16.0, &inputs).expect("update");
    restored.update(16.0, &inputs).expect("update");
    drive(&mut original, 16.0, 3);
    drive(&mut restored, 16.0, 3);

    assert_eq!(
        original.render().expect("render"),
        restored.render().expect("render"),
        "restored script diverged from the original"
    );
}

#[test]
fn save_immediately_after_load_round_trips() {
    let mut script = RhaiScript::new(BLOCKS_SCRIPT).expect("compile");
    script.startup(400, 300).expect("startup");
    script
        .update(16.0, &[TouchEvent::new(TouchPhase::Down, 1.0, 2.0)])
        .expect("update");

    let blob = script.save().expect("save");
    script.load(&blob).expect("load");
    assert_eq!(script.save().expect("save"), blob, "save/load/save must be stable");
}

#[test]
fn touch_events_dispatch_in_order() {
    const TRACE_SCRIPT: &str = r#"
        fn startup(width, height) { this.trace = ""; }
        fn on_touch_down(x, y) { this.trace += "d"; }
        fn on_touch_move(x, y) { this.trace += "m"; }
        fn on_touch_up(x, y) { this.trace += "u"; }
        fn update(dt) { false }
        fn save() { this.trace }
    "#;
    let mut script = RhaiScript::new(TRACE_SCRIPT).expect("compile");
    script.startup(100, 100).expect("startup");
    let gesture = [
        TouchEvent::new(TouchPhase::Down, 0.0, 0.0),
        TouchEvent::new(TouchPhase::Move, 1.0, 0.0),
        TouchEvent::new(TouchPhase::Move, 2.0, 0.0),
        TouchEvent::new(TouchPhase::Up, 2.0, 0.0),
    ];
    script.update(16.0, &gesture).expect("update");
    assert_eq!(script.save().expect("save"), "dmmu", "handlers must fire in event order");
}
