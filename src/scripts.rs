use anyhow::{anyhow, Context, Result};
use rand::Rng;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST};

use crate::input::{TouchEvent, TouchPhase};

/// Fixed call surface between the engine and the embedded script. The pacer
/// and the command interpreter only ever see this trait, never a concrete
/// scripting engine's value representation.
pub trait ScriptBridge {
    fn startup(&mut self, width: u32, height: u32) -> Result<()>;
    fn update(&mut self, dt_ms: f64, events: &[TouchEvent]) -> Result<bool>;
    fn render(&mut self) -> Result<Vec<f64>>;
    fn save(&mut self) -> Result<String>;
    fn load(&mut self, state: &str) -> Result<()>;
}

pub struct RhaiScript {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    state: Dynamic,
}

impl RhaiScript {
    /// Compiles the script and runs its top-level code once. Any failure here
    /// is fatal to startup.
    pub fn new(source: &str) -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        register_host_api(&mut engine);

        let ast = engine.compile(source).context("Compiling script")?;
        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| anyhow!("Running script top-level: {err}"))?;

        Ok(Self { engine, ast, scope, state: Dynamic::from(Map::new()) })
    }

    /// Calls a script function with the persistent state map bound as `this`.
    /// A function the script never defined is not an error.
    fn call<T: rhai::Variant + Clone>(
        &mut self,
        name: &str,
        args: impl FuncArgs,
    ) -> Result<Option<T>> {
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut self.state);
        match self.engine.call_fn_with_options::<T>(options, &mut self.scope, &self.ast, name, args) {
            Ok(value) => Ok(Some(value)),
            Err(err) if is_function_missing(&err, name) => Ok(None),
            Err(err) => Err(anyhow!("Script {name}: {err}")),
        }
    }
}

fn is_function_missing(err: &EvalAltResult, name: &str) -> bool {
    // Signatures read "name (types)"; match the name exactly so a missing
    // helper called *inside* the function still surfaces as an error.
    match err {
        EvalAltResult::ErrorFunctionNotFound(signature, _) => signature
            .strip_prefix(name)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with(' ')),
        _ => false,
    }
}

fn touch_handler_name(phase: TouchPhase) -> &'static str {
    match phase {
        TouchPhase::Down => "on_touch_down",
        TouchPhase::Move => "on_touch_move",
        TouchPhase::Up => "on_touch_up",
    }
}

impl ScriptBridge for RhaiScript {
    fn startup(&mut self, width: u32, height: u32) -> Result<()> {
        self.call::<()>("startup", (width as rhai::INT, height as rhai::INT))?;
        Ok(())
    }

    fn update(&mut self, dt_ms: f64, events: &[TouchEvent]) -> Result<bool> {
        for event in events {
            self.call::<()>(touch_handler_name(event.phase), (event.x, event.y))?;
        }
        Ok(self.call::<bool>("update", (dt_ms,))?.unwrap_or(false))
    }

    fn render(&mut self) -> Result<Vec<f64>> {
        let commands = match self.call::<rhai::Array>("render", ())? {
            Some(array) => array,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::with_capacity(commands.len());
        for value in commands {
            if let Ok(f) = value.as_float() {
                out.push(f);
            } else if let Ok(i) = value.as_int() {
                out.push(i as f64);
            } else {
                return Err(anyhow!(
                    "Script render: non-numeric value '{}' in command stream",
                    value.type_name()
                ));
            }
        }
        Ok(out)
    }

    fn save(&mut self) -> Result<String> {
        Ok(self.call::<String>("save", ())?.unwrap_or_default())
    }

    fn load(&mut self, state: &str) -> Result<()> {
        // An empty blob means "no saved state"; the script starts fresh.
        if state.is_empty() {
            return Ok(());
        }
        self.call::<()>("load", (state.to_string(),))?;
        Ok(())
    }
}

fn register_host_api(engine: &mut Engine) {
    engine.register_fn("log", |message: &str| {
        println!("[script] {message}");
    });
    engine.register_fn("rand", |min: f64, max: f64| -> f64 {
        if min < max {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        }
    });
    engine.register_fn("to_json", |map: Map| -> String {
        match serde_json::to_string(&map) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("[script] to_json error: {err}");
                String::new()
            }
        }
    });
    engine.register_fn("from_json", |text: &str| -> Map {
        serde_json::from_str::<Dynamic>(text)
            .ok()
            .and_then(|value| value.try_cast::<Map>())
            .unwrap_or_else(|| {
                eprintln!("[script] from_json: blob is not an object, starting fresh");
                Map::new()
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER_SCRIPT: &str = r#"
        fn startup(width, height) {
            this.width = width;
            this.height = height;
            this.ticks = 0;
        }
        fn update(dt) {
            this.ticks += 1;
            true
        }
        fn render() {
            [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, this.ticks * 1.0]
        }
        fn save() { to_json(this) }
        fn load(blob) { this.mixin(from_json(blob)); }
    "#;

    #[test]
    fn top_level_failure_is_fatal() {
        assert!(RhaiScript::new("let x = ;").is_err(), "syntax error must fail construction");
        assert!(RhaiScript::new("undefined_fn();").is_err(), "runtime error must fail construction");
    }

    #[test]
    fn missing_handlers_are_benign() {
        let mut script = RhaiScript::new("fn update(dt) { false }").expect("compile");
        script.startup(100, 100).expect("missing startup tolerated");
        let events =
            [TouchEvent::new(TouchPhase::Down, 1.0, 1.0), TouchEvent::new(TouchPhase::Up, 1.0, 1.0)];
        let changed = script.update(16.0, &events).expect("missing touch handlers tolerated");
        assert!(!changed);
        assert!(script.render().expect("missing render yields empty frame").is_empty());
        assert_eq!(script.save().expect("missing save yields empty blob"), "");
        script.load("").expect("empty blob is a no-op");
    }

    #[test]
    fn update_reports_script_changed_flag() {
        let mut script = RhaiScript::new(COUNTER_SCRIPT).expect("compile");
        script.startup(64, 48).expect("startup");
        assert!(script.update(16.0, &[]).expect("update"));
        let frame = script.render().expect("render");
        assert_eq!(frame.len(), 16);
        assert_eq!(frame[15], 1.0, "render sees state mutated by update");
    }

    #[test]
    fn errors_inside_script_functions_surface_as_errors() {
        let mut script =
            RhaiScript::new("fn update(dt) { this.missing.field }").expect("compile succeeds");
        assert!(script.update(16.0, &[]).is_err(), "runtime error inside update propagates");
    }

    #[test]
    fn state_round_trips_through_save_and_load() {
        let mut first = RhaiScript::new(COUNTER_SCRIPT).expect("compile");
        first.startup(64, 48).expect("startup");
        first.update(16.0, &[]).expect("update");
        first.update(16.0, &[]).expect("update");
        let blob = first.save().expect("save");
        assert!(!blob.is_empty());

        let mut second = RhaiScript::new(COUNTER_SCRIPT).expect("compile");
        second.startup(64, 48).expect("startup");
        second.load(&blob).expect("load");
        assert_eq!(second.render().expect("render"), first.render().expect("render"));
    }

    #[test]
    fn malformed_blob_does_not_crash() {
        let mut script = RhaiScript::new(COUNTER_SCRIPT).expect("compile");
        script.startup(64, 48).expect("startup");
        script.load("{not json").expect("malformed blob falls back to fresh state");
    }
}
