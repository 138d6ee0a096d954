use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Mat4;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};

use crate::commands::build_batches;
use crate::config::{AppConfig, AppConfigOverrides, SaveFile};
use crate::input::{InputQueue, TouchEvent, TouchPhase};
use crate::pacer::FramePacer;
use crate::renderer::{RenderContext, Renderer};
use crate::scripts::{RhaiScript, ScriptBridge};
use crate::textures::TextureSet;

pub async fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default()).await
}

pub async fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default("assets/config.json");
    config.apply_overrides(&overrides);

    let source = fs::read_to_string(&config.script)
        .with_context(|| format!("Reading script {}", config.script))?;
    let script = RhaiScript::new(&source)?;
    println!("[app] loaded script {} ({} chars)", config.script, source.len());

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, Box::new(script));
    event_loop.run_app(&mut app)?;
    app.failure.map_or(Ok(()), Err)
}

struct PointerState {
    position: (f64, f64),
    dragging: bool,
}

pub struct App {
    config: AppConfig,
    renderer: Renderer,
    script: Box<dyn ScriptBridge>,
    queue: InputQueue,
    pacer: FramePacer,
    textures: Option<TextureSet>,
    state_path: PathBuf,
    next_frame_at: Instant,
    started: bool,
    should_close: bool,
    pointer: PointerState,
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: AppConfig, script: Box<dyn ScriptBridge>) -> Self {
        let renderer = Renderer::new(
            config.window.title.clone(),
            PhysicalSize::new(config.window.width, config.window.height),
            config.window.vsync,
        );
        let pacer = FramePacer::new(config.pacing.to_pacing(), Instant::now());
        let state_path = PathBuf::from(&config.state_file);
        Self {
            config,
            renderer,
            script,
            queue: InputQueue::new(),
            pacer,
            textures: None,
            state_path,
            next_frame_at: Instant::now(),
            started: false,
            should_close: false,
            pointer: PointerState { position: (0.0, 0.0), dragging: false },
            failure: None,
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        eprintln!("[app] fatal: {err:?}");
        self.failure = Some(err);
        self.should_close = true;
    }

    fn init_gpu_resources(&mut self) -> Result<()> {
        self.renderer.init_quad_pipeline();
        let (device, queue) = self.renderer.device_and_queue();
        let textures = TextureSet::load_all(
            device,
            queue,
            self.renderer.texture_layout(),
            self.renderer.sampler(),
            &self.config.textures,
        )?;
        println!("[app] loaded {} textures", textures.len());
        self.textures = Some(textures);
        Ok(())
    }

    fn enqueue_touch(&mut self, phase: TouchPhase, x: f64, y: f64) {
        let scale = self.config.coordinate_scale;
        self.queue.push(TouchEvent::new(phase, x * scale, y * scale));
        self.kick();
    }

    /// Cancels the pending idle wait and fires now. Collapses with any kick
    /// already pending, and never revives the loop once paused.
    fn kick(&mut self) {
        if self.pacer.is_paused() || self.should_close {
            return;
        }
        self.next_frame_at = Instant::now();
        if let Some(window) = self.renderer.window() {
            window.request_redraw();
        }
    }

    fn load_state(&mut self) {
        let blob = match SaveFile::read(&self.state_path) {
            Ok(file) => file.state,
            Err(_) if !self.state_path.exists() => String::new(),
            Err(err) => {
                eprintln!("[state] unreadable state file, starting fresh: {err}");
                String::new()
            }
        };
        println!("[state] load state: {} bytes", blob.len());
        if let Err(err) = self.script.load(&blob) {
            eprintln!("[state] script rejected saved state, starting fresh: {err}");
        }
    }

    fn save_state(&mut self) {
        let blob = match self.script.save() {
            Ok(blob) => blob,
            Err(err) => {
                eprintln!("[state] save failed: {err}");
                return;
            }
        };
        println!("[state] save state: {} bytes", blob.len());
        if let Err(err) = (SaveFile { state: blob }).write(&self.state_path) {
            eprintln!("[state] {err}");
        }
    }

    fn arm_next_frame(&mut self) {
        self.next_frame_at = Instant::now() + self.pacer.next_interval();
    }

    fn view_projection(&self) -> Mat4 {
        let size = self.renderer.size();
        Mat4::orthographic_rh(0.0, size.width.max(1) as f32, size.height.max(1) as f32, 0.0, -1.0, 1.0)
    }

    /// One update + render pass, frame-capped. Script errors skip the draw
    /// and leave the loop running; the next fire starts a fresh frame.
    fn render_frame(&mut self) {
        if self.pacer.is_paused() || self.should_close {
            return;
        }

        let delay = self.pacer.pace_delay(Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let dt_ms = self.pacer.begin_frame(Instant::now());
        if let Some(summary) = self.pacer.take_summary() {
            println!(
                "[pacer] rendered {} frames in last {} ms",
                summary.frames,
                summary.window.as_millis()
            );
        }

        let events = self.queue.drain();
        let had_input = !events.is_empty();
        let changed = match self.script.update(dt_ms, &events) {
            Ok(changed) => changed,
            Err(err) => {
                eprintln!("[script] update error: {err}");
                self.arm_next_frame();
                return;
            }
        };
        if had_input || changed {
            self.pacer.mark_activity();
        }

        let commands = match self.script.render() {
            Ok(commands) => commands,
            Err(err) => {
                eprintln!("[script] render error: {err}");
                self.arm_next_frame();
                return;
            }
        };

        let textures = self.textures.as_ref().expect("textures loaded before first frame");
        let frame = match build_batches(&commands, textures.infos()) {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("[render] rejected command stream: {err}");
                self.arm_next_frame();
                return;
            }
        };

        let [r, g, b] = self.config.clear_color;
        let ctx = RenderContext {
            view_proj: self.view_projection(),
            clear_color: wgpu::Color { r, g, b, a: 1.0 },
        };
        match self.renderer.draw_frame(&ctx, textures, &frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(anyhow::anyhow!("surface out of memory"));
                return;
            }
            Err(err) => {
                eprintln!("[render] surface error: {err}");
            }
        }

        self.arm_next_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.started {
            self.renderer.ensure_window(event_loop);
            if let Err(err) = self.init_gpu_resources() {
                self.fail(err);
                event_loop.exit();
                return;
            }
            let size = self.renderer.size();
            if let Err(err) = self.script.startup(size.width, size.height) {
                self.fail(err);
                event_loop.exit();
                return;
            }
            self.started = true;
        }
        self.load_state();
        self.pacer.resume(Instant::now());
        self.kick();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.pacer.pause();
        self.save_state();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.save_state();
                self.pacer.pause();
                self.should_close = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            WindowEvent::Touch(touch) => {
                let phase = match touch.phase {
                    winit::event::TouchPhase::Started => TouchPhase::Down,
                    winit::event::TouchPhase::Moved => TouchPhase::Move,
                    winit::event::TouchPhase::Ended | winit::event::TouchPhase::Cancelled => {
                        TouchPhase::Up
                    }
                };
                self.enqueue_touch(phase, touch.location.x, touch.location.y);
            }
            // Desktop hosts have no touch surface; a left-button drag stands
            // in for one.
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.position = (position.x, position.y);
                if self.pointer.dragging {
                    self.enqueue_touch(TouchPhase::Move, position.x, position.y);
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                let (x, y) = self.pointer.position;
                match state {
                    ElementState::Pressed => {
                        self.pointer.dragging = true;
                        self.enqueue_touch(TouchPhase::Down, x, y);
                    }
                    ElementState::Released => {
                        self.pointer.dragging = false;
                        self.enqueue_touch(TouchPhase::Up, x, y);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        if self.pacer.is_paused() {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        if Instant::now() >= self.next_frame_at {
            if let Some(window) = self.renderer.window() {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_at));
    }
}
