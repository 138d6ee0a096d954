pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod harness;
pub mod input;
pub mod pacer;
pub mod renderer;
pub mod scripts;
pub mod textures;

pub use app::{run, run_with_overrides, App};
