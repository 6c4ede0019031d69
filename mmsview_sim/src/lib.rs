//! MMS View Deterministic Playback Simulation Harness
//!
//! This crate replaces the browser around the playback core with a
//! controlled environment where a whole viewing session runs
//! deterministically.
//!
//! # Core Principle: Virtual Media Clock
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: The simulated video advances only when the harness ticks it
//! - **Latency**: Pause confirmation delay and frame jitter come from a seeded RNG
//! - **Input**: Slider drags, typed indices and key presses derive from the same seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimWorld (synthetic survey or project files)         │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                          │                                  │
//! │                  ┌───────▼────────┐                         │
//! │   SimMedia ◄────►│ PlaybackContext│◄────► SimControls       │
//! │ (virtual clock)  └───────┬────────┘     (records writes)    │
//! │                          │                                  │
//! │                  invariant check after every event          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mmsview_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_frames(500).run(ScenarioId::PlayPause);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod project;
mod runner;
mod world;
pub mod scenarios;

pub use context::{MediaTiming, SimControls, SimMedia};
pub use exporter::{SimExport, SimFrame};
pub use project::{ProjectConfig, ProjectError};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
