//! MMS View Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam between the playback core and the
//! outside world, allowing the synchronizer to run against a **real** media
//! element (browser video, native decoder) or a **simulated** one.
//!
//! # Core Concept
//!
//! The core never reads a clock or touches a widget directly. Everything it
//! needs from the environment goes through two traits:
//! - [`MediaElement`]: the video's own clock (`current_time()`, `seek()`,
//!   `play()`, `request_pause()`)
//! - [`ControlSurface`]: the slider, numeric input, time label and play button
//!
//! Media progress arrives as [`MediaEvent`]s, tagged with a frame clock that
//! belongs to the element, never to a fixed timer.
//!
//! # Example
//!
//! ```ignore
//! use mmsview_env::{MediaElement, MediaEvent, WallClockMedia};
//!
//! let mut media = WallClockMedia::new(120.0);
//! media.play()?;
//! while let Some(event) = media.poll() {
//!     sync.handle(PlaybackEvent::Media(event), &mut media, &mut controls);
//! }
//! ```

mod controls;
mod error;
mod media;
mod types;
mod wall_clock;

pub use controls::ControlSurface;
pub use error::EnvError;
pub use media::MediaElement;
pub use types::{MediaEvent, PositionSource};
pub use wall_clock::WallClockMedia;
