//! Media element trait: the video's own clock.

use crate::EnvError;

/// The central interface to the playing video.
///
/// This trait abstracts the media element so that the playback synchronizer
/// can run against a real player and against a deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `WallClockMedia` - monotonic `Instant` clock
/// - **Simulation**: `SimMedia` - virtual clock with seeded latencies
///
/// # Pause semantics
///
/// `request_pause()` only *asks* the element to stop. Playback is considered
/// stopped once the element emits [`MediaEvent::Paused`](crate::MediaEvent);
/// frames presented in between are still delivered.
pub trait MediaElement {
    /// Current media time in seconds.
    fn current_time(&self) -> f64;

    /// Moves the media clock to `seconds`.
    ///
    /// Seeking must not by itself change the paused/playing state.
    fn seek(&mut self, seconds: f64);

    /// Starts playback from the current time.
    fn play(&mut self) -> Result<(), EnvError>;

    /// Requests a pause. Completion is signalled asynchronously.
    fn request_pause(&mut self);

    /// Returns true once the element has confirmed it is paused.
    fn is_paused(&self) -> bool;

    /// Sets the playback rate multiplier (1.0 = real time).
    fn set_playback_rate(&mut self, rate: f64) -> Result<(), EnvError>;

    /// Current playback rate multiplier.
    fn playback_rate(&self) -> f64;
}
