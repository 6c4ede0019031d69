//! Shared vocabulary between the playback core and its environment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which input is the authoritative writer of the playback
/// position for one update cycle.
///
/// Every position change carries exactly one source. Controls other than
/// the source are *derived* from the new position and never echo back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSource {
    /// The numeric frame-index input box
    NumericInput,

    /// The position slider (values are floored)
    Slider,

    /// An external seek performed on the media element itself
    MediaSeek,

    /// Keyboard stepping (arrow keys)
    Keyboard,
}

impl PositionSource {
    /// Returns true for sources that are user-facing controls.
    pub fn is_control(&self) -> bool {
        matches!(self, PositionSource::NumericInput | PositionSource::Slider)
    }
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionSource::NumericInput => "numeric_input",
            PositionSource::Slider => "slider",
            PositionSource::MediaSeek => "media_seek",
            PositionSource::Keyboard => "keyboard",
        };
        f.write_str(name)
    }
}

/// Notifications emitted by a media element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// A new frame was presented; `media_time` is the element's own clock (seconds).
    Frame { media_time: f64 },

    /// The element confirmed that playback has actually stopped.
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_source_display() {
        assert_eq!(PositionSource::NumericInput.to_string(), "numeric_input");
        assert_eq!(PositionSource::MediaSeek.to_string(), "media_seek");
    }

    #[test]
    fn test_position_source_is_control() {
        assert!(PositionSource::Slider.is_control());
        assert!(PositionSource::NumericInput.is_control());
        assert!(!PositionSource::Keyboard.is_control());
        assert!(!PositionSource::MediaSeek.is_control());
    }
}
