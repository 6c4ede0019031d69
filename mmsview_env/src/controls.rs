//! Control surface trait: the widgets that display the playback position.

/// Sink for every display element derived from the playback position.
///
/// The core calls these only for controls that were *not* the source of the
/// current update, so implementations never need to de-duplicate echoes.
pub trait ControlSurface {
    /// Moves the slider handle. `max` is the last valid frame index.
    fn set_slider(&mut self, position: usize, max: usize);

    /// Updates the numeric frame-index input. `max` is the last valid frame index.
    fn set_numeric_input(&mut self, position: usize, max: usize);

    /// Updates the `mm:ss` time label.
    fn set_time_label(&mut self, label: &str);

    /// Switches the play/pause indicator.
    fn set_playing(&mut self, playing: bool);

    /// Enables or disables all playback controls (disabled when no frames are loaded).
    fn set_enabled(&mut self, enabled: bool);
}
