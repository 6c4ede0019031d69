//! Playback scenarios exercised by the simulator.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SYNC-001: Random slider drags, including out-of-range and NaN values
    ScrubSlider,

    /// SYNC-002: Typed frame indices, including values past the end
    TypeInput,

    /// SYNC-003: Play/pause cycles with delayed pause confirmation
    PlayPause,

    /// SYNC-004: Arrow-key jumps of ±3 seconds
    ArrowJump,

    /// SYNC-005: Canvas resized while a distortion table is being built
    ResizeDuringPrecompute,

    /// SYNC-006: Play into the end of the survey, then play again
    EndOfSurvey,

    /// SYNC-007: Survey without timestamps, constant frame rate
    FixedFps,

    /// SYNC-008: Playback speed changes while playing
    SpeedChange,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::ScrubSlider,
            ScenarioId::TypeInput,
            ScenarioId::PlayPause,
            ScenarioId::ArrowJump,
            ScenarioId::ResizeDuringPrecompute,
            ScenarioId::EndOfSurvey,
            ScenarioId::FixedFps,
            ScenarioId::SpeedChange,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::ScrubSlider => "scrub_slider",
            ScenarioId::TypeInput => "type_input",
            ScenarioId::PlayPause => "play_pause",
            ScenarioId::ArrowJump => "arrow_jump",
            ScenarioId::ResizeDuringPrecompute => "resize_during_precompute",
            ScenarioId::EndOfSurvey => "end_of_survey",
            ScenarioId::FixedFps => "fixed_fps",
            ScenarioId::SpeedChange => "speed_change",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::ScrubSlider => "200 random slider drags, controls and video must agree after each",
            ScenarioId::TypeInput => "Typed indices incl. past-the-end values, clamped and mirrored to the slider",
            ScenarioId::PlayPause => "Play/pause cycles, position keeps following frames until the pause is confirmed",
            ScenarioId::ArrowJump => "±3 s keyboard jumps land on the first frame at or beyond the target time",
            ScenarioId::ResizeDuringPrecompute => "Stale distortion tables are discarded after a resize",
            ScenarioId::EndOfSurvey => "Playback pins the last frame, the next play restarts from frame 0",
            ScenarioId::FixedFps => "Constant-rate video time without a timestamp file",
            ScenarioId::SpeedChange => "0.5x/2x playback, invalid rates rejected",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scrub_slider" | "scrub" | "sync-001" => Ok(ScenarioId::ScrubSlider),
            "type_input" | "input" | "sync-002" => Ok(ScenarioId::TypeInput),
            "play_pause" | "playpause" | "sync-003" => Ok(ScenarioId::PlayPause),
            "arrow_jump" | "arrows" | "sync-004" => Ok(ScenarioId::ArrowJump),
            "resize_during_precompute" | "resize" | "sync-005" => Ok(ScenarioId::ResizeDuringPrecompute),
            "end_of_survey" | "end" | "sync-006" => Ok(ScenarioId::EndOfSurvey),
            "fixed_fps" | "fps" | "sync-007" => Ok(ScenarioId::FixedFps),
            "speed_change" | "speed" | "sync-008" => Ok(ScenarioId::SpeedChange),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>().unwrap(), id);
            assert!(!id.description().is_empty());
        }
        assert_eq!("SYNC-005".parse::<ScenarioId>().unwrap(), ScenarioId::ResizeDuringPrecompute);
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
