//! Project descriptor: which survey files make up one session.
//!
//! ```toml
//! directory = "surveys/line_12"
//! translations = "translations.csv"
//! rotations = "rotations.csv"
//! timestamps = "camera_timestamps.csv"
//! calibration = "calibration.yaml"
//! polylines = ["rail_left.csv", "rail_right.csv"]
//!
//! [profiles]
//! translation_prefix = "profile_translations"
//! rotation_prefix = "profile_rotations"
//! ```

use crate::world::SimWorld;
use mmsview_core::context::Survey;
use mmsview_core::loading::{self, ProfileFiles};
use mmsview_core::playback::TimeAxis;
use mmsview_core::pose::{AxisConvention, CameraEulerSigns, PoseSequence};
use mmsview_core::profile::ProfileSet;
use mmsview_core::LoadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("cannot read project file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Prefixes of the per-distance profile files, relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePrefixes {
    pub translation_prefix: String,
    pub rotation_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Base directory; relative paths below resolve against it
    #[serde(default)]
    pub directory: PathBuf,
    pub translations: String,
    pub rotations: String,
    pub calibration: String,
    /// Camera timestamps; without them playback runs at `fps`
    #[serde(default)]
    pub timestamps: Option<String>,
    #[serde(default)]
    pub pcl_timestamps: Option<String>,
    #[serde(default)]
    pub polylines: Vec<String>,
    /// Outline placed on the profile tracks
    #[serde(default)]
    pub profile_shape: Option<String>,
    #[serde(default)]
    pub profiles: Option<ProfilePrefixes>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub far_plane: Option<f64>,
}

fn default_fps() -> f64 {
    25.0
}

impl ProjectConfig {
    pub fn from_file(path: &Path) -> Result<Self, ProjectError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ProjectConfig = toml::from_str(&text)?;
        if config.directory.is_relative() {
            if let Some(parent) = path.parent() {
                config.directory = parent.join(&config.directory);
            }
        }
        Ok(config)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Reads every file the descriptor names.
    pub fn load(&self) -> Result<SimWorld, ProjectError> {
        let convention = AxisConvention::SURVEY;

        let translations = loading::load_translations(&self.resolve(&self.translations), &convention)?;
        let rotations = loading::load_rotations(&self.resolve(&self.rotations))?;
        let skipped = translations.skipped + rotations.skipped;
        if skipped > 0 {
            warn!("{} malformed pose rows skipped", skipped);
        }
        let poses = PoseSequence::from_rows(&translations.rows, &rotations.rows, CameraEulerSigns::default());

        let axis = match &self.timestamps {
            Some(name) => TimeAxis::Timestamps(loading::load_timestamps(&self.resolve(name))?.rows),
            None => TimeAxis::FixedFps(self.fps),
        };

        let chunk_timestamps = match &self.pcl_timestamps {
            Some(name) => loading::load_pcl_timestamps(&self.resolve(name))?.rows,
            None => Vec::new(),
        };

        let polylines = self
            .polylines
            .iter()
            .map(|name| loading::load_polyline(&self.resolve(name)).map(|p| p.rows))
            .collect::<Result<Vec<_>, _>>()?;

        let profile_shape = match &self.profile_shape {
            Some(name) => loading::load_polyline(&self.resolve(name))?.rows,
            None => Vec::new(),
        };

        let profiles = match &self.profiles {
            Some(prefixes) => {
                let files = ProfileFiles {
                    directory: self.directory.clone(),
                    translation_prefix: prefixes.translation_prefix.clone(),
                    rotation_prefix: prefixes.rotation_prefix.clone(),
                };
                loading::load_profile_set(&files, &convention)?
            }
            None => ProfileSet::default(),
        };

        let mut calibration = loading::load_calibration(&self.resolve(&self.calibration))?;
        if let Some(far) = self.far_plane {
            calibration.intrinsics = calibration.intrinsics.with_far_plane(far);
        }

        info!(
            "loaded project {}: {} poses, {} chunks, {} polylines",
            self.directory.display(),
            poses.frame_count(),
            chunk_timestamps.len(),
            polylines.len()
        );

        Ok(SimWorld {
            name: self.directory.display().to_string(),
            survey: Survey {
                poses,
                axis: Some(axis),
                chunk_timestamps,
                profiles,
                polylines,
                profile_shape,
            },
            calibration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_project(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("t.csv"), "0,0,0\n0,0,1\n0,0,2\n").unwrap();
        fs::write(dir.join("r.csv"), "0,0,0\n0,0,0\n0,0,0\n").unwrap();
        fs::write(dir.join("ts.csv"), "ns\n1000000000\n1040000000\n1080000000\n").unwrap();
        fs::write(
            dir.join("calib.yaml"),
            "Camera.width: 1920\nCamera.height: 1080\nCameraMat:\n  data: [1400, 0, 960, 0, 1400, 540, 0, 0, 1]\n",
        )
        .unwrap();
        fs::write(
            dir.join("project.toml"),
            "translations = \"t.csv\"\nrotations = \"r.csv\"\ntimestamps = \"ts.csv\"\ncalibration = \"calib.yaml\"\nfar_plane = 150.0\n",
        )
        .unwrap();
    }

    #[test]
    fn test_project_loads_relative_files() {
        let dir = std::env::temp_dir().join(format!("mmsview_project_{}", std::process::id()));
        write_project(&dir);

        let config = ProjectConfig::from_file(&dir.join("project.toml")).unwrap();
        assert_eq!(config.fps, 25.0);

        let world = config.load().unwrap();
        assert_eq!(world.survey.poses.frame_count(), 3);
        assert_eq!(
            world.survey.axis,
            Some(TimeAxis::Timestamps(vec![0.0, 0.04, 0.08]))
        );
        assert_eq!(world.calibration.intrinsics.far_plane, 150.0);
        // File z becomes renderer x
        assert_eq!(world.survey.poses.pose(2).unwrap().translation.x, 2.0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_reported() {
        let config: ProjectConfig = toml::from_str(
            "directory = \"/nonexistent\"\ntranslations = \"t.csv\"\nrotations = \"r.csv\"\ncalibration = \"c.yaml\"\n",
        )
        .unwrap();
        assert!(matches!(config.load(), Err(ProjectError::Load(LoadError::Io { .. }))));
    }
}
