//! Predicted train profile (loading gauge) tracks at fixed look-ahead distances.

use crate::transform::{compose_pose, Transform4x4};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Look-ahead distance of a predicted profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProfileDistance {
    #[default]
    M25,
    M50,
    M75,
    M100,
}

impl ProfileDistance {
    pub const ALL: [ProfileDistance; 4] = [
        ProfileDistance::M25,
        ProfileDistance::M50,
        ProfileDistance::M75,
        ProfileDistance::M100,
    ];

    pub fn meters(&self) -> u32 {
        match self {
            ProfileDistance::M25 => 25,
            ProfileDistance::M50 => 50,
            ProfileDistance::M75 => 75,
            ProfileDistance::M100 => 100,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ProfileDistance::M25 => 0,
            ProfileDistance::M50 => 1,
            ProfileDistance::M75 => 2,
            ProfileDistance::M100 => 3,
        }
    }

    /// File name of this distance's track: `{prefix}_{meters}.csv`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}_{}.csv", prefix, self.meters())
    }
}

impl fmt::Display for ProfileDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

impl FromStr for ProfileDistance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('m') {
            "25" => Ok(ProfileDistance::M25),
            "50" => Ok(ProfileDistance::M50),
            "75" => Ok(ProfileDistance::M75),
            "100" => Ok(ProfileDistance::M100),
            _ => Err(format!("Unknown profile distance: {}", s)),
        }
    }
}

/// One distance's predicted positions and the transforms derived from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileTrack {
    translations: Vec<Vector3<f64>>,
    transforms: Vec<Transform4x4>,
}

impl ProfileTrack {
    /// `rotations_inv` are the inverse rotation matrices of the stored poses.
    pub fn new(translations: Vec<Vector3<f64>>, rotations_inv: &[Matrix3<f64>]) -> Self {
        let transforms = translations
            .iter()
            .zip(rotations_inv)
            .map(|(t, r)| compose_pose(t, r))
            .collect();
        Self {
            translations,
            transforms,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transform for a playback position, held at the last one past the end.
    pub fn transform_at(&self, position: usize) -> Option<&Transform4x4> {
        let last = self.transforms.len().checked_sub(1)?;
        self.transforms.get(position.min(last))
    }

    /// Polyline through every predicted position.
    pub fn line(&self) -> &[Vector3<f64>] {
        &self.translations
    }
}

/// All four look-ahead tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSet {
    tracks: [ProfileTrack; 4],
}

impl ProfileSet {
    pub fn new(tracks: [ProfileTrack; 4]) -> Self {
        Self { tracks }
    }

    pub fn track(&self, distance: ProfileDistance) -> &ProfileTrack {
        &self.tracks[distance.index()]
    }

    /// Places the profile shape for `position` at `distance`.
    pub fn place_shape(
        &self,
        distance: ProfileDistance,
        position: usize,
        shape: &[Vector3<f64>],
    ) -> Option<Vec<Vector3<f64>>> {
        self.track(distance)
            .transform_at(position)
            .map(|m| m.transform_points(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_track(n: usize) -> ProfileTrack {
        let translations = (0..n).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
        ProfileTrack::new(translations, &vec![Matrix3::identity(); n])
    }

    #[test]
    fn test_distance_index_and_names() {
        assert_eq!(ProfileDistance::M75.index(), 2);
        assert_eq!(ProfileDistance::M100.file_name("profile"), "profile_100.csv");
        assert_eq!("50".parse::<ProfileDistance>().unwrap(), ProfileDistance::M50);
        assert_eq!("25m".parse::<ProfileDistance>().unwrap(), ProfileDistance::M25);
        assert!("30".parse::<ProfileDistance>().is_err());
    }

    #[test]
    fn test_transform_clamps_to_last() {
        let track = straight_track(5);
        let m = track.transform_at(100).unwrap();
        assert_eq!(m.apply(&Vector3::zeros()).x, 4.0);
        assert!(ProfileTrack::default().transform_at(0).is_none());
    }

    #[test]
    fn test_place_shape() {
        let mut tracks: [ProfileTrack; 4] = Default::default();
        tracks[ProfileDistance::M50.index()] = straight_track(3);
        let set = ProfileSet::new(tracks);

        let shape = vec![Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, -1.0, 0.0)];
        let placed = set.place_shape(ProfileDistance::M50, 2, &shape).unwrap();
        assert_eq!(placed[0], Vector3::new(2.0, 1.0, 0.0));
        assert!(set.place_shape(ProfileDistance::M25, 0, &shape).is_none());
        assert_eq!(set.track(ProfileDistance::M50).line().len(), 3);
    }
}
