//! Intensity color scales and the intensity histogram.

use crate::error::ColorScaleError;
use serde::{Deserialize, Serialize};

/// Default bounded intensity range of the scanner.
pub const INTENSITY_RANGE: (f64, f64) = (0.0, 42.0);

pub type Rgb = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Palette {
    /// blue → green → red
    #[default]
    BlueGreenRed,
    /// yellow → purple
    YellowPurple,
}

impl Palette {
    pub fn low(&self) -> Rgb {
        match self {
            Palette::BlueGreenRed => [0, 0, 255],
            Palette::YellowPurple => [255, 255, 0],
        }
    }

    pub fn high(&self) -> Rgb {
        match self {
            Palette::BlueGreenRed => [255, 0, 0],
            Palette::YellowPurple => [255, 0, 255],
        }
    }
}

/// Two-breakpoint piecewise-linear scale. The mid anchor sits halfway
/// between `from` and `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    from: f64,
    to: f64,
    palette: Palette,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            from: 0.0,
            to: 20.0,
            palette: Palette::default(),
        }
    }
}

impl ColorScale {
    pub fn new(from: f64, to: f64, palette: Palette) -> Result<Self, ColorScaleError> {
        let mut scale = Self {
            palette,
            ..Self::default()
        };
        scale.set_range(from, to)?;
        Ok(scale)
    }

    /// Rejects an inverted or non-finite range, keeping the previous one.
    pub fn set_range(&mut self, from: f64, to: f64) -> Result<(), ColorScaleError> {
        if !from.is_finite() || !to.is_finite() {
            return Err(ColorScaleError::NonFinite);
        }
        if from > to {
            return Err(ColorScaleError::Inverted { from, to });
        }
        self.from = from;
        self.to = to;
        Ok(())
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn range(&self) -> (f64, f64) {
        (self.from, self.to)
    }

    pub fn mid(&self) -> f64 {
        (self.from + self.to) / 2.0
    }

    pub fn color(&self, intensity: f64) -> Rgb {
        if intensity.is_nan() || intensity < self.from {
            return self.palette.low();
        }
        if intensity > self.to {
            return self.palette.high();
        }
        if self.to == self.from {
            return self.palette.low();
        }

        match self.palette {
            Palette::BlueGreenRed => {
                let mid = self.mid();
                if intensity < mid {
                    let f = (intensity - self.from) / (mid - self.from);
                    [0, channel(f), channel(1.0 - f)]
                } else {
                    let f = (intensity - mid) / (self.to - mid);
                    [channel(f), channel(1.0 - f), 0]
                }
            }
            Palette::YellowPurple => {
                let f = (intensity - self.from) / (self.to - self.from);
                [255, channel(1.0 - f), channel(f)]
            }
        }
    }
}

fn channel(fraction: f64) -> u8 {
    (255.0 * fraction).floor().clamp(0.0, 255.0) as u8
}

/// Unit-width bin counts of intensities over a bounded range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityHistogram {
    min: f64,
    max: f64,
    counts: Vec<u64>,
    below: u64,
    above: u64,
}

impl IntensityHistogram {
    /// One bin per unit step; `max` falls in the last bin.
    pub fn new(min: f64, max: f64) -> Result<Self, ColorScaleError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ColorScaleError::NonFinite);
        }
        if min > max {
            return Err(ColorScaleError::Inverted { from: min, to: max });
        }
        let bins = (max - min).floor() as usize + 1;
        Ok(Self {
            min,
            max,
            counts: vec![0; bins],
            below: 0,
            above: 0,
        })
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = INTENSITY_RANGE;
        let mut hist = Self {
            min,
            max,
            counts: vec![0; (max - min) as usize + 1],
            below: 0,
            above: 0,
        };
        hist.extend(values);
        hist
    }

    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if value < self.min {
            self.below += 1;
            return;
        }
        if value > self.max {
            self.above += 1;
            return;
        }
        let bin = ((value - self.min).floor() as usize).min(self.counts.len() - 1);
        self.counts[bin] += 1;
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for v in values {
            self.add(v);
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Lower edge of each bin.
    pub fn bin_edges(&self) -> Vec<f64> {
        (0..self.counts.len()).map(|i| self.min + i as f64).collect()
    }

    /// Values outside the range, `(below, above)`.
    pub fn outliers(&self) -> (u64, u64) {
        (self.below, self.above)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.below + self.above
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blue_green_red_anchors() {
        let scale = ColorScale::new(0.0, 20.0, Palette::BlueGreenRed).unwrap();
        assert_eq!(scale.color(0.0), [0, 0, 255]);
        assert_eq!(scale.color(10.0), [0, 255, 0]);
        assert_eq!(scale.color(20.0), [255, 0, 0]);
        assert_eq!(scale.color(5.0), [0, 127, 127]);
    }

    #[test]
    fn test_yellow_purple_anchors() {
        let scale = ColorScale::new(0.0, 20.0, Palette::YellowPurple).unwrap();
        assert_eq!(scale.color(0.0), [255, 255, 0]);
        assert_eq!(scale.color(20.0), [255, 0, 255]);
        assert_eq!(scale.color(10.0), [255, 127, 127]);
    }

    #[test]
    fn test_out_of_range_clamps() {
        for palette in [Palette::BlueGreenRed, Palette::YellowPurple] {
            let scale = ColorScale::new(5.0, 15.0, palette).unwrap();
            assert_eq!(scale.color(-3.0), palette.low());
            assert_eq!(scale.color(42.0), palette.high());
        }
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut scale = ColorScale::default();
        assert_eq!(
            scale.set_range(30.0, 10.0),
            Err(ColorScaleError::Inverted { from: 30.0, to: 10.0 })
        );
        assert_eq!(scale.range(), (0.0, 20.0));
    }

    #[test]
    fn test_degenerate_range() {
        let scale = ColorScale::new(7.0, 7.0, Palette::BlueGreenRed).unwrap();
        assert_eq!(scale.color(7.0), [0, 0, 255]);
        assert_eq!(scale.color(7.5), [255, 0, 0]);
    }

    #[test]
    fn test_histogram_bins() {
        let hist = IntensityHistogram::from_values([0.0, 0.5, 1.0, 41.9, 42.0, 50.0, -1.0, f64::NAN]);
        assert_eq!(hist.counts().len(), 43);
        assert_eq!(hist.counts()[0], 2);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[41], 1);
        assert_eq!(hist.counts()[42], 1);
        assert_eq!(hist.outliers(), (1, 1));
        assert_eq!(hist.total(), 7);
    }

    #[test]
    fn test_histogram_custom_range() {
        let mut hist = IntensityHistogram::new(10.0, 12.0).unwrap();
        hist.extend([10.2, 11.0, 12.0, 12.5]);
        assert_eq!(hist.counts(), &[1, 1, 1]);
        assert_eq!(hist.outliers(), (0, 1));
        assert_eq!(hist.bin_edges(), vec![10.0, 11.0, 12.0]);
        assert!(IntensityHistogram::new(5.0, 1.0).is_err());
    }
}
