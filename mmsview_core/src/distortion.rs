//! The "LENS" Remapper - post-render lens distortion
//! =================================================
//!
//! The renderer draws an ideal pinhole image. To overlay it on the recorded
//! video it must be bent with the same Brown-Conrady model as the lens.
//!
//! Two phases:
//! 1. **Precompute** (only when coefficients or canvas size change): for every
//!    destination pixel, find the source pixel it samples. This is an inverse
//!    map, so every destination pixel is visited exactly once and no holes
//!    appear.
//! 2. **Apply** (every frame): gather RGBA values through the table.
//!
//! Tables carry the generation they were built for. A table finished after
//! the parameters or size moved on is discarded instead of installed.

use crate::error::DistortionError;
use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sentinel for a destination pixel whose source falls outside the buffer.
const OUT_OF_BOUNDS: u32 = u32::MAX;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Brown-Conrady coefficients: radial `k1..k3`, tangential `p1, p2`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistortionParams {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub p1: f64,
    pub p2: f64,
}

impl DistortionParams {
    /// From OpenCV coefficient order `[k1, k2, p1, p2, k3, ...]`.
    ///
    /// Four coefficients are accepted with `k3 = 0`; extra ones are ignored.
    pub fn from_opencv(coeffs: &[f64]) -> Option<Self> {
        if coeffs.len() < 4 {
            return None;
        }
        Some(Self {
            k1: coeffs[0],
            k2: coeffs[1],
            p1: coeffs[2],
            p2: coeffs[3],
            k3: coeffs.get(4).copied().unwrap_or(0.0),
        })
    }

    pub fn validate(&self) -> Result<(), DistortionError> {
        let named = [
            ("k1", self.k1),
            ("k2", self.k2),
            ("k3", self.k3),
            ("p1", self.p1),
            ("p2", self.p2),
        ];
        match named.iter().find(|(_, v)| !v.is_finite()) {
            Some(&(name, _)) => Err(DistortionError::NonFinite { name }),
            None => Ok(()),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Distorts a width-normalized, image-centered coordinate.
    pub fn distort_normalized(&self, xn: f64, yn: f64) -> (f64, f64) {
        let r2 = xn * xn + yn * yn;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xd = xn * radial + 2.0 * self.p1 * xn * yn + self.p2 * (r2 + 2.0 * xn * xn);
        let yd = yn * radial + self.p1 * (r2 + 2.0 * yn * yn) + 2.0 * self.p2 * xn * yn;
        (xd, yd)
    }
}

/// Pixel dimensions of the displayed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: usize,
    pub height: usize,
}

impl CanvasSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Length of a tightly packed RGBA buffer of this size.
    pub fn rgba_len(&self) -> usize {
        self.pixel_count() * 4
    }

    fn validate(&self) -> Result<(), DistortionError> {
        if self.width == 0 || self.height == 0 || self.pixel_count() >= OUT_OF_BOUNDS as usize {
            return Err(DistortionError::EmptyCanvas {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

// ============================================================================
// LOOKUP TABLE
// ============================================================================

/// Destination pixel → source pixel address, built for one `(params, size)`.
#[derive(Debug, Clone)]
pub struct DistortionLookupTable {
    size: CanvasSize,
    generation: u64,
    /// Row-major flat source index per destination pixel
    sources: Vec<u32>,
}

impl DistortionLookupTable {
    /// Runs the precompute phase. Rows are computed in parallel.
    pub fn build(
        params: &DistortionParams,
        size: CanvasSize,
        generation: u64,
    ) -> Result<Self, DistortionError> {
        params.validate()?;
        size.validate()?;

        let (w, h) = (size.width, size.height);
        let scale = w as f64;
        let (half_w, half_h) = ((w / 2) as f64, (h / 2) as f64);

        let mut sources = vec![OUT_OF_BOUNDS; size.pixel_count()];
        sources
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                let yn = (y as f64 - half_h) / scale;
                for (x, slot) in row.iter_mut().enumerate() {
                    let xn = (x as f64 - half_w) / scale;
                    let (xd, yd) = params.distort_normalized(xn, yn);

                    let sx = (xd * scale + half_w).round();
                    let sy = (yd * scale + half_h).round();
                    if sx >= 0.0 && sy >= 0.0 && sx < w as f64 && sy < h as f64 {
                        *slot = (sy as usize * w + sx as usize) as u32;
                    }
                }
            });

        let dropped = sources.iter().filter(|&&s| s == OUT_OF_BOUNDS).count();
        debug!(
            "distortion table {}x{} built (generation {}, {} pixels out of bounds)",
            w, h, generation, dropped
        );

        Ok(Self {
            size,
            generation,
            sources,
        })
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Source pixel `(srcY, srcX)` sampled by destination `(x, y)`.
    pub fn source_of(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        match self.sources[y * self.size.width + x] {
            OUT_OF_BOUNDS => None,
            s => {
                let s = s as usize;
                Some((s / self.size.width, s % self.size.width))
            }
        }
    }

    /// Apply phase: gathers `src` into `dst` through the table.
    ///
    /// Transparent source pixels and out-of-bounds sources leave the
    /// destination pixel untouched.
    pub fn apply(&self, src: &[u8], dst: &mut [u8]) -> Result<(), DistortionError> {
        let expected = self.size.rgba_len();
        for actual in [src.len(), dst.len()] {
            if actual != expected {
                return Err(DistortionError::BufferSize { expected, actual });
            }
        }

        let src: &[Rgba] = bytemuck::cast_slice(src);
        let dst: &mut [Rgba] = bytemuck::cast_slice_mut(dst);

        dst.par_iter_mut()
            .zip(self.sources.par_iter())
            .for_each(|(out, &s)| {
                if s == OUT_OF_BOUNDS {
                    return;
                }
                let pixel = src[s as usize];
                if pixel.a != 0 {
                    *out = pixel;
                }
            });
        Ok(())
    }
}

// ============================================================================
// REMAPPER
// ============================================================================

/// A precompute request, detached from the remapper so it can run elsewhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecomputeJob {
    pub params: DistortionParams,
    pub size: CanvasSize,
    pub generation: u64,
}

impl PrecomputeJob {
    pub fn run(&self) -> Result<DistortionLookupTable, DistortionError> {
        DistortionLookupTable::build(&self.params, self.size, self.generation)
    }
}

/// What `present` did with the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Distortion disabled; buffer copied as-is
    Bypassed,
    /// Buffer remapped through the table
    Distorted,
}

/// Owns the current coefficients, canvas size and lookup table.
#[derive(Debug, Clone)]
pub struct DistortionRemapper {
    params: DistortionParams,
    size: Option<CanvasSize>,
    enabled: bool,
    generation: u64,
    table: Option<DistortionLookupTable>,
}

impl DistortionRemapper {
    pub fn new(params: DistortionParams) -> Result<Self, DistortionError> {
        params.validate()?;
        Ok(Self {
            params,
            size: None,
            enabled: true,
            generation: 0,
            table: None,
        })
    }

    pub fn params(&self) -> &DistortionParams {
        &self.params
    }

    pub fn size(&self) -> Option<CanvasSize> {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggling never touches the table.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn table(&self) -> Option<&DistortionLookupTable> {
        self.table.as_ref()
    }

    /// Replaces the coefficients. Invalid ones are rejected and the
    /// current table stays valid.
    pub fn set_params(&mut self, params: DistortionParams) -> Result<(), DistortionError> {
        if let Err(e) = params.validate() {
            warn!("rejected distortion parameters: {}", e);
            return Err(e);
        }
        if params != self.params {
            self.params = params;
            self.invalidate();
        }
        Ok(())
    }

    pub fn resize(&mut self, size: CanvasSize) -> Result<(), DistortionError> {
        size.validate()?;
        if self.size != Some(size) {
            self.size = Some(size);
            self.invalidate();
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.table = None;
    }

    /// The precompute needed before the next distorted frame, if any.
    pub fn pending_job(&self) -> Option<PrecomputeJob> {
        if self.table.is_some() {
            return None;
        }
        self.size.map(|size| PrecomputeJob {
            params: self.params,
            size,
            generation: self.generation,
        })
    }

    /// Installs a finished table unless it was built for an older generation.
    pub fn install(&mut self, table: DistortionLookupTable) -> bool {
        if table.generation != self.generation || Some(table.size) != self.size {
            debug!(
                "discarding stale distortion table (generation {} != {})",
                table.generation, self.generation
            );
            return false;
        }
        self.table = Some(table);
        true
    }

    /// Builds the table in place if it is missing.
    pub fn ensure_table(&mut self) -> Result<(), DistortionError> {
        if let Some(job) = self.pending_job() {
            let table = job.run()?;
            self.install(table);
        }
        Ok(())
    }

    /// Produces the displayed canvas from the undistorted render.
    pub fn present(&mut self, src: &[u8], dst: &mut [u8]) -> Result<PresentMode, DistortionError> {
        let size = self.size.ok_or(DistortionError::EmptyCanvas {
            width: 0,
            height: 0,
        })?;
        let expected = size.rgba_len();
        for actual in [src.len(), dst.len()] {
            if actual != expected {
                return Err(DistortionError::BufferSize { expected, actual });
            }
        }

        if !self.enabled {
            dst.copy_from_slice(src);
            return Ok(PresentMode::Bypassed);
        }

        self.ensure_table()?;
        dst.fill(0);
        match &self.table {
            Some(table) => table.apply(src, dst)?,
            None => return Err(DistortionError::EmptyCanvas {
                width: size.width,
                height: size.height,
            }),
        }
        Ok(PresentMode::Distorted)
    }
}
