//! Sparse-dense grid container.
//!
//! A [`SparseGrid`] maps patch indices to lazily allocated dense patches,
//! giving unbounded maps that only pay for the regions actually observed.
//!
//! ## Addressing
//!
//! With resolution `r` and patch side `P`, a world coordinate `(x, y)` maps
//! to cell `(⌊x/r⌋, ⌊y/r⌋)`, which in turn maps to patch
//! `(cx div P, cy div P)` and intra-patch slot `(cx mod P, cy mod P)` using
//! Euclidean division so negative coordinates address correctly. The mapping
//! is total and bijective on the cell grid.
//!
//! ## Access path
//!
//! Lookups locate the patch through a hash index into an arena of patches; a
//! one-entry last-access cache short-circuits the hash for the
//! sequential-locality patterns typical of scan insertion and distance
//! propagation.

use std::cell::Cell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{GridCoord, WorldPoint};
use crate::error::ConfigError;

use super::patch::Patch;

/// A paged 2D grid of cells with lazy patch allocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SparseGrid<T> {
    resolution: f64,
    inv_resolution: f64,
    patch_side: usize,
    patches: Vec<Patch<T>>,
    index: HashMap<(i32, i32), usize>,
    min_patch: Option<(i32, i32)>,
    max_patch: Option<(i32, i32)>,
    #[serde(skip)]
    cache: Cell<Option<((i32, i32), usize)>>,
}

impl<T: Copy + Default> SparseGrid<T> {
    /// Create an empty grid.
    ///
    /// `resolution` is the cell size in meters, `patch_side` the patch edge
    /// in cells. Both must be positive.
    pub fn new(resolution: f64, patch_side: usize) -> Result<Self, ConfigError> {
        if !(resolution > 0.0) {
            return Err(ConfigError::InvalidResolution(resolution));
        }
        if patch_side == 0 {
            return Err(ConfigError::InvalidPatchSize(patch_side));
        }

        Ok(Self {
            resolution,
            inv_resolution: 1.0 / resolution,
            patch_side,
            patches: Vec::new(),
            index: HashMap::new(),
            min_patch: None,
            max_patch: None,
            cache: Cell::new(None),
        })
    }

    /// Cell size in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Patch edge length in cells.
    #[inline]
    pub fn patch_side(&self) -> usize {
        self.patch_side
    }

    /// Number of allocated patches.
    #[inline]
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// Cell containing a world point.
    #[inline]
    pub fn cell_of(&self, p: WorldPoint) -> GridCoord {
        GridCoord::new(
            (p.x * self.inv_resolution).floor() as i32,
            (p.y * self.inv_resolution).floor() as i32,
        )
    }

    /// World anchor of a cell (the corner at `cell * resolution`).
    #[inline]
    pub fn world_of(&self, c: GridCoord) -> WorldPoint {
        WorldPoint::new(c.x as f64 * self.resolution, c.y as f64 * self.resolution)
    }

    /// Read a cell, returning the default value for unallocated patches.
    #[inline]
    pub fn get(&self, c: GridCoord) -> T {
        let (key, slot) = self.locate(c);
        if let Some((ck, ci)) = self.cache.get() {
            if ck == key {
                return self.patches[ci].get(slot);
            }
        }
        match self.index.get(&key) {
            Some(&i) => {
                self.cache.set(Some((key, i)));
                self.patches[i].get(slot)
            }
            None => T::default(),
        }
    }

    /// Read a cell at a world point.
    #[inline]
    pub fn get_world(&self, p: WorldPoint) -> T {
        self.get(self.cell_of(p))
    }

    /// Whether the patch covering a cell has been allocated.
    #[inline]
    pub fn is_allocated(&self, c: GridCoord) -> bool {
        let (key, _) = self.locate(c);
        if let Some((ck, _)) = self.cache.get() {
            if ck == key {
                return true;
            }
        }
        self.index.contains_key(&key)
    }

    /// Mutable access to a cell, allocating its patch on demand.
    #[inline]
    pub fn get_mut(&mut self, c: GridCoord) -> &mut T {
        let (key, slot) = self.locate(c);
        let i = match self.cache.get() {
            Some((ck, ci)) if ck == key => ci,
            _ => self.ensure_patch(key),
        };
        self.patches[i].get_mut(slot)
    }

    /// Iterate allocated patches with their patch indices.
    pub fn iter_patches(&self) -> impl Iterator<Item = ((i32, i32), &Patch<T>)> + '_ {
        self.index.iter().map(move |(&key, &i)| (key, &self.patches[i]))
    }

    /// Axis-aligned bounds of the allocated region in world coordinates, as
    /// `(min, max)`. `None` until the first patch is allocated.
    ///
    /// Bounds are tracked at patch granularity: they cover every allocated
    /// cell and are tight to patch edges.
    pub fn bounds(&self) -> Option<(WorldPoint, WorldPoint)> {
        let (min, max) = match (self.min_patch, self.max_patch) {
            (Some(min), Some(max)) => (min, max),
            _ => return None,
        };
        let span = self.patch_side as f64 * self.resolution;
        Some((
            WorldPoint::new(min.0 as f64 * span, min.1 as f64 * span),
            WorldPoint::new((max.0 + 1) as f64 * span, (max.1 + 1) as f64 * span),
        ))
    }

    #[inline]
    fn locate(&self, c: GridCoord) -> ((i32, i32), usize) {
        let p = self.patch_side as i32;
        let ix = c.x.div_euclid(p);
        let iy = c.y.div_euclid(p);
        let sx = c.x.rem_euclid(p) as usize;
        let sy = c.y.rem_euclid(p) as usize;
        ((ix, iy), sy * self.patch_side + sx)
    }

    fn ensure_patch(&mut self, key: (i32, i32)) -> usize {
        if let Some(&i) = self.index.get(&key) {
            self.cache.set(Some((key, i)));
            return i;
        }

        let i = self.patches.len();
        self.patches.push(Patch::new(self.patch_side));
        self.index.insert(key, i);
        self.cache.set(Some((key, i)));

        self.min_patch = Some(match self.min_patch {
            Some((mx, my)) => (mx.min(key.0), my.min(key.1)),
            None => key,
        });
        self.max_patch = Some(match self.max_patch {
            Some((mx, my)) => (mx.max(key.0), my.max(key.1)),
            None => key,
        });

        i
    }
}
