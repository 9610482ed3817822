//! Bounded cell grid used as the broad-phase octree
//!
//! The world cube `[-extent/2, extent/2)` is cut into equal cells. Every body
//! is filed under the single cell containing its transform position (not its
//! bounding-volume center). Moving a body is a remove followed by an insert.
//!
//! Positions outside the world cube are rejected with a warning and leave the
//! index untouched; transient out-of-bounds positions are expected when a
//! simulation blows up and must not abort it.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::foundation::collections::BodyHandle;
use crate::foundation::math::Vec3;

/// Configuration for octree behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeConfig {
    /// Edge length of the indexed world cube
    pub extent: u32,

    /// Edge length of one cell
    pub cell_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            extent: 2048,
            cell_size: 1.0,
        }
    }
}

impl OctreeConfig {
    /// Shift applied to world positions so the grid starts at zero
    pub fn offset(&self) -> f32 {
        self.extent as f32 * 0.5
    }

    /// Number of cells along each axis
    pub fn cells_per_axis(&self) -> i64 {
        ((self.extent as f32 / self.cell_size).floor() as i64).max(1)
    }
}

/// Integer coordinate of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Cell index along x
    pub x: u32,
    /// Cell index along y
    pub y: u32,
    /// Cell index along z
    pub z: u32,
}

#[derive(Debug, Clone, Copy)]
struct Occupant {
    cell: CellCoord,
    position: Vec3,
}

/// Cell-grid spatial index keyed by body handle
#[derive(Debug, Clone, Default)]
pub struct Octree {
    config: OctreeConfig,

    /// Bodies filed under each occupied cell
    cells: HashMap<CellCoord, HashSet<BodyHandle>>,

    /// Reverse lookup so every body sits in exactly one cell
    occupants: HashMap<BodyHandle, Occupant>,
}

impl Octree {
    /// Create an empty index
    pub fn new(config: OctreeConfig) -> Self {
        Self {
            config,
            cells: HashMap::new(),
            occupants: HashMap::new(),
        }
    }

    /// Index configuration
    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// True when `position` lies inside the indexed world cube
    pub fn in_bounds(&self, position: &Vec3) -> bool {
        let offset = self.config.offset();
        position
            .iter()
            .all(|c| c.is_finite() && *c >= -offset && *c < offset)
    }

    fn axis_index(&self, value: f32) -> i64 {
        ((value + self.config.offset()) / self.config.cell_size).floor() as i64
    }

    fn clamp_index(&self, index: i64) -> u32 {
        index.clamp(0, self.config.cells_per_axis() - 1) as u32
    }

    /// Cell containing `position`, or `None` outside the world cube
    pub fn cell_of(&self, position: &Vec3) -> Option<CellCoord> {
        if !self.in_bounds(position) {
            return None;
        }
        Some(CellCoord {
            x: self.clamp_index(self.axis_index(position.x)),
            y: self.clamp_index(self.axis_index(position.y)),
            z: self.clamp_index(self.axis_index(position.z)),
        })
    }

    /// File `handle` under the cell containing `position`
    ///
    /// A body already in the index is moved. Returns `false` (and leaves the
    /// index unchanged) when the position is out of bounds.
    pub fn insert(&mut self, handle: BodyHandle, position: Vec3) -> bool {
        let Some(cell) = self.cell_of(&position) else {
            log::warn!("Spatial index rejected {handle:?} at out-of-bounds position {position:?}");
            return false;
        };

        if let Some(previous) = self.occupants.get(&handle).copied() {
            if previous.cell == cell {
                self.occupants.insert(handle, Occupant { cell, position });
                return true;
            }
            self.detach(handle, previous.cell);
        }

        self.cells.entry(cell).or_default().insert(handle);
        self.occupants.insert(handle, Occupant { cell, position });
        true
    }

    /// Same as [`Octree::insert`]; kept for call sites that track moves
    pub fn update(&mut self, handle: BodyHandle, position: Vec3) -> bool {
        self.insert(handle, position)
    }

    /// Remove `handle` from its cell; `false` when it was not indexed
    pub fn remove(&mut self, handle: BodyHandle) -> bool {
        match self.occupants.remove(&handle) {
            Some(occupant) => {
                self.detach(handle, occupant.cell);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, handle: BodyHandle, cell: CellCoord) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.remove(&handle);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Bodies in the cell containing `position`
    pub fn query_cell(&self, position: Vec3) -> BTreeSet<BodyHandle> {
        let Some(cell) = self.cell_of(&position) else {
            log::warn!("Cell query at out-of-bounds position {position:?}");
            return BTreeSet::new();
        };
        self.cells
            .get(&cell)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Bodies in every cell of the cube `[position - radius, position + radius]`
    pub fn query_range(&self, position: Vec3, radius: f32) -> BTreeSet<BodyHandle> {
        if !self.in_bounds(&position) || !radius.is_finite() || radius < 0.0 {
            log::warn!("Range query rejected at {position:?} with radius {radius}");
            return BTreeSet::new();
        }

        let mut results = BTreeSet::new();
        let lo = position.map(|c| self.clamp_index(self.axis_index(c - radius)));
        let hi = position.map(|c| self.clamp_index(self.axis_index(c + radius)));

        // Sparse grids: walk occupied cells when the cube is larger than the population
        let volume = u64::from(hi.x - lo.x + 1) * u64::from(hi.y - lo.y + 1) * u64::from(hi.z - lo.z + 1);
        if volume > self.cells.len() as u64 {
            for (cell, members) in &self.cells {
                let inside = (lo.x..=hi.x).contains(&cell.x)
                    && (lo.y..=hi.y).contains(&cell.y)
                    && (lo.z..=hi.z).contains(&cell.z);
                if inside {
                    results.extend(members.iter().copied());
                }
            }
            return results;
        }

        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    if let Some(members) = self.cells.get(&CellCoord { x, y, z }) {
                        results.extend(members.iter().copied());
                    }
                }
            }
        }
        results
    }

    /// Bodies in the cells visited while walking from `origin` along `direction`
    ///
    /// The walk advances one cell length per sample until `max_distance` is
    /// covered. Results keep the order in which cells were reached.
    pub fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<BodyHandle> {
        let Some(direction) = direction.try_normalize(f32::EPSILON) else {
            return Vec::new();
        };
        if !max_distance.is_finite() || max_distance < 0.0 {
            log::warn!("Ray query rejected with max distance {max_distance}");
            return Vec::new();
        }

        let step = self.config.cell_size;
        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut visited = HashSet::new();
        let mut traveled = 0.0_f32;

        loop {
            let sample = origin + direction * traveled.min(max_distance);
            if let Some(cell) = self.cell_of(&sample) {
                if visited.insert(cell) {
                    if let Some(members) = self.cells.get(&cell) {
                        let mut ordered: Vec<BodyHandle> = members.iter().copied().collect();
                        ordered.sort();
                        for handle in ordered {
                            if seen.insert(handle) {
                                results.push(handle);
                            }
                        }
                    }
                }
            }

            if traveled >= max_distance {
                break;
            }
            traveled += step;
        }

        results
    }

    /// Last indexed position of `handle`
    pub fn position_of(&self, handle: BodyHandle) -> Option<Vec3> {
        self.occupants.get(&handle).map(|occupant| occupant.position)
    }

    /// Cell currently holding `handle`
    pub fn cell_of_body(&self, handle: BodyHandle) -> Option<CellCoord> {
        self.occupants.get(&handle).map(|occupant| occupant.cell)
    }

    /// Number of indexed bodies
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Clear the octree
    pub fn clear(&mut self) {
        self.cells.clear();
        self.occupants.clear();
    }
}
