//! Fixed-capacity point set used by GJK

use crate::foundation::math::Vec3;

/// Up to four Minkowski-difference points, newest first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Simplex {
    points: [Vec3; 4],
    size: usize,
}

impl Default for Simplex {
    fn default() -> Self {
        Self::new()
    }
}

impl Simplex {
    /// Maximum number of points (a tetrahedron)
    pub const CAPACITY: usize = 4;

    /// Empty simplex
    pub fn new() -> Self {
        Self {
            points: [Vec3::zeros(); 4],
            size: 0,
        }
    }

    /// Replace the contents with `points` (at most four are kept)
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut simplex = Self::new();
        for (slot, point) in simplex.points.iter_mut().zip(points) {
            *slot = *point;
        }
        simplex.size = points.len().min(Self::CAPACITY);
        simplex
    }

    /// Insert at the front, dropping the oldest point once full
    pub fn push_front(&mut self, point: Vec3) {
        self.points = [point, self.points[0], self.points[1], self.points[2]];
        self.size = (self.size + 1).min(Self::CAPACITY);
    }

    /// Number of points held
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when no point has been pushed
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Points in insertion order, newest first
    pub fn points(&self) -> &[Vec3] {
        &self.points[..self.size]
    }

    /// Iterate points, newest first
    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.points().iter()
    }
}

impl std::ops::Index<usize> for Simplex {
    type Output = Vec3;

    fn index(&self, index: usize) -> &Vec3 {
        &self.points()[index]
    }
}
