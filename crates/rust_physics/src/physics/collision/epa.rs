//! Expanding Polytope Algorithm
//!
//! Grows the tetrahedron left by GJK towards the boundary of the Minkowski
//! difference until the face closest to the origin stops moving. That face
//! gives the minimum translation separating the two shapes.

use super::simplex::Simplex;
use super::support::{minkowski_support, SupportMap};
use crate::foundation::math::Vec3;

/// Minimum translation separating two overlapping shapes
///
/// `normal` points from the first shape towards the second. Moving the first
/// shape by `-normal * depth` (or the second by `+normal * depth`) separates
/// them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Unit separation axis
    pub normal: Vec3,
    /// Overlap along `normal`
    pub depth: f32,
}

impl Penetration {
    /// True when both the axis and the depth are usable
    pub fn is_finite(&self) -> bool {
        self.depth.is_finite() && self.normal.iter().all(|c| c.is_finite())
    }
}

#[derive(Debug, Clone, Copy)]
struct Face {
    indices: [usize; 3],
    normal: Vec3,
    distance: f32,
}

impl Face {
    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.indices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Outward face over `indices`; degenerate faces are kept for topology but
/// never chosen as closest
fn make_face(polytope: &[Vec3], interior: &Vec3, indices: [usize; 3]) -> Face {
    let [i, j, k] = indices;
    let a = polytope[i];
    let normal = (polytope[j] - a).cross(&(polytope[k] - a)).try_normalize(1e-12);

    match normal {
        Some(mut normal) => {
            if normal.dot(&(a - interior)) < 0.0 {
                normal = -normal;
            }
            Face { indices, normal, distance: normal.dot(&a) }
        }
        None => Face { indices, normal: Vec3::zeros(), distance: f32::INFINITY },
    }
}

/// Expand the GJK tetrahedron into a penetration normal and depth
///
/// Returns `None` when `simplex` is not a tetrahedron or every face is
/// degenerate. When the iteration cap is hit the best face so far is used.
pub fn penetration<A, B>(a: &A, b: &B, simplex: &Simplex, max_iterations: u32, tolerance: f32) -> Option<Penetration>
where
    A: SupportMap,
    B: SupportMap,
{
    if simplex.len() != Simplex::CAPACITY {
        return None;
    }

    let mut polytope: Vec<Vec3> = simplex.points().to_vec();
    let interior = polytope.iter().sum::<Vec3>() / polytope.len() as f32;
    let mut faces: Vec<Face> = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]]
        .into_iter()
        .map(|indices| make_face(&polytope, &interior, indices))
        .collect();

    let mut best = None;

    for _ in 0..max_iterations {
        let closest = faces
            .iter()
            .filter(|face| face.distance.is_finite())
            .min_by(|l, r| l.distance.total_cmp(&r.distance))
            .copied();
        let Some(closest) = closest else {
            return best;
        };

        best = Some(Penetration { normal: closest.normal, depth: closest.distance.max(0.0) });

        let support = minkowski_support(a, b, &closest.normal);
        if (support.dot(&closest.normal) - closest.distance).abs() <= tolerance {
            return best;
        }

        // Remove every face the new point can see, keeping the silhouette
        let mut silhouette: Vec<(usize, usize)> = Vec::new();
        faces.retain(|face| {
            let visible = face.normal.dot(&(support - polytope[face.indices[0]])) > 0.0;
            if visible {
                for (from, to) in face.edges() {
                    match silhouette.iter().position(|&edge| edge == (to, from)) {
                        Some(shared) => {
                            silhouette.swap_remove(shared);
                        }
                        None => silhouette.push((from, to)),
                    }
                }
            }
            !visible
        });

        if silhouette.is_empty() {
            return best;
        }

        polytope.push(support);
        let apex = polytope.len() - 1;
        for (from, to) in silhouette {
            faces.push(make_face(&polytope, &interior, [from, to, apex]));
        }
    }

    log::debug!("EPA reached its {max_iterations} iteration cap; using closest face so far");
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::physics::collision::gjk;
    use crate::physics::collision::support::{Ball, WorldHull};
    use crate::physics::collision::StockShapes;
    use approx::assert_relative_eq;

    fn solve<A: SupportMap, B: SupportMap>(a: &A, b: &B) -> Penetration {
        let simplex = gjk::intersection(a, b, a.center() - b.center(), 64).unwrap();
        penetration(a, b, &simplex, 64, 1e-3).unwrap()
    }

    #[test]
    fn test_resting_box_depth_and_normal() {
        let stock = StockShapes::new(16);
        let shape = stock.unit_box();
        let falling = WorldHull::new(&shape, Transform::from_position(Vec3::new(0.0, 0.997, 0.0)));
        let floor = WorldHull::new(&shape, Transform::identity());

        let result = solve(&falling, &floor);
        assert_relative_eq!(result.depth, 0.003, epsilon = 1e-4);
        assert_relative_eq!(result.normal, -Vec3::y(), epsilon = 1e-4);
    }

    #[test]
    fn test_offset_boxes_pick_shallow_axis() {
        let stock = StockShapes::new(16);
        let shape = stock.unit_box();
        let a = WorldHull::new(&shape, Transform::identity());
        let b = WorldHull::new(&shape, Transform::from_position(Vec3::new(0.8, 0.3, -0.1)));

        let result = solve(&a, &b);
        assert_relative_eq!(result.depth, 0.2, epsilon = 1e-3);
        assert_relative_eq!(result.normal, Vec3::x(), epsilon = 1e-3);
    }

    #[test]
    fn test_sphere_depth_matches_analytic() {
        for distance in [0.5_f32, 1.0, 1.5, 1.9] {
            let direction = Vec3::new(0.3, 0.8, -0.2).normalize();
            let a = Ball { center: Vec3::zeros(), radius: 1.0 };
            let b = Ball { center: direction * distance, radius: 1.0 };

            let result = solve(&a, &b);
            assert_relative_eq!(result.depth, 2.0 - distance, epsilon = 2e-3);
            assert!(result.normal.dot(&direction) > 0.999, "distance {distance}");
        }
    }

    #[test]
    fn test_iteration_cap_returns_closest_face() {
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let b = Ball { center: Vec3::new(0.6, 0.7, -0.3), radius: 1.0 };
        let simplex = gjk::intersection(&a, &b, a.center - b.center, 64).unwrap();

        let capped = penetration(&a, &b, &simplex, 1, 1e-6).unwrap();
        let converged = solve(&a, &b);

        assert!(capped.is_finite());
        assert!(capped.depth >= 0.0);
        assert_relative_eq!(capped.normal.magnitude(), 1.0, epsilon = 1e-4);
        // The polytope only grows toward the boundary, so a cut-short face is never deeper
        assert!(capped.depth <= converged.depth + 1e-4);
        assert!(penetration(&a, &b, &simplex, 0, 1e-6).is_none());
    }

    #[test]
    fn test_rejects_partial_simplex() {
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let partial = Simplex::from_points(&[Vec3::x(), Vec3::y()]);
        assert!(penetration(&a, &a, &partial, 64, 1e-3).is_none());
    }
}
