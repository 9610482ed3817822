//! Gilbert-Johnson-Keerthi intersection test
//!
//! Builds a simplex of Minkowski-difference points (`A - B`) that tries to
//! enclose the origin. The shapes overlap exactly when it can.
//!
//! "Same direction" tests are strict (`> 0`), so shapes that only touch are
//! reported as separated.

use super::simplex::Simplex;
use super::support::{minkowski_support, SupportMap};
use crate::foundation::math::{any_perpendicular, Vec3};

/// Relative tolerance for the tetrahedron face tests. An origin lying on a
/// face of the tetrahedron counts as enclosed instead of cycling between the
/// two sides of that face.
const FACE_TOLERANCE: f32 = 1e-5;

/// Run GJK and return the enclosing tetrahedron when the shapes overlap
///
/// `initial_direction` seeds the first support query (usually the offset
/// between the shape centers). Running out of iterations is reported as no
/// intersection.
pub fn intersection<A, B>(a: &A, b: &B, initial_direction: Vec3, max_iterations: u32) -> Option<Simplex>
where
    A: SupportMap,
    B: SupportMap,
{
    let direction = initial_direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::x);

    let first = minkowski_support(a, b, &direction);
    let mut simplex = Simplex::new();
    simplex.push_front(first);
    let mut direction = -first;

    for _ in 0..max_iterations {
        let support = minkowski_support(a, b, &direction);
        if support.dot(&direction) <= 0.0 {
            return None;
        }

        simplex.push_front(support);
        if next_simplex(&mut simplex, &mut direction) {
            return Some(simplex);
        }
    }

    log::debug!("GJK reached its {max_iterations} iteration cap; treating as separated");
    None
}

/// Boolean form of [`intersection`]
pub fn intersects<A: SupportMap, B: SupportMap>(a: &A, b: &B, initial_direction: Vec3, max_iterations: u32) -> bool {
    intersection(a, b, initial_direction, max_iterations).is_some()
}

fn same_direction(direction: &Vec3, ao: &Vec3) -> bool {
    direction.dot(ao) > 0.0
}

fn next_simplex(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    match simplex.len() {
        2 => line(simplex, direction),
        3 => triangle(simplex, direction),
        4 => tetrahedron(simplex, direction),
        _ => false,
    }
}

/// `edge x ao x edge`, or any perpendicular when the origin is on the edge's line
fn toward_origin(edge: &Vec3, ao: &Vec3) -> Vec3 {
    let perpendicular = edge.cross(ao).cross(edge);
    let scale = edge.norm_squared();
    if perpendicular.norm_squared() <= f32::EPSILON * f32::EPSILON * scale * scale {
        any_perpendicular(edge)
    } else {
        perpendicular
    }
}

fn line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let (a, b) = (simplex[0], simplex[1]);
    let ab = b - a;
    let ao = -a;

    if same_direction(&ab, &ao) {
        *direction = toward_origin(&ab, &ao);
    } else {
        *simplex = Simplex::from_points(&[a]);
        *direction = ao;
    }

    false
}

fn triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let (a, b, c) = (simplex[0], simplex[1], simplex[2]);
    let ab = b - a;
    let ac = c - a;
    let ao = -a;
    let abc = ab.cross(&ac);

    if same_direction(&abc.cross(&ac), &ao) {
        if same_direction(&ac, &ao) {
            *simplex = Simplex::from_points(&[a, c]);
            *direction = toward_origin(&ac, &ao);
            return false;
        }

        *simplex = Simplex::from_points(&[a, b]);
        return line(simplex, direction);
    }

    if same_direction(&ab.cross(&abc), &ao) {
        *simplex = Simplex::from_points(&[a, b]);
        return line(simplex, direction);
    }

    if same_direction(&abc, &ao) {
        *direction = abc;
    } else {
        *simplex = Simplex::from_points(&[a, c, b]);
        *direction = -abc;
    }

    false
}

fn tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let (a, b, c, d) = (simplex[0], simplex[1], simplex[2], simplex[3]);
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let ao = -a;

    let abc = ab.cross(&ac);
    let acd = ac.cross(&ad);
    let adb = ad.cross(&ab);

    let ao_length = ao.norm();
    let outside = |normal: &Vec3| normal.dot(&ao) > FACE_TOLERANCE * normal.norm() * ao_length;

    if outside(&abc) {
        *simplex = Simplex::from_points(&[a, b, c]);
        return triangle(simplex, direction);
    }
    if outside(&acd) {
        *simplex = Simplex::from_points(&[a, c, d]);
        return triangle(simplex, direction);
    }
    if outside(&adb) {
        *simplex = Simplex::from_points(&[a, d, b]);
        return triangle(simplex, direction);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform};
    use crate::physics::collision::support::{Ball, WorldHull};
    use crate::physics::collision::StockShapes;

    fn boxes_overlap_analytically(a: Vec3, b: Vec3, half: f32) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 2.0 * half)
    }

    #[test]
    fn test_agrees_with_aabb_overlap() {
        let stock = StockShapes::new(16);
        let shape = stock.unit_box();
        let origin = WorldHull::new(&shape, Transform::identity());

        let offsets = [
            Vec3::new(0.0, 0.997, 0.0),
            Vec3::new(0.3, 0.9, 0.1),
            Vec3::new(0.99, 0.0, 0.0),
            Vec3::new(1.01, 0.0, 0.0),
            Vec3::new(0.6, 0.6, 0.6),
            Vec3::new(0.9, 0.9, 0.9),
            Vec3::new(-0.2, 1.5, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-0.95, -0.95, 0.4),
            Vec3::new(3.0, -2.0, 1.0),
        ];

        for offset in offsets {
            let other = WorldHull::new(&shape, Transform::from_position(offset));
            let expected = boxes_overlap_analytically(offset, Vec3::zeros(), 0.5);
            let result = intersects(&other, &origin, offset, 64);
            assert_eq!(result, expected, "offset {offset:?}");
        }
    }

    #[test]
    fn test_touching_boxes_are_separated() {
        let stock = StockShapes::new(16);
        let shape = stock.unit_box();
        let a = WorldHull::new(&shape, Transform::identity());
        let b = WorldHull::new(&shape, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        assert!(!intersects(&b, &a, Vec3::y(), 64));
    }

    #[test]
    fn test_spheres_near_contact() {
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        for (distance, expected) in [(1.9, true), (1.99, true), (2.01, false), (0.0, true)] {
            let b = Ball { center: Vec3::new(distance * 0.6, distance * 0.8, 0.0), radius: 1.0 };
            assert_eq!(intersects(&a, &b, a.center - b.center, 64), expected, "distance {distance}");
        }
    }

    #[test]
    fn test_rotated_box_corner() {
        let stock = StockShapes::new(16);
        let shape = stock.unit_box();
        let a = WorldHull::new(&shape, Transform::identity());
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);

        // Corner reaches 1.1 - 0.707 = 0.393 < 0.5
        let near = WorldHull::new(&shape, Transform::from_position(Vec3::new(1.1, 0.0, 0.0)).with_rotation(rotation));
        // Corner reaches 1.3 - 0.707 = 0.593 > 0.5
        let far = WorldHull::new(&shape, Transform::from_position(Vec3::new(1.3, 0.0, 0.0)).with_rotation(rotation));

        assert!(intersects(&near, &a, Vec3::x(), 64));
        assert!(!intersects(&far, &a, Vec3::x(), 64));
    }

    #[test]
    fn test_returns_tetrahedron_on_overlap() {
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let b = Ball { center: Vec3::new(1.0, 0.2, -0.1), radius: 1.0 };
        let simplex = intersection(&a, &b, a.center - b.center, 64).unwrap();
        assert_eq!(simplex.len(), 4);
    }

    #[test]
    fn test_iteration_cap_reports_no_hit() {
        let a = Ball { center: Vec3::zeros(), radius: 1.0 };
        let b = Ball { center: Vec3::new(0.5, 0.3, 0.1), radius: 1.0 };

        // One iteration can only build a segment, never an enclosing tetrahedron
        assert!(intersection(&a, &b, a.center - b.center, 1).is_none());
        assert!(!intersects(&a, &b, a.center - b.center, 0));
        assert!(intersects(&a, &b, a.center - b.center, 64));
    }
}
