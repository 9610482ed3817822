//! Bodies stored in the physics world arena
//!
//! A body always has a transform. It may carry a collider (shape, bounding
//! volume and layer) and, only when it has a collider, a rigid body.

use crate::error::{PhysicsError, PhysicsResult};
use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{is_finite, Transform, Vec3};
use crate::physics::collision::{BoundingKind, BoundingVolume, ConvexShape, StockShapes, WorldHull};
use crate::physics::collision_layers::Layer;
use crate::physics::collision_system::ColliderProxy;
use crate::physics::rigidbody::{RigidBody, RigidBodyDesc};

/// Geometry requested for a collider
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    /// The stock unit cube, sized through the transform scale
    Box,
    /// The stock unit-diameter sphere, sized through the transform scale
    Sphere,
    /// Custom convex hull given by model-space vertices
    Hull(Vec<Vec3>),
}

/// Construction parameters for a [`Collider`]
#[derive(Debug, Clone, PartialEq)]
pub struct ColliderDesc {
    /// Geometry
    pub shape: ColliderShape,
    /// Bounding volume derived from the geometry
    pub bounding: BoundingKind,
    /// Collision layer
    pub layer: Layer,
    /// World-axis shift of the collider away from the body position
    pub offset: Vec3,
}

impl ColliderDesc {
    /// Box collider with a box bounding volume
    pub fn cuboid() -> Self {
        Self {
            shape: ColliderShape::Box,
            bounding: BoundingKind::Box,
            layer: Layer::DEFAULT,
            offset: Vec3::zeros(),
        }
    }

    /// Sphere collider with a sphere bounding volume
    pub fn sphere() -> Self {
        Self {
            shape: ColliderShape::Sphere,
            bounding: BoundingKind::Sphere,
            layer: Layer::DEFAULT,
            offset: Vec3::zeros(),
        }
    }

    /// Convex hull collider with a box bounding volume
    pub fn hull(points: Vec<Vec3>) -> Self {
        Self {
            shape: ColliderShape::Hull(points),
            bounding: BoundingKind::Box,
            layer: Layer::DEFAULT,
            offset: Vec3::zeros(),
        }
    }

    /// Builder-style layer override
    #[must_use]
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    /// Builder-style collider offset
    #[must_use]
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Builder-style bounding volume override
    #[must_use]
    pub fn with_bounding(mut self, bounding: BoundingKind) -> Self {
        self.bounding = bounding;
        self
    }
}

/// Collision geometry of a body
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    shape: ConvexShape,
    kind: BoundingKind,
    local_bounds: BoundingVolume,
    layer: Layer,
    offset: Vec3,
}

impl Collider {
    /// Build a collider, sharing stock geometry where possible
    pub fn new(desc: ColliderDesc, stock: &StockShapes) -> PhysicsResult<Self> {
        if !is_finite(&desc.offset) {
            return Err(PhysicsError::InvalidBoundingVolume(format!(
                "collider offset must be finite, got {:?}",
                desc.offset
            )));
        }
        let shape = match desc.shape {
            ColliderShape::Box => stock.unit_box(),
            ColliderShape::Sphere => stock.unit_sphere(),
            ColliderShape::Hull(points) => ConvexShape::from_points(points)?,
        };
        let local_bounds = shape.local_bounds(desc.bounding)?;
        Ok(Self {
            shape,
            kind: desc.bounding,
            local_bounds,
            layer: desc.layer,
            offset: desc.offset,
        })
    }

    /// Model-space hull
    pub fn shape(&self) -> &ConvexShape {
        &self.shape
    }

    /// Bounding volume kind
    pub fn kind(&self) -> BoundingKind {
        self.kind
    }

    /// Collision layer
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Move the collider to another layer
    pub fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    /// World-axis shift from the body position
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Shift the collider; a non-finite offset is ignored
    pub fn set_offset(&mut self, offset: Vec3) {
        if is_finite(&offset) {
            self.offset = offset;
        } else {
            log::warn!("Ignoring non-finite collider offset {offset:?}");
        }
    }

    /// Model-space bounding volume
    pub fn local_bounds(&self) -> &BoundingVolume {
        &self.local_bounds
    }

    /// Collider placement for a body at `transform`
    ///
    /// The offset is added after scale and rotation, so it does not turn
    /// with the body.
    pub fn placement(&self, transform: &Transform) -> Transform {
        transform.translated(self.offset)
    }

    /// World-space bounding volume for a body at `transform`
    pub fn world_bounds(&self, transform: &Transform) -> BoundingVolume {
        self.local_bounds.transformed(&self.placement(transform))
    }

    /// Support-mapped hull for a body at `transform`
    pub fn hull<'a>(&'a self, transform: &Transform) -> WorldHull<'a> {
        WorldHull::new(&self.shape, self.placement(transform))
    }

    /// Scaled half extents used for mass properties
    pub fn scaled_half_extents(&self, transform: &Transform) -> Vec3 {
        match self.kind {
            BoundingKind::Box => self.shape.local_half_extents().component_mul(&transform.scale.abs()),
            BoundingKind::Sphere => {
                let radius = self.local_bounds.bounding_radius() * transform.max_scale();
                Vec3::new(radius, radius, radius)
            }
        }
    }
}

/// Construction parameters for a [`Body`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyDesc {
    /// Initial placement
    pub transform: Transform,
    /// Optional collision geometry
    pub collider: Option<ColliderDesc>,
    /// Optional dynamics; requires a collider
    pub rigidbody: Option<RigidBodyDesc>,
}

impl BodyDesc {
    /// Body with only a transform
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            collider: None,
            rigidbody: None,
        }
    }

    /// Builder-style collider
    #[must_use]
    pub fn with_collider(mut self, collider: ColliderDesc) -> Self {
        self.collider = Some(collider);
        self
    }

    /// Builder-style rigid body
    #[must_use]
    pub fn with_rigidbody(mut self, rigidbody: RigidBodyDesc) -> Self {
        self.rigidbody = Some(rigidbody);
        self
    }
}

/// A transform with optional collision geometry and dynamics
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// World placement
    pub transform: Transform,
    /// Position before the most recent integration
    pub previous_position: Vec3,
    pub(crate) collider: Option<Collider>,
    pub(crate) rigidbody: Option<RigidBody>,
}

impl Body {
    /// Validate `desc` and build the body
    pub(crate) fn from_desc(handle: BodyHandle, desc: BodyDesc, stock: &StockShapes) -> PhysicsResult<Self> {
        validate_transform(&desc.transform)?;
        let collider = desc.collider.map(|c| Collider::new(c, stock)).transpose()?;

        let mut body = Self {
            transform: desc.transform,
            previous_position: desc.transform.position,
            collider,
            rigidbody: None,
        };
        if let Some(rigidbody) = desc.rigidbody {
            body.rigidbody = Some(body.build_rigidbody(handle, &rigidbody)?);
        }
        Ok(body)
    }

    /// Rigid body sized from this body's collider
    pub(crate) fn build_rigidbody(&self, handle: BodyHandle, desc: &RigidBodyDesc) -> PhysicsResult<RigidBody> {
        let collider = self
            .collider
            .as_ref()
            .ok_or(PhysicsError::MissingComponent { handle, component: "collider" })?;
        RigidBody::new(desc, collider.kind(), collider.scaled_half_extents(&self.transform))
    }

    /// Collision geometry, if any
    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    /// Mutable collision geometry
    pub fn collider_mut(&mut self) -> Option<&mut Collider> {
        self.collider.as_mut()
    }

    /// Dynamics, if any
    pub fn rigidbody(&self) -> Option<&RigidBody> {
        self.rigidbody.as_ref()
    }

    /// Mutable dynamics
    pub fn rigidbody_mut(&mut self) -> Option<&mut RigidBody> {
        self.rigidbody.as_mut()
    }

    /// True when nothing can move this body: fixed or without a rigid body
    pub fn is_fixed(&self) -> bool {
        self.rigidbody.as_ref().map_or(true, RigidBody::is_fixed)
    }

    /// Linear velocity, zero without a rigid body
    pub fn velocity(&self) -> Vec3 {
        self.rigidbody.as_ref().map_or_else(Vec3::zeros, |rb| rb.velocity)
    }

    /// World bounding volume, if the body has a collider
    pub fn world_bounds(&self) -> Option<BoundingVolume> {
        self.collider.as_ref().map(|c| c.world_bounds(&self.transform))
    }

    /// Detection snapshot of this body; `None` without a collider
    pub fn proxy(&self, handle: BodyHandle) -> Option<ColliderProxy<'_>> {
        let collider = self.collider.as_ref()?;
        Some(ColliderProxy {
            handle,
            shape: collider.shape(),
            anchor: self.transform.position,
            transform: collider.placement(&self.transform),
            bounds: collider.world_bounds(&self.transform),
            layer: collider.layer(),
            velocity: self.velocity(),
            fixed: self.is_fixed(),
        })
    }
}

/// Reject transforms that would produce degenerate or non-finite volumes
pub(crate) fn validate_transform(transform: &Transform) -> PhysicsResult<()> {
    if !is_finite(&transform.position) {
        return Err(PhysicsError::InvalidBoundingVolume("non-finite position".to_string()));
    }
    if !transform.scale.iter().all(|s| s.is_finite() && *s > 0.0) {
        return Err(PhysicsError::InvalidBoundingVolume(format!(
            "scale must be finite and positive, got {:?}",
            transform.scale
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use crate::physics::collision::SupportMap;
    use approx::assert_relative_eq;

    #[test]
    fn test_rigidbody_requires_collider() {
        let stock = StockShapes::new(16);
        let desc = BodyDesc::new(Transform::identity()).with_rigidbody(RigidBodyDesc::dynamic(1.0));
        assert!(matches!(
            Body::from_desc(BodyHandle::default(), desc, &stock),
            Err(PhysicsError::MissingComponent { component: "collider", .. })
        ));
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let stock = StockShapes::new(16);
        let desc = BodyDesc::new(Transform::identity().with_uniform_scale(-1.0)).with_collider(ColliderDesc::cuboid());
        assert!(matches!(
            Body::from_desc(BodyHandle::default(), desc, &stock),
            Err(PhysicsError::InvalidBoundingVolume(_))
        ));
    }

    #[test]
    fn test_sphere_collider_world_bounds_follow_scale() {
        let stock = StockShapes::new(16);
        let desc = BodyDesc::new(Transform::identity().with_uniform_scale(2.0)).with_collider(ColliderDesc::sphere());
        let body = Body::from_desc(BodyHandle::default(), desc, &stock).unwrap();

        let bounds = body.world_bounds().unwrap();
        assert!((bounds.bounding_radius() - 1.0).abs() < 1e-5);
        assert!(body.is_fixed());
    }

    #[test]
    fn test_offset_moves_bounds_and_hull_but_not_anchor() {
        let stock = StockShapes::new(16);
        let rotated = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2));
        let desc = BodyDesc::new(rotated).with_collider(ColliderDesc::cuboid().with_offset(Vec3::new(0.0, 2.0, 0.0)));
        let body = Body::from_desc(BodyHandle::default(), desc, &stock).unwrap();

        let bounds = body.world_bounds().unwrap();
        assert_relative_eq!(bounds.center(), Vec3::new(1.0, 4.0, 3.0), epsilon = 1e-5);
        assert!(bounds.contains_point(&Vec3::new(1.0, 4.4, 3.0)));
        assert!(!bounds.contains_point(&Vec3::new(1.0, 2.0, 3.0)));

        let top = body.collider().unwrap().hull(&body.transform).support(&Vec3::y());
        assert_relative_eq!(top.y, 4.5, epsilon = 1e-5);

        let proxy = body.proxy(BodyHandle::default()).unwrap();
        assert_eq!(proxy.anchor, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(proxy.reach(), 2.0 + 0.75_f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_non_finite_offset_rejected() {
        let stock = StockShapes::new(16);
        let desc = ColliderDesc::sphere().with_offset(Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(matches!(
            Collider::new(desc, &stock),
            Err(PhysicsError::InvalidBoundingVolume(_))
        ));

        let mut collider = Collider::new(ColliderDesc::sphere(), &stock).unwrap();
        collider.set_offset(Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert_eq!(collider.offset(), Vec3::zeros());
        collider.set_offset(Vec3::x());
        assert_eq!(collider.offset(), Vec3::x());
    }

    #[test]
    fn test_stock_geometry_is_shared_between_colliders() {
        let stock = StockShapes::new(16);
        let a = Collider::new(ColliderDesc::cuboid(), &stock).unwrap();
        let b = Collider::new(ColliderDesc::cuboid(), &stock).unwrap();
        assert!(a.shape().shares_buffer_with(b.shape()));
    }
}
