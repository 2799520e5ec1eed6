//! Core traits for retopo

use crate::{geometry::GeometryBuffer, node::MeshNode, point::*, transform::Transform3D};

/// Trait for objects with a spatial extent
pub trait Bounded {
    /// Get the axis-aligned bounding box of the object
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f;
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Apply a transformation to the object
    fn apply_transform(&mut self, transform: &Transform3D);
}

impl Bounded for GeometryBuffer {
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.positions.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let mut min = self.positions[0];
        let mut max = self.positions[0];

        for p in &self.positions {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        (min, max)
    }

    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }
}

impl Transformable for GeometryBuffer {
    fn apply_transform(&mut self, transform: &Transform3D) {
        for p in &mut self.positions {
            *p = transform.transform_point(p);
        }
        if let Some(normals) = &mut self.normals {
            for n in normals.iter_mut() {
                let v = transform.transform_vector(n);
                let len = v.norm();
                if len > f32::EPSILON {
                    *n = v / len;
                }
            }
        }
    }
}

impl Bounded for MeshNode {
    /// World-space bounding box over every geometry-bearing descendant
    fn bounding_box(&self) -> (Point3f, Point3f) {
        let mut min = Point3f::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3f::new(f32::MIN, f32::MIN, f32::MIN);
        let mut any = false;

        for leaf in self.geometry_leaves() {
            for p in &leaf.geometry.positions {
                let wp = leaf.world.transform_point(p);
                any = true;
                min.x = min.x.min(wp.x);
                min.y = min.y.min(wp.y);
                min.z = min.z.min(wp.z);

                max.x = max.x.max(wp.x);
                max.y = max.y.max(wp.y);
                max.z = max.z.max(wp.z);
            }
        }

        if !any {
            return (Point3f::origin(), Point3f::origin());
        }
        (min, max)
    }

    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }
}
