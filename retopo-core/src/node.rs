//! Mesh-node scene tree

use crate::geometry::GeometryBuffer;
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};

/// A node in a mesh hierarchy: a local transform, optional geometry, and
/// owned children.
///
/// Ownership makes the tree acyclic by construction; reconstruction walks
/// the tree top-down, so no parent back-pointer is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshNode {
    pub name: String,
    pub transform: Transform3D,
    pub geometry: Option<GeometryBuffer>,
    pub children: Vec<MeshNode>,
}

/// A geometry-bearing node flattened out of a hierarchy.
///
/// `path` is the child-index trail from the root, which addresses the same
/// node again in a structural copy of the tree.
#[derive(Debug, Clone)]
pub struct GeometryLeaf<'a> {
    pub path: Vec<usize>,
    pub name: &'a str,
    pub geometry: &'a GeometryBuffer,
    pub world: Transform3D,
}

impl MeshNode {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform3D::identity(),
            geometry: None,
            children: Vec::new(),
        }
    }

    /// Create a node carrying geometry
    pub fn with_geometry(name: impl Into<String>, geometry: GeometryBuffer) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::new(name)
        }
    }

    /// Set the local transform, builder-style
    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    /// Attach a child node
    pub fn add_child(&mut self, child: MeshNode) {
        self.children.push(child);
    }

    /// Total triangle count over this node and all descendants
    pub fn total_triangle_count(&self) -> usize {
        let own = self
            .geometry
            .as_ref()
            .map(|g| g.triangle_count())
            .unwrap_or(0);
        own + self
            .children
            .iter()
            .map(MeshNode::total_triangle_count)
            .sum::<usize>()
    }

    /// Flatten to all geometry-bearing nodes with accumulated world
    /// transforms, in depth-first order
    pub fn geometry_leaves(&self) -> Vec<GeometryLeaf<'_>> {
        let mut leaves = Vec::new();
        self.collect_geometry(&mut Vec::new(), Transform3D::identity(), &mut leaves);
        leaves
    }

    fn collect_geometry<'a>(
        &'a self,
        path: &mut Vec<usize>,
        parent_world: Transform3D,
        out: &mut Vec<GeometryLeaf<'a>>,
    ) {
        let world = parent_world * self.transform;
        if let Some(geometry) = &self.geometry {
            out.push(GeometryLeaf {
                path: path.clone(),
                name: &self.name,
                geometry,
                world,
            });
        }
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            child.collect_geometry(path, world, out);
            path.pop();
        }
    }

    /// Look up a node by its child-index path
    pub fn node_at_path(&self, path: &[usize]) -> Option<&MeshNode> {
        let mut node = self;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    /// Mutable lookup by child-index path
    pub fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut MeshNode> {
        let mut node = self;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point3f;
    use nalgebra::Vector3;

    fn triangle_buffer() -> GeometryBuffer {
        GeometryBuffer::from_positions_and_indices(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
    }

    fn two_leaf_tree() -> MeshNode {
        let mut root = MeshNode::new("root");
        root.add_child(MeshNode::with_geometry("left", triangle_buffer()));
        let mut group = MeshNode::new("group")
            .with_transform(Transform3D::translation(Vector3::new(10.0, 0.0, 0.0)));
        group.add_child(MeshNode::with_geometry("right", triangle_buffer()));
        root.add_child(group);
        root
    }

    #[test]
    fn test_total_triangle_count() {
        assert_eq!(two_leaf_tree().total_triangle_count(), 2);
    }

    #[test]
    fn test_geometry_leaves_paths_and_world_transforms() {
        let root = two_leaf_tree();
        let leaves = root.geometry_leaves();
        assert_eq!(leaves.len(), 2);

        assert_eq!(leaves[0].path, vec![0]);
        assert_eq!(leaves[0].name, "left");

        assert_eq!(leaves[1].path, vec![1, 0]);
        assert_eq!(leaves[1].name, "right");
        let p = leaves[1]
            .world
            .transform_point(&Point3f::new(0.0, 0.0, 0.0));
        assert!((p.x - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_node_at_path_round_trips_leaf_paths() {
        let mut root = two_leaf_tree();
        let paths: Vec<Vec<usize>> = root
            .geometry_leaves()
            .iter()
            .map(|leaf| leaf.path.clone())
            .collect();
        for path in &paths {
            assert!(root.node_at_path(path).unwrap().geometry.is_some());
        }
        root.node_at_path_mut(&paths[0]).unwrap().geometry = None;
        assert_eq!(root.geometry_leaves().len(), 1);
    }
}
