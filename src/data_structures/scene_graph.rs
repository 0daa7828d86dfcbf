//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Each node is either
//! a pure transform or a mesh with its own local transform; the world matrix of
//! a node is the product of every local matrix on the path from the root.
//! Nodes may carry an [`Animation`] which is folded into their local matrix at
//! traversal time.

use std::fmt;

use cgmath::{Deg, InnerSpace, Matrix4, SquareMatrix, Vector3};

use crate::error::{Error, Result};

/// Index of a node inside its [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode<M> {
    Transform(Matrix4<f32>),
    Mesh { mesh: M, local: Matrix4<f32> },
}

impl<M> SceneNode<M> {
    /// A mesh node placed at its parent's origin.
    pub fn mesh(mesh: M) -> Self {
        SceneNode::Mesh {
            mesh,
            local: Matrix4::identity(),
        }
    }

    pub fn identity() -> Self {
        SceneNode::Transform(Matrix4::identity())
    }

    pub fn local(&self) -> Matrix4<f32> {
        match self {
            SceneNode::Transform(local) | SceneNode::Mesh { local, .. } => *local,
        }
    }

    pub fn as_mesh(&self) -> Option<&M> {
        match self {
            SceneNode::Mesh { mesh, .. } => Some(mesh),
            SceneNode::Transform(_) => None,
        }
    }

    fn try_map<N, E>(self, f: &mut impl FnMut(M) -> std::result::Result<N, E>) -> std::result::Result<SceneNode<N>, E> {
        Ok(match self {
            SceneNode::Transform(local) => SceneNode::Transform(local),
            SceneNode::Mesh { mesh, local } => SceneNode::Mesh {
                mesh: f(mesh)?,
                local,
            },
        })
    }
}

/// Time dependent transform applied after a node's local matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Animation {
    Spin {
        axis: Vector3<f32>,
        degrees_per_second: f32,
    },
    Translate {
        velocity: Vector3<f32>,
    },
}

impl Animation {
    /// Transform after `time` seconds.
    pub fn at(&self, time: f32) -> Matrix4<f32> {
        match *self {
            Animation::Spin {
                axis,
                degrees_per_second,
            } => {
                if axis.magnitude2() <= f32::EPSILON {
                    return Matrix4::identity();
                }
                Matrix4::from_axis_angle(axis.normalize(), Deg(degrees_per_second * time))
            }
            Animation::Translate { velocity } => Matrix4::from_translation(velocity * time),
        }
    }
}

#[derive(Clone, Debug)]
struct Slot<M> {
    node: SceneNode<M>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    animation: Option<Animation>,
}

#[derive(Clone, Debug)]
pub struct SceneGraph<M> {
    nodes: Vec<Slot<M>>,
    root: Option<NodeId>,
}

impl<M> Default for SceneGraph<M> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<M> SceneGraph<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` below `parent`, or as the root when `parent` is `None`.
    pub fn add_node(&mut self, node: SceneNode<M>, parent: Option<NodeId>) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        match parent {
            None if self.root.is_some() => return Err(Error::RootAlreadySet),
            None => self.root = Some(id),
            Some(parent) => self
                .nodes
                .get_mut(parent.0)
                .ok_or(Error::UnknownParent(parent))?
                .children
                .push(id),
        }
        self.nodes.push(Slot {
            node,
            parent,
            children: Vec::new(),
            animation: None,
        });
        Ok(id)
    }

    pub fn set_animation(&mut self, id: NodeId, animation: Animation) -> Result<()> {
        let slot = self.nodes.get_mut(id.0).ok_or(Error::UnknownNode(id))?;
        slot.animation = Some(animation);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode<M>> {
        self.nodes.get(id.0).map(|slot| &slot.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode<M>> {
        self.nodes.get_mut(id.0).map(|slot| &mut slot.node)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|slot| slot.parent)
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|slot| slot.node.as_mesh().is_some())
            .count()
    }

    /// Mesh payloads in pre-order.
    pub fn meshes(&self) -> Vec<&M> {
        let mut meshes = Vec::new();
        self.walk(0.0, |_, node, _| {
            if let Some(mesh) = node.as_mesh() {
                meshes.push(mesh);
            }
        });
        meshes
    }

    /// Visits every mesh node in pre-order with its world matrix at `time`.
    ///
    /// Siblings are visited in insertion order. Nodes that are not reachable
    /// from the root are never visited.
    pub fn traverse(&self, time: f32, mut visitor: impl FnMut(NodeId, &M, Matrix4<f32>)) {
        self.walk(time, |id, node, world| {
            if let SceneNode::Mesh { mesh, .. } = node {
                visitor(id, mesh, world);
            }
        });
    }

    fn walk<'a>(&'a self, time: f32, mut visit: impl FnMut(NodeId, &'a SceneNode<M>, Matrix4<f32>)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![(root, Matrix4::identity())];
        while let Some((id, parent_world)) = stack.pop() {
            let slot = &self.nodes[id.0];
            let mut local = slot.node.local();
            if let Some(animation) = slot.animation {
                local = local * animation.at(time);
            }
            let world = parent_world * local;
            visit(id, &slot.node, world);
            // reversed so the first child is popped first
            stack.extend(slot.children.iter().rev().map(|&child| (child, world)));
        }
    }

    /// Converts every mesh payload, keeping ids, structure and animations.
    pub fn try_map<N, E>(self, mut f: impl FnMut(M) -> std::result::Result<N, E>) -> std::result::Result<SceneGraph<N>, E> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|slot| {
                Ok(Slot {
                    node: slot.node.try_map(&mut f)?,
                    parent: slot.parent,
                    children: slot.children,
                    animation: slot.animation,
                })
            })
            .collect::<std::result::Result<Vec<_>, E>>()?;
        Ok(SceneGraph {
            nodes,
            root: self.root,
        })
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Rad, Transform, vec3};

    use super::*;

    fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::from_translation(vec3(x, y, z))
    }

    #[test]
    fn world_matrix_is_product_of_chain() {
        let mut graph = SceneGraph::new();
        let t1 = translation(1.0, 0.0, 0.0);
        let t2 = translation(0.0, 2.0, 0.0);
        let t3 = translation(0.0, 0.0, 3.0);
        let root = graph.add_node(SceneNode::Transform(t1), None).unwrap();
        let middle = graph.add_node(SceneNode::Transform(t2), Some(root)).unwrap();
        graph
            .add_node(SceneNode::Mesh { mesh: "leaf", local: t3 }, Some(middle))
            .unwrap();

        let mut visited = Vec::new();
        graph.traverse(0.0, |_, mesh, world| visited.push((*mesh, world)));
        assert_eq!(visited, vec![("leaf", t1 * t2 * t3)]);
        assert_eq!(visited[0].1, translation(1.0, 2.0, 3.0));
    }

    #[test]
    fn traversal_is_pre_order_in_insertion_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::identity(), None).unwrap();
        let a = graph.add_node(SceneNode::mesh("a"), Some(root)).unwrap();
        graph.add_node(SceneNode::mesh("a.child"), Some(a)).unwrap();
        graph.add_node(SceneNode::mesh("b"), Some(root)).unwrap();

        let mut order = Vec::new();
        graph.traverse(0.0, |_, mesh, _| order.push(*mesh));
        assert_eq!(order, vec!["a", "a.child", "b"]);
        assert_eq!(graph.meshes(), vec![&"a", &"a.child", &"b"]);
        assert_eq!(graph.mesh_count(), 3);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn second_root_and_unknown_parent_are_rejected() {
        let mut graph: SceneGraph<()> = SceneGraph::new();
        graph.add_node(SceneNode::identity(), None).unwrap();
        assert!(matches!(
            graph.add_node(SceneNode::identity(), None),
            Err(Error::RootAlreadySet)
        ));
        assert!(matches!(
            graph.add_node(SceneNode::identity(), Some(NodeId(7))),
            Err(Error::UnknownParent(NodeId(7)))
        ));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn animations_apply_at_traversal_time() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::identity(), None).unwrap();
        let mover = graph.add_node(SceneNode::mesh("mover"), Some(root)).unwrap();
        graph
            .set_animation(mover, Animation::Translate { velocity: vec3(1.0, 0.0, 0.0) })
            .unwrap();
        graph
            .set_animation(root, Animation::Spin { axis: Vector3::unit_y(), degrees_per_second: 90.0 })
            .unwrap();

        let mut world = Matrix4::identity();
        graph.traverse(1.0, |_, _, w| world = w);
        // moved one unit along x, then spun a quarter turn about y
        let origin = world.transform_point(cgmath::Point3::new(0.0, 0.0, 0.0));
        assert!(origin.x.abs() < 1e-5);
        assert!((origin.z + 1.0).abs() < 1e-5);

        let expected = Matrix4::from_angle_y(Rad(std::f32::consts::FRAC_PI_2)) * translation(1.0, 0.0, 0.0);
        let world: [[f32; 4]; 4] = world.into();
        let expected: [[f32; 4]; 4] = expected.into();
        for (a, b) in world.iter().zip(expected.iter()) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn try_map_keeps_structure() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::identity(), None).unwrap();
        let child = graph.add_node(SceneNode::mesh(2), Some(root)).unwrap();
        let mapped: SceneGraph<String> = graph.try_map(|n| Ok::<_, ()>(n.to_string())).unwrap();
        assert_eq!(mapped.root(), Some(root));
        assert_eq!(mapped.children(root), &[child]);
        assert_eq!(mapped.get(child).and_then(SceneNode::as_mesh), Some(&"2".to_string()));

        let failed = mapped.try_map(|_| Err::<(), _>("upload failed"));
        assert_eq!(failed.unwrap_err(), "upload failed");
    }
}
