//! Pose-graph data model
//!
//! Nodes own the mutable pose state the external solver updates in place;
//! edges are immutable relative measurements referencing nodes by index.
//! Edges are classified at ingestion into odometry, loop-closure, and
//! (synthetic) bogus edges, and kept in separate collections for reporting
//! and for differentiated treatment during problem assembly.

use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

mod problem;

pub use problem::{AssemblyConfig, BlockJacobian, Problem, ResidualBlock};

/// Edges whose endpoint indices differ by less than this are assumed to be
/// consecutive odometry measurements; everything else is a loop closure.
/// Relies on the dataset numbering poses in acquisition order.
pub const ODOMETRY_INDEX_GAP: usize = 5;

/// Errors raised while building a pose graph
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// An edge referenced a node index that has not been declared yet
    #[error("edge references undeclared node {0}")]
    UnknownNode(usize),

    /// Bogus-edge injection needs at least one node to sample endpoints from
    #[error("cannot inject bogus edges into an empty graph")]
    EmptyGraph,
}

/// Classification of a relative-pose measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Consecutive-pose measurement; always gets the rigid residual
    Odometry,
    /// Putative loop closure; robust residual candidate
    Closure,
    /// Synthetic false loop closure injected for robustness testing
    Bogus,
}

impl EdgeKind {
    /// Integer code used in the edge report files (0/1/2).
    pub fn code(self) -> u8 {
        match self {
            EdgeKind::Odometry => 0,
            EdgeKind::Closure => 1,
            EdgeKind::Bogus => 2,
        }
    }
}

/// One robot pose: the dataset index plus the mutable `(x, y, θ)` state.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub pose: Vector3<f64>,
}

/// One relative measurement between ordered nodes `a → b`.
///
/// Endpoints are indices into [`PoseGraph::nodes`], not references; the many
/// edges that share a node all address the same graph-owned pose slot.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub kind: EdgeKind,
    /// Measured relative pose `(dx, dy, dθ)`
    pub measurement: Vector3<f64>,
    /// Information matrix from the source record. Stored for completeness;
    /// the residuals do not use it.
    pub information: Matrix3<f64>,
}

/// Owns the node collection and the three per-kind edge collections.
#[derive(Debug, Clone, Default)]
pub struct PoseGraph {
    nodes: Vec<Node>,
    odometry_edges: Vec<Edge>,
    closure_edges: Vec<Edge>,
    bogus_edges: Vec<Edge>,
}

impl PoseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Nodes must be added before any edge that references
    /// them; dataset indices are expected to match insertion order.
    pub fn add_node(&mut self, id: usize, x: f64, y: f64, theta: f64) {
        self.nodes.push(Node {
            id,
            pose: Vector3::new(x, y, theta),
        });
    }

    /// Append a measured edge, classifying it as odometry or closure by the
    /// endpoint index distance.
    pub fn add_edge(
        &mut self,
        a: usize,
        b: usize,
        measurement: Vector3<f64>,
        information: Matrix3<f64>,
    ) -> Result<(), GraphError> {
        if a >= self.nodes.len() {
            return Err(GraphError::UnknownNode(a));
        }
        if b >= self.nodes.len() {
            return Err(GraphError::UnknownNode(b));
        }
        let kind = if a.abs_diff(b) < ODOMETRY_INDEX_GAP {
            EdgeKind::Odometry
        } else {
            EdgeKind::Closure
        };
        let edge = Edge {
            a,
            b,
            kind,
            measurement,
            information,
        };
        match kind {
            EdgeKind::Odometry => self.odometry_edges.push(edge),
            _ => self.closure_edges.push(edge),
        }
        Ok(())
    }

    /// Append `count` synthetic false loop-closures for robustness testing.
    ///
    /// Endpoints are drawn uniformly from the node collection, independently
    /// and with replacement (self-loops and duplicates are permitted); each
    /// measurement component is uniform in `[0, 1)`. The caller supplies the
    /// random source, so injection is reproducible under a fixed seed.
    pub fn inject_bogus_edges<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        for _ in 0..count {
            let a = rng.random_range(0..self.nodes.len());
            let b = rng.random_range(0..self.nodes.len());
            let measurement = Vector3::new(
                rng.random::<f64>(),
                rng.random::<f64>(),
                rng.random::<f64>(),
            );
            debug!(a, b, "injecting bogus closure");
            self.bogus_edges.push(Edge {
                a,
                b,
                kind: EdgeKind::Bogus,
                measurement,
                information: Matrix3::identity(),
            });
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Current pose estimate of the node at `index`.
    pub fn pose(&self, index: usize) -> &Vector3<f64> {
        &self.nodes[index].pose
    }

    /// Mutable pose slot the external solver writes converged values into.
    pub fn pose_mut(&mut self, index: usize) -> &mut Vector3<f64> {
        &mut self.nodes[index].pose
    }

    pub fn set_pose(&mut self, index: usize, pose: Vector3<f64>) {
        self.nodes[index].pose = pose;
    }

    pub fn odometry_edges(&self) -> &[Edge] {
        &self.odometry_edges
    }

    pub fn closure_edges(&self) -> &[Edge] {
        &self.closure_edges
    }

    pub fn bogus_edges(&self) -> &[Edge] {
        &self.bogus_edges
    }

    pub fn edge_count(&self) -> usize {
        self.odometry_edges.len() + self.closure_edges.len() + self.bogus_edges.len()
    }

    /// All edges in report order: odometry, then closure, then bogus.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.odometry_edges
            .iter()
            .chain(self.closure_edges.iter())
            .chain(self.bogus_edges.iter())
    }
}
