//! Problem assembly: edges to residual blocks
//!
//! Assembly binds one factor to each edge and records which pose variables
//! it constrains. The resulting [`Problem`] is the hand-off surface to the
//! external nonlinear least-squares solver: per block it offers generic
//! residual evaluation, a `Jet`-based linearization, and the optional robust
//! loss wrapper. The first node's pose is pinned to remove the global gauge
//! freedom.

use nalgebra::{SMatrix, Vector3};

use super::{EdgeKind, PoseGraph};
use crate::autodiff::{Jet, Real};
use crate::factors::{DcsFactor, EdgeFactor, RigidFactor};
use crate::loss::{HuberLoss, Loss};
use crate::{PgoError, PgoResult};

/// Jacobian of one block: 3 residual rows, two 3-DOF pose columns.
pub type BlockJacobian = SMatrix<f64, 3, 6>;

/// Configuration for problem assembly.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Use the DCS residual for closure and bogus edges. Odometry edges
    /// always use the rigid residual.
    pub robust_closures: bool,
    /// DCS transition scale `c`
    pub dcs_scale: f64,
    /// Scale of the Huber kernel wrapped around every block by the solver;
    /// `None` disables the wrapper. Independent of the DCS weighting.
    pub huber_scale: Option<f64>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            robust_closures: true,
            dcs_scale: crate::factors::dcs::DEFAULT_SCALE,
            huber_scale: Some(0.01),
        }
    }
}

/// One edge bound to its residual function and endpoint pose variables.
pub struct ResidualBlock {
    /// Index of the first pose variable
    pub a: usize,
    /// Index of the second pose variable
    pub b: usize,
    pub kind: EdgeKind,
    pub factor: EdgeFactor,
    /// Robust loss the solver applies on top of the residual
    pub loss: Option<Box<dyn Loss>>,
}

impl ResidualBlock {
    /// Evaluate the residual at the given endpoint poses.
    pub fn residual<T: Real>(&self, pose_a: &Vector3<T>, pose_b: &Vector3<T>) -> Vector3<T> {
        self.factor.residual(pose_a, pose_b)
    }

    /// Residual and, on request, the 3×6 Jacobian with respect to both
    /// endpoint poses, computed by forward-mode differentiation.
    pub fn linearize(
        &self,
        pose_a: &Vector3<f64>,
        pose_b: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> (Vector3<f64>, Option<BlockJacobian>) {
        if !compute_jacobian {
            return (self.factor.residual(pose_a, pose_b), None);
        }
        let jet_a = Vector3::new(
            Jet::<6>::variable(pose_a.x, 0),
            Jet::<6>::variable(pose_a.y, 1),
            Jet::<6>::variable(pose_a.z, 2),
        );
        let jet_b = Vector3::new(
            Jet::<6>::variable(pose_b.x, 3),
            Jet::<6>::variable(pose_b.y, 4),
            Jet::<6>::variable(pose_b.z, 5),
        );
        let result = self.factor.residual(&jet_a, &jet_b);
        let residual = Vector3::new(result.x.value, result.y.value, result.z.value);
        let jacobian = BlockJacobian::from_fn(|row, col| result[row].derivs[col]);
        (residual, Some(jacobian))
    }

    /// Loss-corrected cost contribution `ρ(||r||²)` of this block.
    pub fn cost(&self, pose_a: &Vector3<f64>, pose_b: &Vector3<f64>) -> f64 {
        let squared_norm = self.factor.residual(pose_a, pose_b).norm_squared();
        match &self.loss {
            Some(loss) => loss.evaluate(squared_norm)[0],
            None => squared_norm,
        }
    }

    /// Robust weight of this block at the given poses (1.0 for rigid blocks).
    pub fn weight(&self, pose_a: &Vector3<f64>, pose_b: &Vector3<f64>) -> f64 {
        self.factor.weight(pose_a, pose_b)
    }
}

/// The assembled optimization problem handed to the external solver.
pub struct Problem {
    pub blocks: Vec<ResidualBlock>,
    /// Pose variable excluded from optimization to pin the gauge
    pub fixed_node: usize,
    /// Sum of residual dimensions over all blocks
    pub total_residual_dimension: usize,
}

impl Problem {
    /// Total loss-corrected cost at the graph's current pose estimates.
    pub fn total_cost(&self, graph: &PoseGraph) -> f64 {
        self.blocks
            .iter()
            .map(|block| block.cost(graph.pose(block.a), graph.pose(block.b)))
            .sum()
    }

    /// Robust weight per closure/bogus block, in block order. Captured once
    /// before optimization these become the "prior" column of the weight
    /// report; captured after, the optimized column.
    pub fn robust_weights(&self, graph: &PoseGraph) -> Vec<f64> {
        self.blocks
            .iter()
            .filter(|block| block.kind != EdgeKind::Odometry)
            .map(|block| block.weight(graph.pose(block.a), graph.pose(block.b)))
            .collect()
    }
}

impl PoseGraph {
    /// Bind a residual function to every edge.
    ///
    /// Odometry edges get the rigid residual; closure and bogus edges share
    /// one choice, DCS or rigid, selected by `config.robust_closures`.
    /// Block order follows the report order: odometry, closure, bogus.
    pub fn assemble(&self, config: &AssemblyConfig) -> PgoResult<Problem> {
        let huber = config
            .huber_scale
            .map(HuberLoss::new)
            .transpose()
            .map_err(PgoError::from)?;

        let mut blocks = Vec::with_capacity(self.edge_count());
        for edge in self.odometry_edges() {
            let m = &edge.measurement;
            blocks.push(ResidualBlock {
                a: edge.a,
                b: edge.b,
                kind: edge.kind,
                factor: EdgeFactor::Rigid(RigidFactor::new(m.x, m.y, m.z)),
                loss: boxed_loss(&huber),
            });
        }
        for edge in self.closure_edges().iter().chain(self.bogus_edges()) {
            let m = &edge.measurement;
            let factor = if config.robust_closures {
                EdgeFactor::Dcs(DcsFactor::with_scale(m.x, m.y, m.z, config.dcs_scale)?)
            } else {
                EdgeFactor::Rigid(RigidFactor::new(m.x, m.y, m.z))
            };
            blocks.push(ResidualBlock {
                a: edge.a,
                b: edge.b,
                kind: edge.kind,
                factor,
                loss: boxed_loss(&huber),
            });
        }

        let total_residual_dimension = blocks.len() * 3;
        Ok(Problem {
            blocks,
            fixed_node: 0,
            total_residual_dimension,
        })
    }
}

fn boxed_loss(huber: &Option<HuberLoss>) -> Option<Box<dyn Loss>> {
    huber
        .as_ref()
        .map(|loss| Box::new(loss.clone()) as Box<dyn Loss>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    const TOLERANCE: f64 = 1e-9;

    /// 3-node straight-line graph with two odometry edges and one closure,
    /// all perfectly consistent. Needs node ids spread past the odometry gap
    /// so the long edge classifies as a closure.
    fn consistent_line_graph() -> PoseGraph {
        let mut graph = PoseGraph::new();
        for i in 0..7 {
            graph.add_node(i, i as f64, 0.0, 0.0);
        }
        let info = Matrix3::identity();
        for i in 0..6 {
            graph
                .add_edge(i, i + 1, Vector3::new(1.0, 0.0, 0.0), info)
                .unwrap();
        }
        graph
            .add_edge(0, 6, Vector3::new(6.0, 0.0, 0.0), info)
            .unwrap();
        graph
    }

    #[test]
    fn test_consistent_graph_has_zero_residuals() {
        let graph = consistent_line_graph();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        assert_eq!(problem.blocks.len(), 7);
        for block in &problem.blocks {
            let error = block.residual(graph.pose(block.a), graph.pose(block.b));
            assert!(error.norm() < TOLERANCE);
        }
        assert!(problem.total_cost(&graph) < TOLERANCE);
    }

    #[test]
    fn test_first_node_is_pinned() {
        let graph = consistent_line_graph();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        assert_eq!(problem.fixed_node, 0);
        assert_eq!(problem.total_residual_dimension, 21);
    }

    #[test]
    fn test_closure_and_bogus_share_residual_choice() {
        let mut graph = consistent_line_graph();
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        graph.inject_bogus_edges(2, &mut rng).unwrap();

        let robust = graph.assemble(&AssemblyConfig::default()).unwrap();
        for block in &robust.blocks {
            match block.kind {
                EdgeKind::Odometry => assert!(matches!(block.factor, EdgeFactor::Rigid(_))),
                _ => assert!(matches!(block.factor, EdgeFactor::Dcs(_))),
            }
        }

        let plain = graph
            .assemble(&AssemblyConfig {
                robust_closures: false,
                ..AssemblyConfig::default()
            })
            .unwrap();
        for block in &plain.blocks {
            assert!(matches!(block.factor, EdgeFactor::Rigid(_)));
        }
    }

    #[test]
    fn test_linearize_matches_finite_differences() {
        let graph = consistent_line_graph();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        let block = &problem.blocks[0];

        // Perturb away from the minimum so the Jacobian is interesting.
        let pose_a = Vector3::new(0.1, -0.2, 0.05);
        let pose_b = Vector3::new(1.3, 0.1, -0.1);
        let (residual, jacobian) = block.linearize(&pose_a, &pose_b, true);
        let jacobian = jacobian.unwrap();

        assert!((residual - block.residual(&pose_a, &pose_b)).norm() < TOLERANCE);

        let h = 1e-7;
        for param in 0..6 {
            let mut pa = pose_a;
            let mut pb = pose_b;
            if param < 3 {
                pa[param] += h;
            } else {
                pb[param - 3] += h;
            }
            let plus = block.residual(&pa, &pb);
            let base = block.residual(&pose_a, &pose_b);
            for row in 0..3 {
                let fd = (plus[row] - base[row]) / h;
                assert!(
                    (jacobian[(row, param)] - fd).abs() < 1e-5,
                    "row {row} param {param}: ad {} fd {fd}",
                    jacobian[(row, param)]
                );
            }
        }
    }

    #[test]
    fn test_linearize_without_jacobian() {
        let graph = consistent_line_graph();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        let (residual, jacobian) = problem.blocks[0].linearize(
            graph.pose(0),
            graph.pose(1),
            false,
        );
        assert!(residual.norm() < TOLERANCE);
        assert!(jacobian.is_none());
    }

    #[test]
    fn test_invalid_dcs_scale_fails_assembly() {
        let graph = consistent_line_graph();
        let result = graph.assemble(&AssemblyConfig {
            dcs_scale: 0.0,
            ..AssemblyConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_robust_weights_cover_closure_and_bogus_blocks() {
        let mut graph = consistent_line_graph();
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(9);
        graph.inject_bogus_edges(2, &mut rng).unwrap();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();

        let weights = problem.robust_weights(&graph);
        assert_eq!(weights.len(), 3);
        // The consistent closure is fully trusted; the random bogus edges
        // land far from their measurements and must be damped.
        assert!((weights[0] - 1.0).abs() < TOLERANCE);
        for weight in weights {
            assert!(weight > 0.0 && weight <= 1.0);
        }
    }
}
