//! Result writers for downstream visualization
//!
//! Three plain-text outputs, written before and after the external solve:
//! a node file (`id x y theta` per line), an edge file (`a b kind` per
//! line, odometry → closure → bogus order), and a sectioned weight report
//! pairing each closure/bogus edge's pre-optimization robust weight with
//! its weight at the current poses.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::IoError;
use crate::graph::{EdgeKind, PoseGraph, Problem, ResidualBlock};

/// Write one line per node: `id x y theta`.
pub fn write_nodes<P: AsRef<Path>>(path: P, graph: &PoseGraph) -> Result<(), IoError> {
    info!(path = %path.as_ref().display(), "writing pose-graph nodes");
    let mut writer = BufWriter::new(File::create(path)?);
    for node in graph.nodes() {
        writeln!(
            writer,
            "{} {} {} {}",
            node.id, node.pose.x, node.pose.y, node.pose.z
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one line per edge: `a b kind_code`, in report order.
pub fn write_edges<P: AsRef<Path>>(path: P, graph: &PoseGraph) -> Result<(), IoError> {
    info!(path = %path.as_ref().display(), "writing pose-graph edges");
    let mut writer = BufWriter::new(File::create(path)?);
    for edge in graph.edges() {
        writeln!(writer, "{} {} {}", edge.a, edge.b, edge.kind.code())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the sectioned robust-weight report.
///
/// `priors` must hold one weight per closure/bogus block in block order
/// (the shape returned by [`Problem::robust_weights`] at load time); the
/// second column is each block's weight at the graph's current poses.
/// Odometry rows are fixed at 1.0/1.0.
pub fn write_weights<P: AsRef<Path>>(
    path: P,
    graph: &PoseGraph,
    problem: &Problem,
    priors: &[f64],
) -> Result<(), IoError> {
    let robust: Vec<&ResidualBlock> = problem
        .blocks
        .iter()
        .filter(|b| b.kind != EdgeKind::Odometry)
        .collect();
    if priors.len() != robust.len() {
        return Err(IoError::PriorCountMismatch {
            expected: robust.len(),
            actual: priors.len(),
        });
    }

    info!(path = %path.as_ref().display(), "writing robust-weight report");
    let mut writer = BufWriter::new(File::create(path)?);

    // Block order is odometry, closure, bogus, so chaining the fixed-weight
    // odometry rows with the prior-paired robust rows preserves it.
    let odometry_rows = problem
        .blocks
        .iter()
        .filter(|b| b.kind == EdgeKind::Odometry)
        .map(|block| (block, 1.0, 1.0));
    let robust_rows = robust.into_iter().zip(priors).map(|(block, &prior)| {
        let current = block.weight(graph.pose(block.a), graph.pose(block.b));
        (block, prior, current)
    });

    let mut section = None;
    for (block, prior, current) in odometry_rows.chain(robust_rows) {
        if section != Some(block.kind) {
            section = Some(block.kind);
            let header = match block.kind {
                EdgeKind::Odometry => "ODOMETRY EDGES",
                EdgeKind::Closure => "CLOSURE EDGES",
                EdgeKind::Bogus => "BOGUS EDGES",
            };
            writeln!(writer, "{header}")?;
        }
        writeln!(
            writer,
            "{} {} {} {} {}",
            block.a,
            block.b,
            block.kind.code(),
            prior,
            current
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AssemblyConfig;
    use crate::io::G2oLoader;
    use std::fs;

    const GRAPH: &str = "\
VERTEX_SE2 0 0.0 0.0 0.0
VERTEX_SE2 1 1.0 0.0 0.0
VERTEX_SE2 2 2.0 0.0 0.0
VERTEX_SE2 3 3.0 0.0 0.0
VERTEX_SE2 4 4.0 0.0 0.0
VERTEX_SE2 5 5.0 0.0 0.0
EDGE_SE2 0 1 1.0 0.0 0.0 1 0 0 1 0 1
EDGE_SE2 0 5 5.0 0.0 0.0 1 0 0 1 0 1
";

    #[test]
    fn test_node_file_format() {
        let graph = G2oLoader::parse_str(GRAPH).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        write_nodes(&path, &graph).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "0 0 0 0");
        assert_eq!(lines[5], "5 5 0 0");
    }

    #[test]
    fn test_edge_file_format() {
        let graph = G2oLoader::parse_str(GRAPH).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.txt");
        write_edges(&path, &graph).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["0 1 0", "0 5 1"]);
    }

    #[test]
    fn test_weight_report_sections_and_priors() {
        let graph = G2oLoader::parse_str(GRAPH).unwrap();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        let priors = problem.robust_weights(&graph);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.txt");
        write_weights(&path, &graph, &problem, &priors).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["ODOMETRY EDGES", "0 1 0 1 1", "CLOSURE EDGES", "0 5 1 1 1"]
        );
    }

    #[test]
    fn test_weight_report_rejects_wrong_prior_count() {
        let graph = G2oLoader::parse_str(GRAPH).unwrap();
        let problem = graph.assemble(&AssemblyConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.txt");
        let result = write_weights(&path, &graph, &problem, &[1.0, 1.0]);
        assert!(matches!(
            result,
            Err(IoError::PriorCountMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
