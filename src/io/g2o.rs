//! G2O text format loader
//!
//! Supported records:
//!
//! ```text
//! VERTEX_SE2 id x y theta                      (alias VERTEX2)
//! EDGE_SE2 a b dx dy dtheta I11 I12 I13 I22 I23 I33   (alias EDGE2)
//! ```
//!
//! The six information values are the upper triangle of the symmetric 3×3
//! information matrix; they are stored on the edge but unused by the
//! residuals. Unknown record types are skipped for compatibility. Nodes must
//! be declared before edges reference them.

use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::Path;

use nalgebra::{Matrix3, Vector3};

use super::IoError;
use crate::graph::{GraphError, PoseGraph};

/// Line count above which parsing switches to the parallel path.
const PARALLEL_THRESHOLD: usize = 5000;

struct VertexRecord {
    id: usize,
    x: f64,
    y: f64,
    theta: f64,
}

struct EdgeRecord {
    a: usize,
    b: usize,
    measurement: Vector3<f64>,
    information: Matrix3<f64>,
}

enum ParsedItem {
    Vertex(VertexRecord),
    Edge(EdgeRecord),
}

/// G2O file loader
pub struct G2oLoader;

impl G2oLoader {
    /// Load a pose graph from a g2o file via a memory map.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PoseGraph, IoError> {
        let file = File::open(path)?;
        // Safety: the map is read-only and dropped before this fn returns.
        let mmap = unsafe { Mmap::map(&file)? };
        let content = std::str::from_utf8(&mmap)?;
        Self::parse_str(content)
    }

    /// Parse g2o content from a string.
    pub fn parse_str(content: &str) -> Result<PoseGraph, IoError> {
        let lines: Vec<&str> = content.lines().collect();

        let items: Vec<(usize, ParsedItem)> = if lines.len() > PARALLEL_THRESHOLD {
            let parsed: Result<Vec<_>, IoError> = lines
                .par_iter()
                .enumerate()
                .map(|(line_num, line)| Self::parse_line(line, line_num + 1))
                .collect();
            parsed?.into_iter().flatten().collect()
        } else {
            let mut collected = Vec::with_capacity(lines.len());
            for (line_num, line) in lines.iter().enumerate() {
                if let Some(item) = Self::parse_line(line, line_num + 1)? {
                    collected.push(item);
                }
            }
            collected
        };

        // Insertion stays in line order so declared-before-referenced
        // semantics survive the parallel parse.
        let mut graph = PoseGraph::new();
        for (line, item) in items {
            match item {
                ParsedItem::Vertex(v) => graph.add_node(v.id, v.x, v.y, v.theta),
                ParsedItem::Edge(e) => {
                    graph
                        .add_edge(e.a, e.b, e.measurement, e.information)
                        .map_err(|err| match err {
                            GraphError::UnknownNode(id) => IoError::UndeclaredNode { line, id },
                            // add_edge only raises UnknownNode
                            _ => IoError::MissingFields { line },
                        })?;
                }
            }
        }
        Ok(graph)
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Option<(usize, ParsedItem)>, IoError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let item = match parts[0] {
            "VERTEX_SE2" | "VERTEX2" => {
                Some(ParsedItem::Vertex(Self::parse_vertex(&parts, line_num)?))
            }
            "EDGE_SE2" | "EDGE2" => Some(ParsedItem::Edge(Self::parse_edge(&parts, line_num)?)),
            _ => None, // Skip unknown types
        };
        Ok(item.map(|item| (line_num, item)))
    }

    fn parse_vertex(parts: &[&str], line_num: usize) -> Result<VertexRecord, IoError> {
        if parts.len() < 5 {
            return Err(IoError::MissingFields { line: line_num });
        }
        Ok(VertexRecord {
            id: field(parts, 1, line_num)?,
            x: field(parts, 2, line_num)?,
            y: field(parts, 3, line_num)?,
            theta: field(parts, 4, line_num)?,
        })
    }

    fn parse_edge(parts: &[&str], line_num: usize) -> Result<EdgeRecord, IoError> {
        if parts.len() < 12 {
            return Err(IoError::MissingFields { line: line_num });
        }
        let a = field(parts, 1, line_num)?;
        let b = field(parts, 2, line_num)?;
        let dx = field(parts, 3, line_num)?;
        let dy = field(parts, 4, line_num)?;
        let dtheta = field(parts, 5, line_num)?;
        let i11: f64 = field(parts, 6, line_num)?;
        let i12: f64 = field(parts, 7, line_num)?;
        let i13: f64 = field(parts, 8, line_num)?;
        let i22: f64 = field(parts, 9, line_num)?;
        let i23: f64 = field(parts, 10, line_num)?;
        let i33: f64 = field(parts, 11, line_num)?;
        Ok(EdgeRecord {
            a,
            b,
            measurement: Vector3::new(dx, dy, dtheta),
            information: Matrix3::new(i11, i12, i13, i12, i22, i23, i13, i23, i33),
        })
    }
}

fn field<T: std::str::FromStr>(parts: &[&str], index: usize, line: usize) -> Result<T, IoError> {
    parts[index].parse().map_err(|_| IoError::InvalidNumber {
        line,
        value: parts[index].to_string(),
    })
}
