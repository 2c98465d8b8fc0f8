//! Pose-graph construction driver
//!
//! Loads a 2D g2o dataset, injects synthetic false loop-closures, assembles
//! the residual blocks (DCS or plain), and writes the pre-optimization
//! node/edge/weight files. The nonlinear solve itself is performed by an
//! external solver consuming the assembled problem.
//!
//! ```bash
//! cargo run --bin build_graph -- data/INTEL.g2o --bogus 50
//! cargo run --bin build_graph -- data/INTEL.g2o --bogus 50 --no-dcs
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use dcs_pgo::graph::AssemblyConfig;
use dcs_pgo::init_logger;
use dcs_pgo::io::{report, G2oLoader};

/// Build a robust 2D pose-graph problem from a g2o dataset
#[derive(Parser)]
#[command(name = "build_graph")]
#[command(about = "Build a robust 2D pose-graph problem from a g2o dataset")]
struct Args {
    /// G2O dataset file to load
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Number of synthetic bogus loop-closures to inject
    #[arg(short, long, default_value = "0")]
    bogus: usize,

    /// Use the plain rigid residual for closure/bogus edges instead of DCS
    #[arg(long)]
    no_dcs: bool,

    /// RNG seed for bogus-edge injection (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the init_nodes/init_edges/init_weights files
    #[arg(short, long, default_value = "save")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logger();

    info!(file = %args.file.display(), "reading pose graph");
    let mut graph = G2oLoader::load(&args.file)?;

    if args.bogus > 0 {
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        graph.inject_bogus_edges(args.bogus, &mut rng)?;
    }

    info!(total = graph.node_count(), "nodes");
    info!(
        odometry = graph.odometry_edges().len(),
        closure = graph.closure_edges().len(),
        bogus = graph.bogus_edges().len(),
        "edges"
    );

    let config = AssemblyConfig {
        robust_closures: !args.no_dcs,
        ..AssemblyConfig::default()
    };
    let problem = graph.assemble(&config)?;
    let priors = problem.robust_weights(&graph);
    info!(
        blocks = problem.blocks.len(),
        residual_dimension = problem.total_residual_dimension,
        fixed_node = problem.fixed_node,
        dcs = !args.no_dcs,
        initial_cost = problem.total_cost(&graph),
        "problem assembled"
    );

    std::fs::create_dir_all(&args.output_dir)?;
    report::write_nodes(args.output_dir.join("init_nodes.txt"), &graph)?;
    report::write_edges(args.output_dir.join("init_edges.txt"), &graph)?;
    report::write_weights(
        args.output_dir.join("init_weights.txt"),
        &graph,
        &problem,
        &priors,
    )?;

    Ok(())
}
