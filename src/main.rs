use anyhow::{anyhow, Result};
use clap::Parser;
use repertoire_community_analyzer::{data, detect_communities, storage, CommunityConfig};

#[derive(Parser, Debug)]
#[clap(
    name = "repertoire-community-analyzer",
    about = "Community detection and occupancy statistics for immune-receptor clone graphs"
)]
struct Cli {
    /// Path to a JSON graph document
    #[clap(long, conflicts_with_all = ["nodes", "edges"])]
    graph: Option<String>,

    /// Path to a Parquet table of clones
    #[clap(long, requires = "edges")]
    nodes: Option<String>,

    /// Path to a Parquet table of per-chain edges
    #[clap(long, requires = "nodes")]
    edges: Option<String>,

    /// Output directory for results
    #[clap(long, default_value = "community_results")]
    output_dir: String,

    /// Partitioning algorithm (louvain or leiden)
    #[clap(long, default_value = "leiden")]
    algorithm: String,

    /// Resolution parameter; higher values give more, smaller communities
    #[clap(long, default_value = "1.0")]
    resolution: f64,

    /// Edge score used per chain (nweight or ncweight)
    #[clap(long, default_value = "ncweight")]
    weight: String,

    /// Combination policy (average, strict or loose)
    #[clap(long, default_value = "average")]
    metric: String,

    /// Chains to compare, one or two of CDR3a, CDR3b, CDR3g, CDR3d, CDR3h, CDR3l
    #[clap(long, value_delimiter = ',', default_value = "CDR3a,CDR3b")]
    chains: Vec<String>,

    /// Seed for reproducible partitioning
    #[clap(long)]
    seed: Option<u64>,

    /// Maximum local-moving sweeps per level
    #[clap(long, default_value = "100")]
    max_iterations: usize,

    /// Maximum aggregation levels
    #[clap(long, default_value = "10")]
    max_levels: usize,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // 1. Validate configuration before touching any input
    let mut config = CommunityConfig::from_names(
        &args.algorithm,
        args.resolution,
        &args.weight,
        &args.metric,
        args.chains.as_slice(),
    )?;
    config.seed = args.seed;
    config.max_iterations = args.max_iterations;
    config.max_levels = args.max_levels;
    config.validate()?;

    // 2. Load graph
    let graph = match (&args.graph, &args.nodes, &args.edges) {
        (Some(path), _, _) => data::load_graph_json(path)?,
        (None, Some(nodes), Some(edges)) => data::load_graph_parquet(nodes, edges)?,
        _ => return Err(anyhow!("provide --graph or both --nodes and --edges")),
    };

    log::info!(
        "Loaded graph with {} clones and {} chain edges",
        graph.node_count(),
        graph.edge_count()
    );

    // 3. Detect communities
    let result = detect_communities(&graph, &config)?;

    // 4. Save results
    storage::save_results(&result, &args.output_dir)?;

    log::info!("Analysis complete. Results saved to {}", args.output_dir);

    Ok(())
}
