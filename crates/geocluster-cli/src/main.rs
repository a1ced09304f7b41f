use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "geocluster",
    about = "Geocluster: zoom-keyed clustering of geo-located sensor readings",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a JSON array of sensor points for one view.
    ///
    /// Each point is an object with `id`, `lat`, `lon`, `value` and an
    /// optional `timestamp` (epoch milliseconds).
    Cluster {
        /// Path to the JSON point file ("-" for stdin)
        #[arg(short, long)]
        input: String,
        /// Zoom level (integer or fractional)
        #[arg(short, long, default_value_t = 0.0)]
        zoom: f64,
        /// Maximum number of output clusters
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        max_clusters: Option<i64>,
        /// Viewport as minLat,maxLat,minLon,maxLon
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: Option<String>,
        /// Engine config file (TOML)
        #[arg(short, long)]
        config: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Time the engine on a synthetic feed.
    Bench {
        /// Number of synthetic sensor points
        #[arg(short, long, default_value_t = 10_000)]
        points: usize,
        /// Zoom level
        #[arg(short, long, default_value_t = 4.0)]
        zoom: f64,
        /// Maximum number of output clusters
        #[arg(short = 'k', long)]
        max_clusters: Option<i64>,
        /// RNG seed for the synthetic feed
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        /// Timed iterations
        #[arg(short, long, default_value_t = 20)]
        iterations: u32,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geocluster=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster {
            input,
            zoom,
            max_clusters,
            bbox,
            config,
            format,
        } => commands::cluster::run(&commands::cluster::ClusterArgs {
            input,
            zoom,
            max_clusters,
            bbox,
            config,
            format,
        }),
        Commands::Bench {
            points,
            zoom,
            max_clusters,
            seed,
            iterations,
        } => commands::bench::run(points, zoom, max_clusters, seed, iterations),
    }
}
