use clap::{Args, Parser, Subcommand};
use minhash_knn::{ops, MinHashParams};
use serde_json::Value;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "minhash-knn",
    version,
    about = "Approximate nearest neighbors over sparse binary data with MinHash"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Index parameters shared by every subcommand. Flags override `--config`.
#[derive(Args)]
struct IndexArgs {
    /// JSON file holding index parameters
    #[arg(long)]
    config: Option<String>,
    /// JSON field holding feature ids or text, for object rows
    #[arg(short, long, default_value = "features")]
    field: String,
    /// Number of hash functions
    #[arg(long)]
    hash_functions: Option<usize>,
    /// Minima combined into one index key
    #[arg(long)]
    block_size: Option<usize>,
    /// Maximum ids per bucket
    #[arg(long)]
    max_bin_size: Option<usize>,
    /// Minimum shared blocks for a candidate
    #[arg(long)]
    min_blocks: Option<usize>,
    /// Candidate pool multiplier
    #[arg(long)]
    excess_factor: Option<usize>,
    /// Worker threads (0 = all cores)
    #[arg(long)]
    cores: Option<usize>,
    /// Hash family seed
    #[arg(long)]
    seed: Option<u64>,
}

impl IndexArgs {
    fn params(&self) -> MinHashParams {
        let mut params = match &self.config {
            Some(path) => MinHashParams::from_json_file(path).unwrap_or_else(|e| {
                eprintln!("{e}");
                std::process::exit(1);
            }),
            None => MinHashParams::default(),
        };
        if let Some(v) = self.hash_functions {
            params.number_of_hash_functions = v;
        }
        if let Some(v) = self.block_size {
            params.block_size = v;
        }
        if let Some(v) = self.max_bin_size {
            params.max_bin_size = v;
        }
        if let Some(v) = self.min_blocks {
            params.minimal_blocks_in_common = v;
        }
        if let Some(v) = self.excess_factor {
            params.excess_factor = v;
        }
        if let Some(v) = self.cores {
            params.number_of_cores = v;
        }
        if let Some(v) = self.seed {
            params.hash_seed = v;
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Neighbors of every row read from stdin
    Neighbors {
        #[command(flatten)]
        index: IndexArgs,
        /// Neighbors per row (default: n_neighbors from the config)
        #[arg(short)]
        k: Option<usize>,
        /// Query mode: fast, candidates, refined
        #[arg(short, long, default_value = "fast")]
        mode: String,
    },
    /// Look up stdin rows against an index built from a JSON file
    Query {
        #[command(flatten)]
        index_args: IndexArgs,
        /// JSON array of rows to index
        #[arg(long)]
        index: String,
        #[arg(short)]
        k: Option<usize>,
        /// Query mode: fast, candidates, refined
        #[arg(short, long, default_value = "fast")]
        mode: String,
    },
    /// k-neighbor graph as an edge list
    Graph {
        #[command(flatten)]
        index: IndexArgs,
        #[arg(short)]
        k: Option<usize>,
        /// Edge weights: connectivity, distance
        #[arg(long, default_value = "connectivity")]
        weights: String,
        /// Add the reverse of every edge
        #[arg(long)]
        symmetric: bool,
        /// Query mode: fast, candidates, refined
        #[arg(short, long, default_value = "fast")]
        mode: String,
    },
    /// Bucket statistics of the inverse index
    Distribution {
        #[command(flatten)]
        index: IndexArgs,
        /// Run one pruning pass before reporting
        #[arg(long)]
        prune: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Neighbors { index, k, mode } => {
            let rows = read_stdin_json();
            ops::op_neighbors(&rows, &index.field, &index.params(), k, &mode)
        }
        Commands::Query {
            index_args,
            index,
            k,
            mode,
        } => {
            let indexed = read_json_file(&index);
            let queries = read_stdin_json();
            ops::op_query(
                &indexed,
                &queries,
                &index_args.field,
                &index_args.params(),
                k,
                &mode,
            )
        }
        Commands::Graph {
            index,
            k,
            weights,
            symmetric,
            mode,
        } => {
            let rows = read_stdin_json();
            ops::op_graph(
                &rows,
                &index.field,
                &index.params(),
                k,
                &weights,
                symmetric,
                &mode,
            )
        }
        Commands::Distribution { index, prune } => {
            let rows = read_stdin_json();
            ops::op_distribution(&rows, &index.field, &index.params(), prune)
        }
    };

    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_rows(buf: &str, source: &str) -> Vec<Value> {
    let parsed: Value = serde_json::from_str(buf).unwrap_or_else(|e| {
        eprintln!("Invalid JSON in {source}: {e}");
        std::process::exit(1);
    });
    match parsed {
        Value::Array(arr) => arr,
        single => vec![single],
    }
}

fn read_stdin_json() -> Vec<Value> {
    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("Failed to read stdin: {e}");
        std::process::exit(1);
    }
    parse_rows(&buf, "stdin")
}

fn read_json_file(path: &str) -> Vec<Value> {
    let buf = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read '{path}': {e}");
        std::process::exit(1);
    });
    parse_rows(&buf, path)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}
