use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mtcore::algorithm::tree_walk::build_tree_walk_indices_par;
use mtcore::algorithm::utility::TREE_HEADER_PREFIX;
use mtcore::data::halo::HaloForest;
use mtdf::config::{ConvertConfig, OutputFormat};
use mtdf::data::catalog::{check_forests_locations_filenames, parallel_ctrees_filenames};
use mtdf::data::handle::ForestCatalog;
use mtdf::data::io::{load_halo_forests, save_catalog, save_halo_forests};

#[derive(Parser)]
#[command(name = "mtdf")]
#[command(about = "Byte ranges and tree-walk indices for Consistent-Trees catalogues")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file; command line flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the tree and forest tables of a catalogue
    Locate(LocateArgs),

    /// Write the raw trees of one forest to a file
    Extract(ExtractArgs),

    /// Build the tree-walk indices of every forest in a halo forest file
    TreeWalk(TreeWalkArgs),
}

#[derive(Args)]
struct TablesArgs {
    /// forests.list and locations.dat, in either order
    #[arg(num_args = 2, conflicts_with = "parallel_ctrees")]
    tables: Vec<PathBuf>,

    /// Tree data file of the parallel Consistent-Trees code; the
    /// <base>.forest and <base>.loc tables next to it are used
    #[arg(long)]
    parallel_ctrees: Option<PathBuf>,
}

#[derive(Args)]
struct OutputArgs {
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Do not zstd-compress bincode output
    #[arg(long)]
    no_compress: bool,
}

#[derive(Args)]
struct LocateArgs {
    #[command(flatten)]
    tables: TablesArgs,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
struct ExtractArgs {
    #[command(flatten)]
    tables: TablesArgs,

    #[arg(long)]
    forest_id: i64,

    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct TreeWalkArgs {
    /// Halo forests saved by the halo reader
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    out: OutputArgs,

    /// Number of threads (0 = all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Drop forests whose indices cannot be built instead of aborting
    #[arg(long)]
    skip_failed: bool,
}

impl TablesArgs {
    fn apply(&self, cfg: &mut ConvertConfig) {
        if let Some(tree_file) = &self.parallel_ctrees {
            let (forests, locations, _) = parallel_ctrees_filenames(tree_file);
            cfg.forests_file = Some(forests);
            cfg.locations_file = Some(locations);
        } else if let [first, second] = self.tables.as_slice() {
            cfg.forests_file = Some(first.clone());
            cfg.locations_file = Some(second.clone());
        }
    }
}

impl OutputArgs {
    fn apply(&self, cfg: &mut ConvertConfig) {
        if let Some(output) = &self.output {
            cfg.output = Some(output.clone());
        }
        if let Some(format) = self.format {
            cfg.format = format;
        }
        if self.no_compress {
            cfg.compress = false;
        }
    }
}

fn open_catalog(cfg: &ConvertConfig) -> anyhow::Result<ForestCatalog> {
    let (Some(first), Some(second)) = (&cfg.forests_file, &cfg.locations_file) else {
        bail!("the forests and locations files are required (positional, --parallel-ctrees or config)");
    };
    let (forests, locations) = check_forests_locations_filenames(first, second)?;
    Ok(ForestCatalog::open(&forests, &locations)?)
}

fn locate(args: &LocateArgs, mut cfg: ConvertConfig) -> anyhow::Result<()> {
    args.tables.apply(&mut cfg);
    args.out.apply(&mut cfg);

    let catalog = open_catalog(&cfg)?;
    let largest = catalog.forests.iter().max_by_key(|f| f.input_forest_nbytes);
    println!("trees:   {}", catalog.num_trees());
    println!("forests: {}", catalog.num_forests());
    if let Some(f) = largest {
        println!("largest forest: {} ({} trees, {} bytes)", f.forest_id, f.ntrees, f.input_forest_nbytes);
    }

    if let Some(output) = &cfg.output {
        save_catalog(output, &catalog, cfg.format, cfg.compress)
            .with_context(|| format!("writing {:?}", output))?;
        info!("Wrote tree and forest tables to {:?}", output);
    }
    Ok(())
}

fn extract(args: &ExtractArgs, mut cfg: ConvertConfig) -> anyhow::Result<()> {
    args.tables.apply(&mut cfg);

    let catalog = open_catalog(&cfg)?;
    let blocks = catalog.read_forest_blocks(args.forest_id)?;

    let f = File::create(&args.output).with_context(|| format!("creating {:?}", args.output))?;
    let mut w = BufWriter::new(f);
    for block in &blocks {
        writeln!(w, "{}{}", TREE_HEADER_PREFIX, block.tree_root_id)?;
        w.write_all(&block.bytes)?;
    }
    w.flush()?;

    info!("Wrote {} trees of forest {} to {:?}", blocks.len(), args.forest_id, args.output);
    Ok(())
}

fn tree_walk(args: &TreeWalkArgs, mut cfg: ConvertConfig) -> anyhow::Result<()> {
    args.out.apply(&mut cfg);
    if let Some(threads) = args.threads {
        cfg.num_threads = threads;
    }
    if args.skip_failed {
        cfg.skip_failed_forests = true;
    }
    let Some(output) = cfg.output.clone() else {
        bail!("--output is required for tree-walk");
    };

    let t0 = Instant::now();
    let mut forests: Vec<HaloForest> = load_halo_forests(&args.input, cfg.format)
        .with_context(|| format!("reading {:?}", args.input))?;
    info!("Loaded {} forests in {:.2} seconds", forests.len(), t0.elapsed().as_secs_f64());

    let t0 = Instant::now();
    let summary = build_tree_walk_indices_par(&mut forests, &cfg.tree_walk_opts())?;
    info!(
        "Built tree-walk indices for {} forests ({} halos). Time taken = {:.2} seconds",
        summary.forests_done,
        summary.halos_done,
        t0.elapsed().as_secs_f64()
    );

    if !summary.failed.is_empty() {
        for (forest_id, e) in &summary.failed {
            warn!("Skipping forest {}: {}", forest_id, e.root());
        }
        let failed: HashSet<i64> = summary.failed.iter().map(|(id, _)| *id).collect();
        forests.retain(|f| !failed.contains(&f.forest_id));
    }

    save_halo_forests(&output, &forests, cfg.format, cfg.compress)
        .with_context(|| format!("writing {:?}", output))?;
    info!("Wrote {} forests to {:?}", forests.len(), output);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let cfg = match &cli.config {
        Some(path) => ConvertConfig::from_json_file(path)?,
        None => ConvertConfig::default(),
    };

    match &cli.command {
        Commands::Locate(args) => locate(args, cfg),
        Commands::Extract(args) => extract(args, cfg),
        Commands::TreeWalk(args) => tree_walk(args, cfg),
    }
}
