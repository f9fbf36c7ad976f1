//! Symdex CLI
//!
//! Command-line interface for building and querying a symbol index.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use symdex_core::{Loader, LoaderConfig};
use symdex_indexer::Finder;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(about = "Symdex - find the file that defines a symbol")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./symdex.yaml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding cache artifacts
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Directory or file to index; replaces the configured roots
    #[arg(short, long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// Log what the indexer is doing
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from scratch
    Rebuild,

    /// Rescan changed files and persist the index
    Refresh,

    /// Print the file defining a symbol
    Resolve {
        /// Namespace-qualified symbol name
        name: String,
    },

    /// List every indexed symbol with its file
    List,

    /// Search the roots with glob masks
    Find {
        /// Masks to match, e.g. "*.php" or "src/**/Test*.php"
        #[arg(required = true)]
        masks: Vec<String>,

        /// Masks of entries to skip, e.g. "vendor/**"
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Match directories instead of files
        #[arg(long)]
        dirs: bool,

        /// Do not descend more than this many levels
        #[arg(long)]
        max_depth: Option<usize>,

        /// List directory contents before the directory itself
        #[arg(long)]
        child_first: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Rebuild => cmd_rebuild(open_loader(config, &cli)?),
        Commands::Refresh => cmd_refresh(open_loader(config, &cli)?),
        Commands::Resolve { ref name } => cmd_resolve(open_loader(config, &cli)?, name),
        Commands::List => cmd_list(open_loader(config, &cli)?),
        Commands::Find {
            ref masks,
            ref exclude,
            dirs,
            max_depth,
            child_first,
        } => cmd_find(&config.roots, masks, exclude, dirs, max_depth, child_first),
    }
}

fn init_logging(verbose: bool) {
    if !verbose && std::env::var("RUST_LOG").is_err() {
        return;
    }

    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("symdex.yaml");
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("symdex").join("config.yaml"))
        .filter(|path| path.is_file())
}

fn load_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => LoaderConfig::load_from(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    if !cli.roots.is_empty() {
        config.roots = cli.roots.iter().map(|r| cwd.join(r)).collect();
    }
    if config.roots.is_empty() {
        config.roots.push(cwd);
    }

    Ok(config)
}

fn open_loader(config: LoaderConfig, cli: &Cli) -> Result<Loader> {
    let cache_dir = cli
        .cache_dir
        .clone()
        .or_else(|| config.cache_dir.clone())
        .or_else(LoaderConfig::default_cache_dir)
        .context("No cache directory available; pass --cache-dir")?;

    let config = config
        .set_cache_dir(&cache_dir)
        .with_context(|| format!("Failed to prepare cache directory {}", cache_dir.display()))?;

    Ok(Loader::new(config))
}

fn cmd_rebuild(mut loader: Loader) -> Result<()> {
    loader.rebuild().context("Rebuild failed")?;
    let symbols = loader.indexed_symbols()?.len();
    println!("✓ Indexed {} symbols", symbols);
    Ok(())
}

fn cmd_refresh(mut loader: Loader) -> Result<()> {
    if loader.refresh().context("Refresh failed")? {
        println!("✓ Index refreshed");
    } else {
        println!("✓ Index built");
    }
    println!("  Symbols: {}", loader.indexed_symbols()?.len());
    println!("  Files scanned: {}", loader.stats().scanned_files);
    Ok(())
}

fn cmd_resolve(mut loader: Loader, name: &str) -> Result<()> {
    match loader.resolve(name)? {
        Some(file) => {
            println!("{}", file.display());
            Ok(())
        }
        None => anyhow::bail!("Symbol {} not found", name),
    }
}

fn cmd_list(mut loader: Loader) -> Result<()> {
    for (symbol, file) in loader.indexed_symbols()? {
        println!("{}\t{}", symbol, file.display());
    }
    Ok(())
}

fn cmd_find(
    roots: &[PathBuf],
    masks: &[String],
    exclude: &[String],
    dirs: bool,
    max_depth: Option<usize>,
    child_first: bool,
) -> Result<()> {
    let finder = if dirs {
        Finder::find_directories(masks)?
    } else {
        Finder::find_files(masks)?
    };

    let mut finder = finder
        .from(roots.iter().map(PathBuf::as_path))?
        .exclude(exclude)?
        .child_first(child_first)
        .sort_by_name();
    if let Some(depth) = max_depth {
        finder = finder.limit_depth(depth);
    }

    let cwd = std::env::current_dir().ok();
    let mut count = 0;
    for record in finder.iter()? {
        let record = record?;
        println!("{}", display_path(&record.path, cwd.as_deref()));
        count += 1;
    }
    tracing::info!(matches = count, "Search complete");
    Ok(())
}

fn display_path(path: &Path, cwd: Option<&Path>) -> String {
    cwd.and_then(|cwd| path.strip_prefix(cwd).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}
