//! logroute - route file checker
//!
//! Loads a route file, compiles it into a stage graph and either validates
//! the full lifecycle (`check`) or prints the compiled graph (`dump`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use logroute_rs::{config, BuiltinStages, CompiledTree};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "logroute")]
#[command(author, version, about = "Compile and inspect log routing configurations", long_about = None)]
struct Args {
    /// Also write logs to this directory
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile, start and stop a route file, reporting any error
    Check {
        /// Route file (defaults to the per-user routes.toml)
        file: Option<PathBuf>,
    },
    /// Print the compiled stage graph
    Dump {
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
        format: DumpFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_dir.as_deref())?;

    match args.command {
        Command::Check { file } => check(&route_file(file)?),
        Command::Dump { file, format } => dump(&route_file(file)?, format),
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,logroute_rs=debug"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::never(dir, "logroute.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn route_file(file: Option<PathBuf>) -> Result<PathBuf> {
    file.or_else(config::default_route_file)
        .context("No route file given and no default configuration directory")
}

fn load(path: &Path) -> Result<CompiledTree> {
    let factory = BuiltinStages::new();
    let mut tree = config::load_tree(path, &factory)?;
    tree.compile()
        .with_context(|| format!("Failed to compile {:?}", path))?;
    Ok(tree)
}

fn check(path: &Path) -> Result<()> {
    let mut tree = load(path)?;
    if let Err(err) = tree.start() {
        tree.free();
        return Err(err).with_context(|| format!("Failed to start {:?}", path));
    }
    let stages = tree.graph().len();
    let stopped = tree.stop();
    tree.free();
    stopped.with_context(|| format!("Failed to stop {:?}", path))?;

    println!("{}: OK, {} stage(s)", path.display(), stages);
    Ok(())
}

fn dump(path: &Path, format: DumpFormat) -> Result<()> {
    let tree = load(path)?;
    let snapshot = tree.snapshot();
    match format {
        DumpFormat::Text => print!("{snapshot}"),
        DumpFormat::Json => println!("{}", snapshot.to_json()?),
    }
    tree.free();
    Ok(())
}
