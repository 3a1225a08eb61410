use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ocean_acquire::data::store;
use ocean_acquire::display::{hex, StyleTable};
use ocean_acquire::{AcquireConfig, Acquirer, Dataset, RemoteDescriptor};

#[derive(Parser, Debug)]
#[command(name = "ocean-acquire")]
#[command(about = "Download CTD / glider tables once and keep them as time-depth grids")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory relative paths are resolved against (overrides the config)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bedford Basin Monitoring Program aggregated CTD profiles
    Bbmp {
        #[arg(long, default_value = "data/raw/bedford_basin_monitoring_program.parquet")]
        output: PathBuf,
    },
    /// Ocean Tracking Network glider deployment from ERDDAP
    Glider {
        /// Deployment ID, e.g. otn200_20151027_53_delayed
        id: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Any source described by a JSON descriptor file
    Fetch {
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Summarise a stored dataset
    Describe {
        path: PathBuf,
        /// Number of grid cells to print
        #[arg(long, default_value = "0")]
        rows: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AcquireConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AcquireConfig::default(),
    };
    if let Some(base_dir) = cli.base_dir {
        config = config.with_base_dir(base_dir);
    }

    match cli.command {
        Command::Bbmp { output } => {
            let acquirer = Acquirer::new(config).context("setting up acquirer")?;
            let dataset = acquirer
                .acquire(&output, &RemoteDescriptor::bbmp_aggregated())
                .context("acquiring BBMP profiles")?;
            summarise(&dataset);
        }
        Command::Glider { id, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(format!("data/raw/{id}.parquet")));
            let acquirer = Acquirer::new(config).context("setting up acquirer")?;
            let dataset = acquirer
                .acquire(&output, &RemoteDescriptor::otn_glider(&id))
                .with_context(|| format!("acquiring glider deployment {id}"))?;
            summarise(&dataset);
        }
        Command::Fetch { descriptor, output } => {
            let text = std::fs::read_to_string(&descriptor)
                .with_context(|| format!("reading {}", descriptor.display()))?;
            let descriptor: RemoteDescriptor =
                serde_json::from_str(&text).context("parsing descriptor")?;
            let acquirer = Acquirer::new(config).context("setting up acquirer")?;
            let dataset = acquirer
                .acquire(&output, &descriptor)
                .with_context(|| format!("acquiring {}", descriptor.source))?;
            summarise(&dataset);
        }
        Command::Describe { path, rows } => {
            let path = config.resolve(&path);
            info!("reading {}", path.display());
            let dataset = store::load(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            summarise(&dataset);
            if rows > 0 {
                println!("{}", store::preview(&dataset, rows)?);
            }
        }
    }

    Ok(())
}

fn summarise(dataset: &Dataset) {
    let times = dataset.times();
    let depths = dataset.depths();

    match (times.first(), times.last()) {
        (Some(first), Some(last)) => println!("time: {} steps, {first} .. {last}", times.len()),
        _ => println!("time: empty"),
    }
    match (depths.first(), depths.last()) {
        (Some(top), Some(bottom)) => println!(
            "{}: {} levels, {top} .. {bottom}",
            dataset.depth_name(),
            depths.len()
        ),
        _ => println!("{}: empty", dataset.depth_name()),
    }

    let styles = StyleTable::standard();
    for var in dataset.variables() {
        let style = styles.style_for(&var.name);
        let present = var.values.iter().filter(|v| v.is_some()).count();
        let limits = match style.bounds(dataset, &var.name) {
            Some((lo, hi)) => format!(
                "{lo} .. {hi} ({} .. {})",
                hex(style.color_scale.color_at(0.0)),
                hex(style.color_scale.color_at(1.0))
            ),
            None => "no data".to_string(),
        };
        println!(
            "  {:<14} {:<32} {:<8} {present}/{} cells, limits {limits}",
            var.name,
            style.title(),
            style.color_scale.to_string(),
            dataset.n_cells()
        );
    }
}
