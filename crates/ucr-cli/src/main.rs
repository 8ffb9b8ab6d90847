//! UCR reporting-switch DiD CLI

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ucr_core::DataSource;
use ucr_inference::CallawaySantAnna;
use ucr_report::{OutputNames, combine_source, prepare_source, run_source};

#[derive(Parser)]
#[command(name = "ucr-did")]
#[command(about = "Staggered DiD analysis of the NIBRS reporting switch on UCR panels")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured category for one data source
    Run {
        /// Run configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured data source (fbi | alt)
        #[arg(long)]
        source: Option<DataSource>,

        /// Shift every onset one year later (falsification run)
        #[arg(long)]
        placebo: bool,

        /// Override the configured output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Rebuild the master table from persisted simple-ATT CSVs
    Combine {
        /// Directory holding `{source}_{abbr}_simple_att.csv` files
        #[arg(long)]
        out_dir: PathBuf,

        /// Data source (fbi | alt)
        #[arg(long)]
        source: DataSource,

        /// Combine the placebo run's files
        #[arg(long)]
        placebo: bool,
    },

    /// Load and balance the configured panel and print a JSON summary
    Inspect {
        /// Run configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, source, placebo, out_dir } => {
            cmd_run(&config, source, placebo, out_dir)
        }
        Commands::Combine { out_dir, source, placebo } => cmd_combine(&out_dir, source, placebo),
        Commands::Inspect { config } => cmd_inspect(&config),
        Commands::Version => {
            println!("ucr-did {}", ucr_core::VERSION);
            Ok(())
        }
    }
}

fn config_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

fn cmd_run(
    config: &Path,
    source: Option<DataSource>,
    placebo: bool,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let mut cfg = config::read_run_config(config)?;
    if let Some(source) = source {
        cfg.source = source;
    }
    cfg.placebo |= placebo;
    let mut plan = cfg.into_plan(&config_dir(config));
    if let Some(dir) = out_dir {
        plan.out_dir = dir;
    }

    let report = run_source(&plan, &CallawaySantAnna)
        .with_context(|| format!("{} run failed", plan.source.label()))?;

    for c in &report.categories {
        tracing::info!(
            category = c.category.name(),
            att = c.simple_att,
            se = c.simple_se,
            units = c.units,
            "done"
        );
    }
    let summary = serde_json::json!({
        "source": plan.source.tag(),
        "placebo": plan.placebo,
        "frequency": plan.frequency.as_str(),
        "balance": report.balance,
        "categories": report.categories,
        "written": report.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_combine(out_dir: &Path, source: DataSource, placebo: bool) -> Result<()> {
    let (master, path) = combine_source(out_dir, OutputNames::new(source, placebo))
        .with_context(|| format!("failed to combine tables in {}", out_dir.display()))?;
    let summary = serde_json::json!({
        "path": path.display().to_string(),
        "columns": master.headers(),
        "rows": master
            .rows()
            .into_iter()
            .map(|(label, values)| serde_json::json!({ "label": label, "values": values }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_inspect(config: &Path) -> Result<()> {
    let cfg = config::read_run_config(config)?;
    let plan = cfg.into_plan(&config_dir(config));
    let prepared = prepare_source(&plan)?;
    let panel = &prepared.panel;

    let categories: Vec<serde_json::Value> = plan
        .categories
        .iter()
        .map(|spec| {
            serde_json::json!({
                "category": spec.category.name(),
                "count_column": spec.count_column,
                "count_column_present": panel.has_column(&spec.count_column),
                "rate_column": spec.rate_column,
                "rate_column_present": panel.has_column(&spec.rate_column),
                "filter_discrepancy": spec.filter_discrepancy,
            })
        })
        .collect();
    let never_treated = panel
        .unit_rows()
        .values()
        .filter(|rows| rows.iter().all(|&i| panel.onset()[i].is_none()))
        .count();

    let summary = serde_json::json!({
        "input": plan.input.display().to_string(),
        "rows": panel.len(),
        "units": panel.n_units(),
        "never_treated_units": never_treated,
        "periods": prepared.balance.n_periods,
        "index_periods": prepared.index.len(),
        "first_period": panel.distinct_periods().first().map(|k| k.to_string()),
        "last_period": panel.distinct_periods().last().map(|k| k.to_string()),
        "balance": prepared.balance,
        "columns": panel.column_names().collect::<Vec<_>>(),
        "categories": categories,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
