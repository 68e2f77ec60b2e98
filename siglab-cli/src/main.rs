//! SigLab CLI: run, batch, and model inspection commands.
//!
//! Commands:
//! - `run`: replay one symbol/interval against a model artifact
//! - `batch`: several configs in parallel, or a confidence-threshold sweep
//! - `inspect-model`: print a model artifact's type and declared features

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use siglab_runner::batch::{best_by_roi, run_batch, sweep_thresholds, ThresholdGrid};
use siglab_runner::export::{export_sweep_csv, render_summary, write_report, write_trades_csv};
use siglab_runner::model_loader::read_artifact;
use siglab_runner::{load_bars_csv, load_model, run_single_backtest, BacktestConfig, BacktestResult};

#[derive(Parser)]
#[command(name = "siglab", about = "SigLab: signal-driven bar replay backtester")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest.
    Run {
        #[command(flatten)]
        opts: RunOpts,

        /// Write the closed trades as CSV.
        #[arg(long)]
        trades_csv: Option<PathBuf>,
    },
    /// Run several configs in parallel, or sweep confidence thresholds.
    Batch {
        /// TOML config files, one backtest each.
        #[arg(long, num_args = 1.., conflicts_with = "sweep")]
        configs: Vec<PathBuf>,

        /// Sweep thresholds START END STEP against the `run` options.
        #[arg(long, num_args = 3, value_names = ["START", "END", "STEP"])]
        sweep: Option<Vec<f64>>,

        #[command(flatten)]
        opts: RunOpts,

        /// Sweep results CSV.
        #[arg(long, default_value = "sweep_results.csv")]
        out: PathBuf,
    },
    /// Print a model artifact's type, name and declared features.
    InspectModel {
        /// Path to the model JSON.
        model: PathBuf,

        /// Print the full artifact as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Config file plus per-field overrides.
#[derive(Args)]
struct RunOpts {
    /// Path to a TOML config file. Defaults apply without one.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    interval: Option<String>,

    /// Bars CSV (overrides the data directory convention).
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Model artifact JSON (overrides the models directory convention).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Minimum confidence (0..=100) to open a position.
    #[arg(long)]
    threshold: Option<f64>,

    /// First bar index to evaluate.
    #[arg(long)]
    warmup: Option<usize>,

    /// JSON report destination.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Refuse entries on a bar where a stop-loss or take-profit fired.
    #[arg(long, default_value_t = false)]
    no_same_bar_reentry: bool,
}

impl RunOpts {
    fn load_config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => BacktestConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut BacktestConfig) {
        if let Some(symbol) = &self.symbol {
            config.backtest.symbol = symbol.clone();
        }
        if let Some(interval) = &self.interval {
            config.backtest.interval = interval.clone();
        }
        if let Some(bars) = &self.bars {
            config.data.bars = Some(bars.clone());
        }
        if let Some(model) = &self.model {
            config.data.model = Some(model.clone());
        }
        if let Some(threshold) = self.threshold {
            config.backtest.confidence_threshold = threshold;
        }
        if let Some(warmup) = self.warmup {
            config.backtest.warmup_index = warmup;
        }
        if let Some(report) = &self.report {
            config.output.report = Some(report.clone());
        }
        if self.no_same_bar_reentry {
            config.backtest.allow_same_bar_reentry = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { opts, trades_csv } => run_cmd(&opts, trades_csv.as_deref()),
        Commands::Batch {
            configs,
            sweep,
            opts,
            out,
        } => match sweep {
            Some(range) => sweep_cmd(&opts, &range, &out),
            None => batch_cmd(&configs, &out),
        },
        Commands::InspectModel { model, json } => inspect_model_cmd(&model, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "siglab=debug" } else { "siglab=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run_cmd(opts: &RunOpts, trades_csv: Option<&Path>) -> Result<()> {
    let config = opts.load_config()?;
    let result = run_single_backtest(&config, None)?;
    print!("{}", render_summary(&result));
    save_outputs(&config, &result, trades_csv)
}

fn save_outputs(
    config: &BacktestConfig,
    result: &BacktestResult,
    trades_csv: Option<&Path>,
) -> Result<()> {
    if let Some(path) = &config.output.report {
        write_report(path, result)?;
        println!("Report saved to: {}", path.display());
    }
    let csv_path = trades_csv.or(config.output.trades_csv.as_deref());
    if let Some(path) = csv_path {
        write_trades_csv(path, &result.trades)?;
        println!("Trades saved to: {}", path.display());
    }
    Ok(())
}

fn batch_cmd(paths: &[PathBuf], out: &Path) -> Result<()> {
    if paths.is_empty() {
        bail!("batch needs --configs or --sweep");
    }
    let configs = paths
        .iter()
        .map(|p| {
            BacktestConfig::from_file(p).with_context(|| format!("loading config {}", p.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut succeeded = Vec::new();
    let mut failures = 0usize;
    for (path, outcome) in paths.iter().zip(run_batch(&configs, None)) {
        match outcome {
            Ok(result) => {
                print!("{}", render_summary(&result));
                succeeded.push(result);
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error for {}: {e}", path.display());
            }
        }
    }

    write_sweep(&succeeded, out)?;
    if failures > 0 {
        bail!("{failures} of {} runs failed", paths.len());
    }
    Ok(())
}

fn sweep_cmd(opts: &RunOpts, range: &[f64], out: &Path) -> Result<()> {
    let [start, end, step] = range else {
        bail!("--sweep takes START END STEP");
    };
    let grid = ThresholdGrid::range(*start, *end, *step);
    if grid.is_empty() {
        bail!("empty threshold grid: {start}..={end} step {step}");
    }

    let base = opts.load_config()?;
    let data = load_bars_csv(&base.bars_path())?;
    let predictor = load_model(&base.model_path())?;
    let results = sweep_thresholds(&base, &grid, &data, predictor.as_ref(), None)?;

    write_sweep(&results, out)?;
    match best_by_roi(&results) {
        Some(best) => {
            println!(
                "Best threshold by ROI: {:.2}",
                best.engine.confidence_threshold
            );
            print!("{}", render_summary(best));
        }
        None => println!("No threshold produced any trades"),
    }
    Ok(())
}

fn write_sweep(results: &[BacktestResult], out: &Path) -> Result<()> {
    let csv = export_sweep_csv(results)?;
    std::fs::write(out, csv).with_context(|| format!("writing {}", out.display()))?;
    info!(rows = results.len(), path = %out.display(), "sweep results written");
    println!("Sweep results saved to: {}", out.display());
    Ok(())
}

fn inspect_model_cmd(path: &Path, json: bool) -> Result<()> {
    let artifact = read_artifact(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }
    let features = artifact.feature_names();
    println!("Model:    {}", artifact.name());
    println!("Type:     {}", artifact.kind());
    println!("Features: {}", features.len());
    for (i, name) in features.iter().enumerate() {
        println!("  {i:>3}  {name}");
    }
    artifact
        .into_predictor()
        .context("artifact parses but does not validate")?;
    println!("Valid:    yes");
    Ok(())
}
