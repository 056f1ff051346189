//! Sniper CLI: signal, sizing, backtest and scanner commands.
//!
//! Commands:
//! - `signal`: evaluate the latest bar of a symbol and print the decision as JSON
//! - `size`: size a position from entry, stop and account figures
//! - `backtest`: replay the engine over one or more symbols
//! - `scan`: run the polling scanner against the paper broker
//! - `panic`: cancel every working order and liquidate every position

mod obs;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use sniper_core::broker::{Broker, PaperBroker};
use sniper_core::orders::{BracketOrderBuilder, OrderSide};
use sniper_core::{enrich, PositionSizer, SignalEngine, SizingRequest};
use sniper_runner::export::save_report;
use sniper_runner::{
    backtest_many, load_bars, provider_for, AppConfig, BacktestOptions, BacktestReport,
    LoadOptions, LogNotifier, LogSink, Scanner,
};

#[derive(Parser)]
#[command(
    name = "sniper",
    about = "Sniper: regime-aware signal engine for intraday bars"
)]
struct Cli {
    /// Default log filter when SNIPER_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: plain or json.
    #[arg(long, global = true, default_value = "plain")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars come from.
#[derive(Args)]
struct SourceArgs {
    /// Read bars from a CSV file (timestamp,open,high,low,close,volume).
    #[arg(long, conflicts_with = "synthetic")]
    csv: Option<PathBuf>,

    /// Use a deterministic synthetic random walk.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

impl SourceArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            csv: self.csv.clone(),
            synthetic: self.synthetic,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the latest bar and print the decision as JSON.
    Signal {
        #[arg(long)]
        symbol: String,

        /// Chart range. Defaults to the config's scanner range.
        #[arg(long)]
        range: Option<String>,

        /// Bar interval. Defaults to the config's scanner interval.
        #[arg(long)]
        interval: Option<String>,

        /// Path to a TOML config file. Defaults to ~/.sniper/config.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Size a position and show the bracket it would submit.
    Size {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        entry: f64,

        #[arg(long)]
        stop: f64,

        /// Take-profit price; when set, the bracket is printed too.
        #[arg(long)]
        target: Option<f64>,

        #[arg(long)]
        equity: f64,

        /// Non-marginable buying power.
        #[arg(long)]
        capital: f64,

        /// Percent of equity at risk.
        #[arg(long, default_value_t = 1.0)]
        risk: f64,
    },
    /// Replay the engine over historical bars.
    Backtest {
        /// Symbols to backtest (e.g., BTC ETH SPY).
        #[arg(long = "symbol", required = true, num_args = 1..)]
        symbols: Vec<String>,

        #[arg(long, default_value = "10d")]
        range: String,

        #[arg(long, default_value = "15m")]
        interval: String,

        /// Bars skipped before the first evaluation.
        #[arg(long, default_value_t = sniper_runner::backtest::DEFAULT_WARMUP)]
        warmup: usize,

        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run the polling scanner with the paper broker.
    Scan {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many polling cycles. Runs until interrupted otherwise.
        #[arg(long)]
        max_ticks: Option<usize>,

        /// Starting equity of the paper account.
        #[arg(long, default_value_t = 10_000.0)]
        equity: f64,

        /// Cancel orders and liquidate positions when the scanner stops.
        #[arg(long, default_value_t = false)]
        flatten_on_exit: bool,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Emergency exit: cancel all working orders and close all positions.
    Panic {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Equity of the paper account.
        #[arg(long, default_value_t = 10_000.0)]
        equity: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Signal {
            symbol,
            range,
            interval,
            config,
            source,
        } => run_signal(&symbol, range, interval, config.as_deref(), &source),
        Commands::Size {
            symbol,
            entry,
            stop,
            target,
            equity,
            capital,
            risk,
        } => run_size(&symbol, entry, stop, target, equity, capital, risk),
        Commands::Backtest {
            symbols,
            range,
            interval,
            warmup,
            balance,
            config,
            source,
            output_dir,
        } => {
            let opts = BacktestOptions {
                warmup,
                initial_balance: balance,
            };
            run_backtest_cmd(&symbols, &range, &interval, &opts, config.as_deref(), &source, &output_dir)
        }
        Commands::Scan {
            config,
            max_ticks,
            equity,
            flatten_on_exit,
            source,
        } => run_scan(config.as_deref(), max_ticks, equity, flatten_on_exit, &source),
        Commands::Panic { config, equity } => run_panic(config.as_deref(), equity),
    }
}

/// Explicit path, else `~/.sniper/config.toml` when present, else defaults.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(default) = dirs::home_dir().map(|h| h.join(".sniper").join("config.toml")) {
        if default.exists() {
            info!(path = %default.display(), "using default config");
            return Ok(AppConfig::load(&default)?);
        }
    }
    Ok(AppConfig::default())
}

fn run_signal(
    symbol: &str,
    range: Option<String>,
    interval: Option<String>,
    config_path: Option<&Path>,
    source: &SourceArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let range = range.unwrap_or_else(|| config.scanner.range.clone());
    let interval = interval.unwrap_or_else(|| config.scanner.interval.clone());

    let loaded = load_bars(symbol, &range, &interval, &source.load_options())?;
    let enriched = enrich(&loaded.bars, &config.indicators);
    let decision = SignalEngine::new(config.signal.clone()).evaluate(&enriched);

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn run_size(
    symbol: &str,
    entry: f64,
    stop: f64,
    target: Option<f64>,
    equity: f64,
    capital: f64,
    risk: f64,
) -> Result<()> {
    let result = PositionSizer::default().size(&SizingRequest {
        symbol,
        entry,
        stop,
        equity,
        available_capital: capital,
        risk_pct: risk,
    });
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let (Some(target), true) = (target, result.success) {
        let side = if stop < entry { OrderSide::Buy } else { OrderSide::Sell };
        let order = BracketOrderBuilder::new(symbol, side, result.quantity)
            .with_stop_loss(stop)
            .with_take_profit(target)
            .build(entry)?;
        println!("{}", serde_json::to_string_pretty(&order.legs())?);
    }
    Ok(())
}

fn run_backtest_cmd(
    symbols: &[String],
    range: &str,
    interval: &str,
    opts: &BacktestOptions,
    config_path: Option<&Path>,
    source: &SourceArgs,
    output_dir: &Path,
) -> Result<()> {
    if source.csv.is_some() && symbols.len() > 1 {
        bail!("--csv holds one series; pass a single --symbol");
    }
    let config = load_config(config_path)?;
    let load_opts = source.load_options();

    let mut inputs = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let loaded = load_bars(symbol, range, interval, &load_opts)
            .with_context(|| format!("failed to load bars for {symbol}"))?;
        inputs.push((loaded.symbol, loaded.bars));
    }

    let reports = backtest_many(&inputs, &config, opts);
    for report in &reports {
        print_summary(report);
        let run_dir = save_report(report, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_scan(
    config_path: Option<&Path>,
    max_ticks: Option<usize>,
    equity: f64,
    flatten_on_exit: bool,
    source: &SourceArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = provider_for(&source.load_options())?;
    let mut scanner = Scanner::new(
        config,
        provider,
        PaperBroker::new(equity),
        Box::new(LogNotifier),
        Box::new(LogSink),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping scanner after this cycle");
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install interrupt handler")?;

    let ticks = scanner.run(&shutdown, max_ticks);
    println!(
        "Scanner ran {ticks} cycles, {} paper orders submitted",
        scanner.broker().orders().len()
    );

    if flatten_on_exit {
        let undone = scanner.emergency_exit()?;
        println!(
            "Emergency exit: {} orders cancelled, {} positions closed",
            undone.cancelled, undone.closed
        );
    }
    Ok(())
}

fn run_panic(config_path: Option<&Path>, equity: f64) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = provider_for(&LoadOptions {
        csv: None,
        synthetic: true,
    })?;
    let mut scanner = Scanner::new(
        config,
        provider,
        PaperBroker::new(equity),
        Box::new(LogNotifier),
        Box::new(LogSink),
    );
    let undone = scanner.emergency_exit()?;
    println!(
        "EMERGENCY EXIT on {}: {} orders cancelled, {} positions closed",
        scanner.broker().name(),
        undone.cancelled,
        undone.closed
    );
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    println!();
    println!("=== Backtest Report ===");
    println!("Symbol:         {}", report.symbol);
    println!("Bars:           {} ({} warmup)", report.bar_count, report.warmup);
    println!("Trades:         {}", report.trade_count);
    println!("Wins:           {}", report.wins);
    println!("Win Rate:       {:.1}%", report.win_rate);
    println!("Start Balance:  {:.2}", report.initial_balance);
    println!("Final Equity:   {:.2}", report.final_equity);
    println!("Total Return:   {:.2}%", report.total_return_pct);
    if let Some(side) = report.open_position {
        println!("Open Position:  {side:?} (marked to last close)");
    }
    println!("Config Hash:    {}", report.config_hash);
}
