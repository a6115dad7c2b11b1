use anyhow::Result;
use clap::{Parser, Subcommand};
use ladderflow_core::{FeedEvent, FeedProvider, Timeframe};
use ladderflow_data::{csv_loader, BarClock, CsvFeedProvider};
use ladderflow_orderflow::{
    BarSummary, EngineConfig, EngineStats, Imbalance, OrderFlowEngine, VolumeProfileSnapshot,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ladderflow")]
#[command(about = "Order-flow ladder replay: per-bar buy/sell ladders, deltas, and volume profile")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded tick session through the engine
    Replay {
        /// Path to a tick CSV file
        #[arg(short, long, conflicts_with = "dir")]
        data: Option<PathBuf>,

        /// Directory of `<instrument>_ticks.csv` files (use with --instrument)
        #[arg(long, requires = "instrument")]
        dir: Option<PathBuf>,

        /// Instrument symbol to load from --dir
        #[arg(short, long)]
        instrument: Option<String>,

        /// Bar period: 30s, 1m, 5m, 1h, 1d or 500t (trades per bar)
        #[arg(short, long, default_value = "1m")]
        timeframe: Timeframe,

        /// Engine config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the instrument tick size
        #[arg(long)]
        tick_size: Option<Decimal>,

        /// Report the first N bars as historical, the rest as live
        #[arg(long)]
        backfill_bars: Option<usize>,

        /// First bar of the volume profile range
        #[arg(long, default_value = "0")]
        from: usize,

        /// Last bar of the volume profile range (default: last bar)
        #[arg(long)]
        to: Option<usize>,

        /// Print every price level of every bar
        #[arg(long)]
        ladders: bool,

        /// Emit a JSON report instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective engine configuration as TOML
    Config {
        /// Engine config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List instruments with recorded tick files in a directory
    Instruments {
        #[arg(short, long)]
        dir: PathBuf,
    },
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    session: String,
    stats: EngineStats,
    bars: Vec<BarReport>,
    profile: &'a VolumeProfileSnapshot,
    profile_max_volume: u64,
    point_of_control: Option<Decimal>,
}

#[derive(Serialize)]
struct BarReport {
    #[serde(flatten)]
    summary: BarSummary,
    imbalances: Vec<Imbalance>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            data,
            dir,
            instrument,
            timeframe,
            config,
            tick_size,
            backfill_bars,
            from,
            to,
            ladders,
            json,
        } => {
            let mut engine_config = load_config(config.as_deref())?;
            if let Some(tick_size) = tick_size {
                engine_config.tick_size = tick_size;
            }
            engine_config.validate()?;

            let events = match (data, dir, instrument) {
                (Some(path), _, _) => load_file_events(&path, timeframe, backfill_bars)?,
                (None, Some(dir), Some(symbol)) => {
                    let mut provider = CsvFeedProvider::new(dir);
                    if let Some(count) = backfill_bars {
                        provider = provider.with_backfill_bars(count);
                    }
                    provider.load_events(&symbol, timeframe)?
                }
                _ => anyhow::bail!("Provide --data <file> or --dir <dir> --instrument <symbol>"),
            };

            run_replay(engine_config, &events, from, to, ladders, json)?;
        }
        Commands::Config { config } => {
            let engine_config = load_config(config.as_deref())?;
            print!("{}", engine_config.to_toml_string()?);
        }
        Commands::Instruments { dir } => {
            let provider = CsvFeedProvider::new(dir);
            let instruments = provider.available_instruments()?;
            if instruments.is_empty() {
                println!("No recorded tick files found");
            }
            for symbol in instruments {
                println!("  {}", symbol);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(config = %path.display(), "Loading engine config");
            Ok(EngineConfig::load(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn load_file_events(
    path: &Path,
    timeframe: Timeframe,
    backfill_bars: Option<usize>,
) -> Result<Vec<FeedEvent>> {
    let ticks = csv_loader::load_ticks_from_csv(path)?;
    tracing::info!(ticks = ticks.len(), data = %path.display(), "Loaded tick data");
    if ticks.is_empty() {
        anyhow::bail!("No ticks loaded from CSV file");
    }
    let mut clock = BarClock::new(timeframe);
    if let Some(count) = backfill_bars {
        clock = clock.with_backfill_bars(count);
    }
    Ok(clock.events(&ticks))
}

fn run_replay(
    config: EngineConfig,
    events: &[FeedEvent],
    from: usize,
    to: Option<usize>,
    ladders: bool,
    json: bool,
) -> Result<()> {
    let mut engine = OrderFlowEngine::new(config);
    for event in events {
        engine.handle(event);
    }

    let stats = engine.stats();
    tracing::info!(
        session = %engine.id(),
        recorded = stats.ticks_recorded,
        dropped = stats.ticks_dropped,
        stale = stats.stale_events,
        "Replay complete"
    );

    let last_bar = engine
        .store()
        .and_then(|s| s.last_index())
        .unwrap_or_default();
    let (profile, max_volume) = engine.build_profile(from..=to.unwrap_or(last_bar))?;

    let bars: Vec<BarReport> = engine
        .bar_summaries()
        .into_iter()
        .map(|summary| BarReport {
            imbalances: engine.imbalances(summary.index),
            summary,
        })
        .collect();

    if json {
        let report = ReplayReport {
            session: engine.id().to_string(),
            stats,
            bars,
            profile: &profile,
            profile_max_volume: max_volume,
            point_of_control: profile.point_of_control(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let sep = "=".repeat(78);
    println!("\n{sep}");
    println!("  ORDER FLOW REPLAY");
    println!("{sep}");
    println!(
        "  {:>5} {:>9} {:>9} {:>8} {:>8} {:>8} {:>10} {:>10} {:>4}",
        "bar", "buys", "sells", "delta", "min", "max", "cum delta", "pivot", "imb"
    );
    for bar in &bars {
        let s = &bar.summary;
        println!(
            "  {:>5} {:>9} {:>9} {:>8} {:>8} {:>8} {:>10} {:>10} {:>4}",
            s.index,
            s.buys,
            s.sells,
            s.delta,
            fmt_opt(s.min_delta),
            fmt_opt(s.max_delta),
            s.cumulative_delta,
            fmt_opt(s.pivot_price),
            bar.imbalances.len()
        );
        if ladders {
            if let Some(aggregate) = engine.bar(s.index) {
                // Highest price first, as on a chart
                for (price, rung) in aggregate.ladder().iter().collect::<Vec<_>>().into_iter().rev() {
                    println!("        {:>10}  {:>7} x {:<7}", price, rung.sell, rung.buy);
                }
            }
        }
    }

    println!("{sep}");
    println!(
        "  Volume profile: {} bars, {} levels, max {} at {}",
        profile.bars_included(),
        profile.ladder().len(),
        max_volume,
        fmt_opt(profile.point_of_control())
    );
    if max_volume > 0 {
        for (price, rung) in profile.rungs().collect::<Vec<_>>().into_iter().rev() {
            let width = (rung.total() * 40 / max_volume) as usize;
            println!(
                "  {:>10} {:>8} {:>8}  {}",
                price,
                rung.sell,
                rung.buy,
                "#".repeat(width)
            );
        }
    }
    println!(
        "  Ticks recorded: {}   dropped: {}   stale: {}",
        stats.ticks_recorded, stats.ticks_dropped, stats.stale_events
    );
    println!("{sep}\n");

    Ok(())
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
