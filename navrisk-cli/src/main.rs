//! NavRisk CLI: run the risk analytics engine over CSV exports.
//!
//! Commands:
//! - `analyze`: analyze a fund universe and print a summary or write the JSON report
//! - `config`: print the default configuration as TOML

mod input;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use navrisk_analytics::report::UniverseReport;
use navrisk_analytics::risk_profile::RiskDimension;
use navrisk_analytics::{AnalysisPipeline, AnalyticsConfig, FundInput, UniverseInput};
use navrisk_core::domain::Metric;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "navrisk", about = "NavRisk CLI: fund valuation risk analytics")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every fund in a valuation table.
    Analyze {
        /// Wide CSV: Date column, then one valuation column per fund.
        #[arg(long)]
        valuations: PathBuf,

        /// Wide CSV of net assets, same layout as valuations.
        #[arg(long)]
        net_assets: Option<PathBuf>,

        /// Flow CSV: Date, Fund/FCP, Operation, Amount, Segment.
        #[arg(long)]
        flows: Option<PathBuf>,

        /// Benchmark level CSV (Date, value). Defaults to the peer average.
        #[arg(long)]
        benchmark: Option<PathBuf>,

        /// TOML config file. Defaults apply to anything not set.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Analysis window start (YYYY-MM-DD). Regimes always use full history.
        #[arg(long)]
        start: Option<String>,

        /// Analysis window end (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Bootstrap seed override.
        #[arg(long)]
        seed: Option<u64>,

        /// Run funds sequentially.
        #[arg(long, default_value_t = false)]
        serial: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write the JSON report to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration.
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            valuations,
            net_assets,
            flows,
            benchmark,
            config,
            start,
            end,
            seed,
            serial,
            format,
            output,
        } => {
            let mut cfg = match config {
                Some(path) => AnalyticsConfig::from_file(&path)?,
                None => AnalyticsConfig::default(),
            };
            if let Some(s) = start {
                cfg.series.start = Some(input::parse_date(&s)?);
            }
            if let Some(e) = end {
                cfg.series.end = Some(input::parse_date(&e)?);
            }
            if let Some(seed) = seed {
                cfg.loss.seed = seed;
            }
            cfg.validate()?;

            let universe = load_universe(&valuations, net_assets.as_deref(), flows.as_deref(), benchmark.as_deref())?;
            let report = AnalysisPipeline::new(cfg)
                .with_parallelism(!serial)
                .analyze_universe(&universe);

            if let Some(path) = &output {
                std::fs::write(path, report.to_json()?)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!(path = %path.display(), "report written");
            }
            match format {
                OutputFormat::Table => print_summary(&report),
                OutputFormat::Json if output.is_none() => println!("{}", report.to_json()?),
                OutputFormat::Json => {}
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", AnalyticsConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_universe(
    valuations: &Path,
    net_assets: Option<&Path>,
    flows: Option<&Path>,
    benchmark: Option<&Path>,
) -> Result<UniverseInput> {
    let wide = input::read_wide_file(valuations)?;
    if wide.is_empty() {
        bail!("{} contains no fund columns", valuations.display());
    }
    let mut net_assets = net_assets.map(input::read_net_assets_file).transpose()?.unwrap_or_default();
    let mut flows = flows.map(input::read_flows_file).transpose()?.unwrap_or_default();
    let benchmark = benchmark.map(input::read_benchmark_file).transpose()?;

    let funds: Vec<FundInput> = wide
        .into_iter()
        .map(|(fund, raw)| FundInput {
            net_assets: net_assets.remove(&fund),
            flows: flows.remove(&fund),
            valuations: raw,
            fund,
        })
        .collect();

    for fund in flows.keys().chain(net_assets.keys()) {
        tracing::warn!(fund = %fund, "no valuation column for fund; ignored");
    }
    tracing::info!(funds = funds.len(), benchmark = benchmark.is_some(), "inputs loaded");

    Ok(UniverseInput { funds, benchmark })
}

// ─── Output ──────────────────────────────────────────────────────────

fn fmt_metric(m: &Metric, pct: bool) -> String {
    let render = |v: f64| {
        if !v.is_finite() {
            "inf".to_string()
        } else if pct {
            format!("{:.2}%", v * 100.0)
        } else {
            format!("{v:.3}")
        }
    };
    match m {
        Metric::Ok { value } => render(*value),
        Metric::Flagged { value, .. } => format!("{}*", render(*value)),
        Metric::Missing { .. } => "n/a".to_string(),
    }
}

fn print_summary(report: &UniverseReport) {
    let missing = Metric::missing(navrisk_core::domain::Fault::NotComputable);
    println!();
    println!("=== NavRisk Report ===");
    println!("Funds:          {}", report.manifest.fund_count);
    println!("Seed:           {}", report.manifest.seed);
    println!("Dataset hash:   {}", report.manifest.dataset_hash);
    println!("Config hash:    {}", report.manifest.config_hash);
    println!();
    println!(
        "{:<20} {:>6} {:>9} {:>9} {:>8} {:>9} {:>8} {:>8} {:>7} {:>7}",
        "Fund", "Obs", "Return", "Vol", "Sharpe", "MaxDD", "VaR", "CVaR", "Regime", "Score"
    );
    println!("{}", "-".repeat(100));
    for fund in &report.funds {
        let (ret, vol, sharpe, var, cvar) = match &fund.metrics {
            Ok(m) => (m.annualized_return, m.volatility, m.sharpe, m.tail.var, m.tail.cvar),
            Err(_) => (missing, missing, missing, missing, missing),
        };
        let mdd = fund.drawdown.as_ref().map_or(missing, |d| d.max_drawdown);
        let regime = fund
            .regime
            .as_ref()
            .map_or("n/a".to_string(), |r| format!("{:?}", r.current));
        let score = report
            .fingerprint(&fund.fund)
            .map_or(missing, |f| f.global_score);
        println!(
            "{:<20} {:>6} {:>9} {:>9} {:>8} {:>9} {:>8} {:>8} {:>7} {:>7}",
            truncate(fund.fund.as_str(), 20),
            fund.observations,
            fmt_metric(&ret, true),
            fmt_metric(&vol, true),
            fmt_metric(&sharpe, false),
            fmt_metric(&mdd, true),
            fmt_metric(&var, true),
            fmt_metric(&cvar, true),
            regime,
            fmt_metric(&score, false),
        );
    }

    println!();
    println!("--- Fingerprint ---");
    print!("{:<20}", "Fund");
    for d in RiskDimension::ALL {
        print!(" {:>10}", truncate(d.label(), 10));
    }
    println!();
    for fp in &report.fingerprints {
        print!("{:<20}", truncate(fp.fund().as_str(), 20));
        for d in RiskDimension::ALL {
            print!(" {:>10}", fmt_metric(&fp.score(d).unwrap_or(missing), false));
        }
        println!();
    }

    if let Ok(c) = &report.flow_concentration {
        println!();
        println!(
            "Flow concentration: top 3 = {:.1}%, {}/{} fund(s) make 80% of net flows",
            c.top3_share * 100.0,
            c.funds_for_80_percent,
            c.shares.len()
        );
    }

    let issues: usize = report.funds.iter().map(|f| f.data_issues.len()).sum();
    if issues > 0 {
        println!();
        println!("WARNING: {issues} input point(s) dropped for data quality");
    }
    println!();
    println!("* flagged value (low confidence or undefined); n/a = not available");
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).chain(std::iter::once('…')).collect()
    }
}
