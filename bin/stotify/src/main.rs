mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::AppState;
use backtest::{backtest_ma_cross, BacktestParams, ExitMode, OverlapPolicy};
use common::{Config, Error, MarketData, Timeframe};
use engine::{AlertRunner, CheckOptions, YahooClient};
use notify::NtfyNotifier;
use replay::ReplayMarketData;
use strategy::{AlertFileConfig, StrategyRegistry};

#[derive(Parser)]
#[command(name = "stotify", version, about = "Stock price alerts and moving-average crossover backtests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every configured alert once and send notifications.
    Check {
        /// Alert config file (.json or .toml).
        #[arg(default_value = "alerts.json")]
        config: PathBuf,

        /// Only evaluate alerts with this timeframe (e.g. 15m, 1d).
        #[arg(long, env = "STOTIFY_TIMEFRAME")]
        timeframe: Option<String>,

        /// Run intraday alerts even when the market is closed.
        #[arg(long, default_value_t = false)]
        skip_market_check: bool,
    },
    /// Backtest the moving-average crossover strategy on one ticker.
    Backtest {
        ticker: String,

        /// First date (YYYY-MM-DD). Overrides --period.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date, inclusive (YYYY-MM-DD). Overrides --period.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Trailing range when no dates are given.
        #[arg(long, default_value = "5y")]
        period: String,

        #[arg(long, default_value = "1d")]
        interval: String,

        #[arg(long, default_value_t = 50)]
        fast_window: usize,

        #[arg(long, default_value_t = 200)]
        slow_window: usize,

        /// fixed or cross.
        #[arg(long, default_value = "fixed")]
        exit_mode: ExitMode,

        /// Holding period for the fixed exit rule.
        #[arg(long, default_value_t = 30)]
        hold_days: usize,

        /// Ignore cross-ups while a previous trade is still open.
        #[arg(long, default_value_t = false)]
        single_open: bool,

        /// Read prices from a date,close CSV instead of Yahoo Finance.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Serve the backtest dashboard.
    Serve {
        /// Listen port. Defaults to DASHBOARD_PORT or 8501.
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the ntfy topics to subscribe to, with the alerts behind each.
    Topics {
        #[arg(default_value = "alerts.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    // stderr keeps stdout clean for reports and --json output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match run(cli.command, cfg).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, cfg: Config) -> Result<ExitCode> {
    match command {
        Commands::Check {
            config,
            timeframe,
            skip_market_check,
        } => check(&cfg, &config, timeframe, skip_market_check).await,

        Commands::Backtest {
            ticker,
            start,
            end,
            period,
            interval,
            fast_window,
            slow_window,
            exit_mode,
            hold_days,
            single_open,
            csv,
            json,
        } => {
            let params = BacktestParams {
                start,
                end,
                period,
                interval,
                fast_window,
                slow_window,
                exit_mode,
                hold_days,
                overlap: if single_open {
                    OverlapPolicy::SingleOpen
                } else {
                    OverlapPolicy::Allow
                },
            };
            run_backtest(&cfg, &ticker, &params, csv.as_deref(), json).await
        }

        Commands::Serve { port } => {
            let port = port.unwrap_or(cfg.dashboard_port);
            let market: Arc<dyn MarketData> = Arc::new(YahooClient::new(&cfg.yahoo_base_url)?);
            if cfg.dashboard_token.is_none() {
                info!("DASHBOARD_TOKEN not set; API is open");
            }
            api::serve(AppState::new(market, cfg.dashboard_token.clone()), port).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Topics { config } => {
            let registry = StrategyRegistry::with_builtins();
            let alerts = match AlertFileConfig::load(&config, &registry) {
                Ok(alerts) => alerts,
                Err(e) => return Ok(config_error(&e)),
            };
            print!("{}", report::format_topics(&alerts, &cfg.ntfy_prefix));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn check(
    cfg: &Config,
    config_path: &Path,
    timeframe: Option<String>,
    skip_market_check: bool,
) -> Result<ExitCode> {
    let registry = Arc::new(StrategyRegistry::with_builtins());
    let alerts = match AlertFileConfig::load(config_path, &registry) {
        Ok(alerts) => alerts,
        Err(e) => return Ok(config_error(&e)),
    };

    let timeframe_filter = match timeframe.filter(|t| !t.is_empty()) {
        None => None,
        Some(t) => match t.parse::<Timeframe>() {
            Ok(tf) => Some(tf),
            Err(_) => return Ok(config_error(&Error::config("Invalid timeframe filter"))),
        },
    };

    let market = Arc::new(YahooClient::new(&cfg.yahoo_base_url)?);
    let notifier = Arc::new(NtfyNotifier::from_config(cfg)?);
    let runner = AlertRunner::new(registry, market, notifier);

    let options = CheckOptions {
        skip_market_check,
        timeframe_filter,
    };
    let summary = runner
        .check_alerts(&alerts, &options, engine::is_market_open())
        .await;

    println!("Sent {} alert(s)", summary.sent);
    Ok(ExitCode::SUCCESS)
}

async fn run_backtest(
    cfg: &Config,
    ticker: &str,
    params: &BacktestParams,
    csv: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let ticker = ticker.trim().to_uppercase();

    let market: Arc<dyn MarketData> = match csv {
        Some(path) => {
            let replay = ReplayMarketData::new();
            replay
                .load_csv_file(&ticker, path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?;
            Arc::new(replay)
        }
        None => Arc::new(YahooClient::new(&cfg.yahoo_base_url)?),
    };

    let result = backtest_ma_cross(market.as_ref(), &ticker, params).await;

    if json {
        let mut out = serde_json::to_value(&result)?;
        out["ticker"] = ticker.into();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", report::format_backtest(&ticker, params, &result));
    }
    Ok(ExitCode::SUCCESS)
}

/// Report an invalid alert config the way operators expect and exit 1.
fn config_error(e: &Error) -> ExitCode {
    let msg = match e {
        Error::Config(msg) => msg.clone(),
        other => other.to_string(),
    };
    eprintln!("Config error: {msg}");
    ExitCode::from(1)
}
