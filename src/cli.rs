//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_export;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_loader;
use crate::adapters::holt_forecaster::{HoltForecaster, HoltParams};
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::analytics::analyze;
use crate::domain::error::AnalyticsError;
use crate::domain::fetcher::{load_symbol, SourceFetcher};
use crate::domain::forecast::ForecastEngine;
use crate::domain::monthly::monthly_pl_table;
use crate::domain::normalize;
use crate::domain::ohlcv::OhlcvSeries;
use crate::domain::period::{CustomRange, PeriodToken};
use crate::domain::retry::{CancelToken, RetryPolicy};
use crate::domain::settings::{build_settings, FetchSettings, ForecastSettings, Settings};
use crate::domain::symbol::validate_symbol;
use crate::logging::init_logging;
use crate::ports::forecast_port::ForecastFailure;
use crate::ports::market_data_port::{MarketDataPort, ProviderError, ThreadSleeper};

#[derive(Parser, Debug)]
#[command(name = "stockpulse", about = "Stock data fetching, analytics and forecasting")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Where a series comes from: a ticker and period, or an uploaded file.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Ticker symbol, e.g. AAPL
    #[arg(short, long, required_unless_present = "file")]
    pub symbol: Option<String>,

    /// Period token: 1D, 5D, 15D, 30D, 1M, 3M, 6M, YTD, 1Y, 2Y, 3Y, 5Y, MAX, Custom, real-time
    #[arg(short, long, default_value = "1Y")]
    pub period: String,

    /// Start date (YYYY-MM-DD) for a Custom period
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD) for a Custom period
    #[arg(long)]
    pub end: Option<String>,

    /// CSV or spreadsheet file to import instead of fetching
    #[arg(short, long, conflicts_with = "symbol")]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a normalized OHLCV series and write it as CSV
    Fetch {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a CSV or spreadsheet file and write the normalized series
    Import {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute P/L, indicators and signals
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
        /// Write the monthly P/L table instead of the per-bar table
        #[arg(long)]
        monthly: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forecast future closes
    Forecast {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = 30)]
        horizon: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the trading date range the provider reports for a symbol
    Range {
        #[arg(short, long)]
        symbol: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            init_logging(&Settings::default().logging);
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_logging(&settings.logging);

    let cancel = CancelToken::new();
    let result = match cli.command {
        Command::Fetch { source, output } => run_fetch(&source, &settings, &cancel, output.as_deref()),
        Command::Import { file, output } => run_import(&file, output.as_deref()),
        Command::Analyze {
            source,
            monthly,
            output,
        } => run_analyze(&source, &settings, &cancel, monthly, output.as_deref()),
        Command::Forecast {
            source,
            horizon,
            output,
        } => run_forecast(&source, &settings, &cancel, horizon, output.as_deref()),
        Command::Range { symbol } => run_range(&symbol, &settings.fetch),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Settings from `path`, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, AnalyticsError> {
    match path {
        Some(path) => build_settings(&FileConfigAdapter::from_file(path)?),
        None => Ok(Settings::default()),
    }
}

pub fn build_retry_policy(fetch: &FetchSettings) -> Result<RetryPolicy, AnalyticsError> {
    RetryPolicy::new(fetch.max_retries, fetch.base_delay)
}

fn build_yahoo(fetch: &FetchSettings) -> Result<YahooAdapter, AnalyticsError> {
    Ok(YahooAdapter::new(fetch.timeout, &fetch.user_agent)?)
}

pub fn build_fetcher(fetch: &FetchSettings) -> Result<SourceFetcher, AnalyticsError> {
    Ok(SourceFetcher::new(
        Arc::new(build_yahoo(fetch)?),
        Arc::new(ThreadSleeper),
        build_retry_policy(fetch)?,
        fetch.cache_ttl,
    ))
}

pub fn build_forecast_engine(forecast: &ForecastSettings) -> Result<ForecastEngine, AnalyticsError> {
    let model = HoltForecaster::new(HoltParams {
        alpha: forecast.alpha,
        beta: forecast.beta,
        confidence: forecast.confidence,
        min_observations: forecast.min_observations,
    })
    .map_err(|e| match e {
        ForecastFailure::InvalidParameter { name, reason } => AnalyticsError::ConfigInvalid {
            section: "forecast".into(),
            key: name,
            reason,
        },
        other => AnalyticsError::ForecastUnavailable {
            reason: other.to_string(),
        },
    })?;
    Ok(ForecastEngine::new(Box::new(model)))
}

/// Trim and upper-case user input, then validate it.
pub fn resolve_symbol(raw: &str) -> Result<String, AnalyticsError> {
    let symbol = raw.trim().to_uppercase();
    validate_symbol(&symbol)?;
    Ok(symbol)
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate, AnalyticsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| AnalyticsError::InvalidRange {
        reason: format!("--{flag} '{value}' is not a YYYY-MM-DD date"),
    })
}

pub fn parse_custom_range(
    period: PeriodToken,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<CustomRange>, AnalyticsError> {
    if period != PeriodToken::Custom && (start.is_some() || end.is_some()) {
        return Err(AnalyticsError::InvalidRange {
            reason: format!("--start/--end only apply to a Custom period, not {period}"),
        });
    }
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => Ok(Some(CustomRange {
            start: parse_date("start", start)?,
            end: parse_date("end", end)?,
        })),
        _ => Err(AnalyticsError::InvalidRange {
            reason: "both --start and --end are required for a Custom period".into(),
        }),
    }
}

/// Load the series named by `source`, from a file or from the provider.
pub fn load_source(
    source: &SourceArgs,
    settings: &Settings,
    cancel: &CancelToken,
) -> Result<OhlcvSeries, AnalyticsError> {
    if let Some(file) = &source.file {
        return import_file(file);
    }

    let symbol = resolve_symbol(source.symbol.as_deref().unwrap_or_default())?;
    let period: PeriodToken = source.period.parse()?;
    let custom = parse_custom_range(period, source.start.as_deref(), source.end.as_deref())?;
    let fetcher = build_fetcher(&settings.fetch)?;

    let loaded = load_symbol(
        &fetcher,
        &symbol,
        period,
        custom,
        Local::now().naive_local(),
        cancel,
    )?;
    if loaded.degraded {
        eprintln!(
            "warning: no data for {} in {}; showing {} ({}) instead",
            symbol, period, loaded.label, loaded.window
        );
    }
    eprintln!(
        "Fetched {} rows for {} ({} attempt(s))",
        loaded.series.len(),
        symbol,
        loaded.attempts
    );
    Ok(loaded.series)
}

fn import_file(path: &Path) -> Result<OhlcvSeries, AnalyticsError> {
    let series = normalize::normalize(file_loader::load_file(path)?)?;
    eprintln!("Imported {} rows from {}", series.len(), path.display());
    Ok(series)
}

/// Run `write` against `output`, or stdout when no path is given.
fn write_output<F>(output: Option<&Path>, write: F) -> Result<(), AnalyticsError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), AnalyticsError>,
{
    match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write(&mut out)?;
            out.flush()?;
            eprintln!("Written to: {}", path.display());
            Ok(())
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write(&mut out)
        }
    }
}

fn run_fetch(
    source: &SourceArgs,
    settings: &Settings,
    cancel: &CancelToken,
    output: Option<&Path>,
) -> Result<(), AnalyticsError> {
    let series = load_source(source, settings, cancel)?;
    write_output(output, |out| csv_export::write_series(out, &series))
}

fn run_import(file: &Path, output: Option<&Path>) -> Result<(), AnalyticsError> {
    let series = import_file(file)?;
    write_output(output, |out| csv_export::write_series(out, &series))
}

fn run_analyze(
    source: &SourceArgs,
    settings: &Settings,
    cancel: &CancelToken,
    monthly: bool,
    output: Option<&Path>,
) -> Result<(), AnalyticsError> {
    let series = load_source(source, settings, cancel)?;
    let report = analyze(&series);

    if let (Some(bar), Some(signal)) = (report.pl.last(), report.signals.last()) {
        eprintln!(
            "{} rows, {} anomalies; latest {}: mean reversion {}, momentum {}",
            report.len(),
            report.anomaly_count(),
            bar.timestamp.date(),
            signal.mean_reversion,
            signal.momentum
        );
    }

    if monthly {
        let table = monthly_pl_table(&report.pl);
        write_output(output, |out| csv_export::write_monthly(out, &table))
    } else {
        write_output(output, |out| csv_export::write_analytics(out, &report))
    }
}

fn run_forecast(
    source: &SourceArgs,
    settings: &Settings,
    cancel: &CancelToken,
    horizon: usize,
    output: Option<&Path>,
) -> Result<(), AnalyticsError> {
    if horizon == 0 {
        return Err(AnalyticsError::InvalidHorizon { horizon });
    }
    let engine = build_forecast_engine(&settings.forecast)?;
    let series = load_source(source, settings, cancel)?;
    let records = engine.forecast(&series, horizon)?;
    write_output(output, |out| csv_export::write_forecast(out, &records))
}

fn run_range(raw_symbol: &str, fetch: &FetchSettings) -> Result<(), AnalyticsError> {
    let symbol = resolve_symbol(raw_symbol)?;
    let adapter = build_yahoo(fetch)?;
    match adapter.available_range(&symbol) {
        Ok(Some(range)) => {
            println!("{symbol}: {range}");
            Ok(())
        }
        Ok(None) | Err(ProviderError::SymbolNotFound(_)) => Err(AnalyticsError::NoDataFound {
            symbol,
            period: PeriodToken::Max.to_string(),
            attempted: vec![],
            available_range: None,
            suggestions: vec![],
        }),
        Err(e) => Err(AnalyticsError::Network {
            symbol,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_with_defaults() {
        let cli = Cli::try_parse_from(["stockpulse", "fetch", "--symbol", "aapl"]).unwrap();
        match cli.command {
            Command::Fetch { source, output } => {
                assert_eq!(source.symbol.as_deref(), Some("aapl"));
                assert_eq!(source.period, "1Y");
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn source_requires_symbol_or_file() {
        assert!(Cli::try_parse_from(["stockpulse", "analyze"]).is_err());
        assert!(
            Cli::try_parse_from(["stockpulse", "analyze", "-s", "AAPL", "-f", "x.csv"]).is_err()
        );
        assert!(Cli::try_parse_from(["stockpulse", "analyze", "-f", "x.csv", "--monthly"]).is_ok());
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["stockpulse", "range", "-s", "MSFT", "--config", "a.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("a.ini")));
    }

    #[test]
    fn resolve_symbol_upper_cases() {
        assert_eq!(resolve_symbol(" brk-b ").unwrap(), "BRK-B");
        assert!(matches!(
            resolve_symbol("AA PL"),
            Err(AnalyticsError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn custom_range_needs_both_dates() {
        let custom = PeriodToken::Custom;
        assert_eq!(parse_custom_range(custom, None, None).unwrap(), None);
        assert!(matches!(
            parse_custom_range(custom, Some("2024-01-01"), None),
            Err(AnalyticsError::InvalidRange { .. })
        ));
        assert!(matches!(
            parse_custom_range(custom, Some("2024-01-01"), Some("01/02/2024")),
            Err(AnalyticsError::InvalidRange { .. })
        ));
        let range = parse_custom_range(custom, Some("2024-01-01"), Some("2024-02-01"))
            .unwrap()
            .unwrap();
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn dates_with_relative_period_are_rejected() {
        assert_eq!(parse_custom_range(PeriodToken::OneYear, None, None).unwrap(), None);
        for (start, end) in [
            (Some("2024-01-01"), None),
            (None, Some("2024-02-01")),
            (Some("2024-01-01"), Some("2024-02-01")),
        ] {
            match parse_custom_range(PeriodToken::OneYear, start, end) {
                Err(AnalyticsError::InvalidRange { reason }) => assert!(reason.contains("Custom")),
                other => panic!("expected InvalidRange, got {other:?}"),
            }
        }
    }

    #[test]
    fn load_source_rejects_dates_without_custom_period() {
        let source = SourceArgs {
            symbol: Some("AAPL".into()),
            period: "6M".into(),
            start: Some("2024-01-01".into()),
            end: None,
            file: None,
        };
        let err = load_source(&source, &Settings::default(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn invalid_smoothing_maps_to_config_error() {
        let forecast = ForecastSettings {
            alpha: 1.5,
            ..ForecastSettings::default()
        };
        match build_forecast_engine(&forecast) {
            Err(AnalyticsError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "forecast");
                assert_eq!(key, "alpha");
            }
            other => panic!("expected ConfigInvalid, got {:?}", other.err()),
        }
    }
}
