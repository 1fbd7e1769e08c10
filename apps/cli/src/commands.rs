//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use firmrank_core::enrichment::{EnrichmentProgress, EnrichmentSummary};
use firmrank_core::pipeline::{
    self, ReportOutcome, RunConfig, WorkbookPaths, default_enriched_path,
};
use firmrank_lookup::WikiLookupClient;
use firmrank_shared::{
    AppConfig, Criteria, EnrichmentConfig, LookupConfig, init_config, load_config,
    load_config_from, parse_operator_number, parse_priority_list,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// firmrank: enrich and rank private-equity firm spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "firmrank",
    version,
    about = "Fill missing firm metrics from public sources, then filter and rank the dataset.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.firmrank/firmrank.toml).
    #[arg(long, global = true, env = "FIRMRANK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Enrich, save, then filter/rank and write the report.
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        enrich: EnrichArgs,

        #[command(flatten)]
        criteria: CriteriaArgs,

        /// Skip the enrichment pass.
        #[arg(long)]
        no_enrich: bool,
    },

    /// Enrich incomplete rows and save the enriched workbook.
    Enrich {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        enrich: EnrichArgs,
    },

    /// Filter and rank the dataset and write the report. No network access.
    Report {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Workbook locations. Unset flags fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct DatasetArgs {
    /// Source workbook.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Data sheet name.
    #[arg(long)]
    pub sheet: Option<String>,

    /// Where to save the enriched workbook.
    #[arg(long, conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// Where to write the report workbook.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Save enrichment results back into the input workbook.
    #[arg(long)]
    pub in_place: bool,
}

/// Enrichment limits.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct EnrichArgs {
    /// Maximum rows looked up in this run.
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Delay in milliseconds before each lookup.
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

/// Filter and ranking criteria. Blank or unparseable values are neutral.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct CriteriaArgs {
    /// Keep only this region (case-insensitive).
    #[arg(long, default_value = "")]
    pub region: String,

    /// Minimum AUM in USD billions.
    #[arg(long, default_value = "")]
    pub min_aum: String,

    /// Minimum latest fund size in USD billions.
    #[arg(long, default_value = "")]
    pub min_fund_size: String,

    /// Minimum capital raised in USD millions.
    #[arg(long, default_value = "")]
    pub min_capital_raised: String,

    /// Keep only firms whose primary focus contains this text.
    #[arg(long, default_value = "")]
    pub focus: String,

    /// Ranking keys, comma-separated: AUM, LATEST_FUND_SIZE, CAPITAL_RAISED, PEI_RANK.
    #[arg(long, default_value = "")]
    pub priority: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "firmrank=info",
        1 => "firmrank=debug",
        _ => "firmrank=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            dataset,
            enrich,
            criteria,
            no_enrich,
        } => cmd_run(config_path, &dataset, &enrich, &criteria, no_enrich).await,
        Command::Enrich { dataset, enrich } => cmd_enrich(config_path, &dataset, &enrich).await,
        Command::Report { dataset, criteria } => cmd_report(config_path, &dataset, &criteria),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Argument resolution
// ---------------------------------------------------------------------------

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge dataset flags over config values.
pub(crate) fn resolve_paths(config: &AppConfig, args: &DatasetArgs) -> WorkbookPaths {
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.dataset.input));

    let enriched = if args.in_place {
        input.clone()
    } else if let Some(output) = &args.output {
        output.clone()
    } else if let Some(enriched) = &config.dataset.enriched {
        PathBuf::from(enriched)
    } else {
        default_enriched_path(&input)
    };

    WorkbookPaths {
        sheet: args
            .sheet
            .clone()
            .unwrap_or_else(|| config.dataset.sheet.clone()),
        report: args
            .report
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.dataset.report)),
        enriched,
        input,
    }
}

/// Merge enrichment flags over config values.
pub(crate) fn resolve_enrichment(config: &AppConfig, args: &EnrichArgs) -> EnrichmentConfig {
    let mut enrichment = EnrichmentConfig::from(config);
    if let Some(max_rows) = args.max_rows {
        enrichment.max_rows = max_rows;
    }
    if let Some(delay_ms) = args.delay_ms {
        enrichment.delay_ms = delay_ms;
    }
    enrichment
}

/// Parse criteria flags. Never fails: bad input becomes a neutral value.
pub(crate) fn resolve_criteria(args: &CriteriaArgs) -> Criteria {
    Criteria {
        region_equals: args.region.trim().to_string(),
        min_aum: parse_operator_number(&args.min_aum),
        min_latest_fund_size: parse_operator_number(&args.min_fund_size),
        min_capital_raised: parse_operator_number(&args.min_capital_raised),
        focus_contains: args.focus.trim().to_string(),
        priority: parse_priority_list(&args.priority),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    dataset: &DatasetArgs,
    enrich: &EnrichArgs,
    criteria: &CriteriaArgs,
    no_enrich: bool,
) -> Result<()> {
    let config = load(config_path)?;
    let run_config = RunConfig {
        paths: resolve_paths(&config, dataset),
        enrich: config.enrichment.enabled && !no_enrich,
        enrichment: resolve_enrichment(&config, enrich),
        criteria: resolve_criteria(criteria),
    };
    let lookup = WikiLookupClient::new(&LookupConfig::from(&config))?;

    info!(
        input = %run_config.paths.input.display(),
        sheet = %run_config.paths.sheet,
        enrich = run_config.enrich,
        "starting run"
    );

    let progress = CliProgress::new();
    let result = pipeline::run(&run_config, &lookup, &progress).await;
    progress.finish();
    let result = result?;

    println!();
    if let Some(summary) = &result.enrichment {
        print_enrichment(summary, result.enriched_path.as_deref());
    }
    print_report(&result.report);
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_enrich(
    config_path: Option<&Path>,
    dataset: &DatasetArgs,
    enrich: &EnrichArgs,
) -> Result<()> {
    let config = load(config_path)?;
    let paths = resolve_paths(&config, dataset);
    let enrichment = resolve_enrichment(&config, enrich);
    let lookup = WikiLookupClient::new(&LookupConfig::from(&config))?;

    info!(input = %paths.input.display(), max_rows = enrichment.max_rows, "enriching dataset");

    let progress = CliProgress::new();
    let summary = pipeline::enrich_workbook(&paths, &enrichment, &lookup, &progress).await;
    progress.finish();
    let summary = summary?;

    println!();
    print_enrichment(&summary, Some(&paths.enriched));
    println!();

    Ok(())
}

fn cmd_report(
    config_path: Option<&Path>,
    dataset: &DatasetArgs,
    criteria: &CriteriaArgs,
) -> Result<()> {
    let config = load(config_path)?;
    let paths = resolve_paths(&config, dataset);
    let criteria = resolve_criteria(criteria);

    info!(input = %paths.input.display(), "writing report");
    let outcome = pipeline::report_workbook(&paths, &criteria)?;

    println!();
    print_report(&outcome);
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_enrichment(summary: &EnrichmentSummary, saved: Option<&Path>) {
    println!("  Enrichment run {}", summary.run_id);
    println!("  Candidates: {}", summary.candidates);
    println!("  Attempted:  {}", summary.attempted);
    println!("  Filled:     {}", summary.filled);
    println!("  Not found:  {}", summary.not_found);
    println!("  Failed:     {}", summary.failed);
    if summary.deferred > 0 {
        println!("  Deferred:   {} (raise --max-rows to include them)", summary.deferred);
    }
    if let Some(path) = saved {
        println!("  Saved:      {}", path.display());
    }
    println!();
}

fn print_report(outcome: &ReportOutcome) {
    println!("  Matches:    {}", outcome.matched);
    println!("  Report:     {}", outcome.path.display());

    if outcome.top.is_empty() {
        return;
    }

    println!();
    println!(
        "  {:>5}  {:<32} {:<14} {:<16} {:>9} {:>9} {:>11}",
        "Rank", "Firm", "Region", "Focus", "AUM", "Fund", "Raised"
    );
    for firm in &outcome.top {
        println!(
            "  {:>5}  {:<32} {:<14} {:<16} {:>9.1} {:>9.1} {:>11.0}",
            firm.rank,
            truncate(&firm.name, 32),
            truncate(&firm.region, 14),
            truncate(&firm.primary_focus, 16),
            firm.aum,
            firm.latest_fund_size,
            firm.capital_raised,
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl EnrichmentProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("Looking up [{current}/{total}] {detail}"));
    }
}
