use std::io::IsTerminal;

use clap::{Parser, Subcommand};

use taskpulse::format::{
    format_cost, format_duration, format_duration_f64, format_number, format_percent,
    format_tokens,
};
use taskpulse::view::FeatureRow;
use taskpulse::{
    AnalyticsSummary, DateFilter, DrillDownAction, DrillDownState, Feature, Outcome, Phase,
    TaskAnalytics, TaskPulse, ViewModel,
};

#[derive(Parser)]
#[command(name = "taskpulse", about = "Per-feature task analytics")]
struct Cli {
    /// Database path (default: ~/.taskpulse/taskpulse.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl taskpulse::ImportProgress for StderrProgress {
    fn on_start(&self, source: &str, total: usize) {
        eprintln!("Importing {total} records from {source}...");
    }

    fn on_batch(&self, _source: &str, written: usize, total: usize) {
        eprint!("\r  Written: {written}/{total}   ");
    }

    fn on_complete(&self, report: &taskpulse::ImportReport) {
        eprintln!("\n  Done: {} imported, {} rejected", report.records_imported, report.records_failed);
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import task records from a JSON file
    Import {
        /// JSON file: an array of tasks or {"tasks": [...]}
        file: String,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the summary for a period
    Summary {
        /// Period: today, yesterday, last_7_days, this_month, last_month,
        /// last_6_months, this_year, all_time
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Drill into one feature
    Feature {
        /// kanban, insights, roadmap, ideation, changelog, github-prs
        feature: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Drill into one task
    Task {
        task_id: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Drill into one phase of a task
    Phase {
        task_id: String,
        /// planning, coding, validation
        phase: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Remove a task record
    Remove { task_id: String },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show store status
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => taskpulse::Database::open_at(path).await?,
        None => taskpulse::Database::open().await?,
    };
    let tp = TaskPulse::new(db);

    match cli.command {
        Commands::Import { file, json } => {
            let report = tp.import_file(&file, &StderrProgress).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Import: {}", report.source);
                println!("  Status:   {:?}", report.status);
                println!("  Imported: {}", report.records_imported);
                println!("  Rejected: {}", report.records_failed);
                if let Some(ref err) = report.error {
                    println!("  Error:    {err}");
                }
            }
        }
        Commands::Summary { period, json } => {
            let filter = resolve_filter(&tp, period.as_deref()).await?;
            let summary = tp.summary(filter).await?;
            render(&summary, &DrillDownState::Overview, json)?;
        }
        Commands::Feature {
            feature,
            period,
            json,
        } => {
            let feature = Feature::parse(&feature)
                .ok_or_else(|| anyhow::anyhow!("unknown feature: {feature}"))?;
            let filter = resolve_filter(&tp, period.as_deref()).await?;
            let summary = tp.summary(filter).await?;
            let state = DrillDownState::Overview.apply(DrillDownAction::SelectFeature(feature));
            render(&summary, &state, json)?;
        }
        Commands::Task {
            task_id,
            period,
            json,
        } => {
            let filter = resolve_filter(&tp, period.as_deref()).await?;
            let summary = tp.summary(filter).await?;
            let state = task_state(&tp, &summary, &task_id).await?;
            render(&summary, &state, json)?;
        }
        Commands::Phase {
            task_id,
            phase,
            period,
            json,
        } => {
            let phase =
                Phase::parse(&phase).ok_or_else(|| anyhow::anyhow!("unknown phase: {phase}"))?;
            let filter = resolve_filter(&tp, period.as_deref()).await?;
            let summary = tp.summary(filter).await?;
            let state = task_state(&tp, &summary, &task_id).await?.select_phase(phase);
            render(&summary, &state, json)?;
        }
        Commands::Remove { task_id } => {
            if tp.remove_task(&task_id).await? {
                println!("Removed {task_id}");
            } else {
                println!("Not found: {task_id}");
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => match tp.config_get(&key).await? {
                Some(value) => println!("{value}"),
                None => println!("(not set)"),
            },
            ConfigAction::Set { key, value } => {
                tp.config_set(&key, &value).await?;
                println!("Set {key}");
            }
            ConfigAction::List => {
                for (key, value) in tp.config_list().await? {
                    println!("{key} = {value}");
                }
            }
        },
        Commands::Status { json } => {
            let status = tp.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Tasks:  {}", format_number(status.task_count));
                println!("Phases: {}", format_number(status.phase_count));
                if let (Some(first), Some(last)) =
                    (&status.earliest_created_at, &status.latest_created_at)
                {
                    println!("Range:  {first} .. {last}");
                }
                for (feature, count) in &status.tasks_by_feature {
                    println!("  {feature:<12} {count}");
                }
            }
        }
    }

    Ok(())
}

async fn resolve_filter(tp: &TaskPulse, period: Option<&str>) -> anyhow::Result<DateFilter> {
    match period {
        Some(p) => Ok(DateFilter::parse(p)?),
        None => Ok(tp.default_filter().await?),
    }
}

/// Navigate to a task. The feature comes from the summary when the task is
/// in the period, otherwise from the store so the NotFound view names it.
async fn task_state(
    tp: &TaskPulse,
    summary: &AnalyticsSummary,
    task_id: &str,
) -> anyhow::Result<DrillDownState> {
    let feature = match summary.task(task_id) {
        Some(task) => task.feature,
        None => tp.task(task_id).await?.feature,
    };
    Ok(DrillDownState::Overview
        .apply(DrillDownAction::SelectFeature(feature))
        .select_task(task_id))
}

fn render(summary: &AnalyticsSummary, state: &DrillDownState, json: bool) -> anyhow::Result<()> {
    let view = taskpulse::view_model(summary, state);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "{}  [{}]",
        state.breadcrumbs().join(" > "),
        summary.date_filter.label()
    );
    match view {
        ViewModel::Overview { summary, features } => print_overview(summary, &features),
        ViewModel::Feature {
            metrics,
            tasks,
            phases,
        } => {
            println!("  Tasks:        {}", metrics.task_count);
            println!("  Tokens:       {}", format_tokens(metrics.total_tokens));
            println!("  Avg duration: {}", format_duration_f64(metrics.average_duration_ms));
            println!(
                "  Outcomes:     {} ok / {} failed / {} running ({})",
                metrics.success_count,
                metrics.error_count,
                metrics.in_progress_count,
                format_percent(metrics.success_rate)
            );
            println!("  Phases:");
            for p in &phases {
                println!(
                    "    {:<11} {:>8}  {:>6}  {}",
                    p.phase.label(),
                    format_tokens(p.tokens),
                    format_percent(p.token_share),
                    format_duration(clamp_ms(p.duration_ms))
                );
            }
            println!("  Recent tasks:");
            for task in &tasks {
                print_task_line(task);
            }
        }
        ViewModel::Task { task } => print_task(task),
        ViewModel::Phase { task, metrics } => {
            println!("  Task:     {}", task.display_name());
            println!("  Tokens:   {}", format_tokens(metrics.tokens));
            println!("  Duration: {}", format_duration(clamp_ms(metrics.duration_ms)));
            if let Some(at) = metrics.started_at {
                println!("  Started:  {}", at.to_rfc3339());
            }
            if let Some(at) = metrics.completed_at {
                println!("  Finished: {}", at.to_rfc3339());
            }
        }
        ViewModel::NotFound { state } => {
            println!(
                "  Nothing to show for this selection in {}; try --period all_time",
                summary.date_filter
            );
            log::debug!("Unresolved drill-down state: {state:?}");
        }
    }
    Ok(())
}

fn print_overview(summary: &AnalyticsSummary, features: &[FeatureRow<'_>]) {
    if summary.is_empty() {
        println!("  No tasks in this period");
        return;
    }
    println!("  Tasks:        {}", format_number(summary.total_tasks));
    println!("  Tokens:       {}", format_tokens(summary.total_tokens));
    println!("  Avg duration: {}", format_duration_f64(summary.average_duration_ms));
    println!("  Success rate: {}", format_percent(summary.success_rate));
    println!(
        "  Outcomes:     {} ok / {} failed / {} running",
        summary.success_count, summary.error_count, summary.in_progress_count
    );
    if let Some(cost) = summary.total_cost_usd {
        println!("  Cost:         {}", format_cost(cost));
    }
    println!("  By feature:");
    for row in features {
        println!(
            "    {:<11} {:>4} tasks  {:>8} ({:>6})  {}",
            row.label,
            row.metrics.task_count,
            format_tokens(row.metrics.total_tokens),
            format_percent(row.token_share),
            format_percent(row.metrics.success_rate)
        );
    }
}

fn print_task(task: &TaskAnalytics) {
    println!("  Task:     {}", task.display_name());
    println!("  Feature:  {}", task.feature.label());
    println!("  Outcome:  {}", outcome_label(task.outcome));
    println!("  Tokens:   {}", format_tokens(task.total_tokens));
    println!("  Duration: {}", format_duration(clamp_ms(task.total_duration_ms)));
    println!("  Created:  {}", task.created_at.to_rfc3339());
    if let Some(b) = &task.breakdown {
        println!(
            "  Breakdown: in {} / out {} / cache {}+{}",
            format_tokens(b.input_tokens),
            format_tokens(b.output_tokens),
            format_tokens(b.cache_read_tokens),
            format_tokens(b.cache_write_tokens)
        );
        if let Some(cost) = b.cost_usd {
            println!("  Cost:     {}", format_cost(cost));
        }
    }
    for p in &task.phases {
        println!(
            "    {:<11} {:>8}  {}",
            p.phase.label(),
            format_tokens(p.tokens),
            format_duration(clamp_ms(p.duration_ms))
        );
    }
}

fn print_task_line(task: &TaskAnalytics) {
    println!(
        "    {:<12} {:<12} {:>8}  {:>8}  {}",
        task.task_id,
        outcome_label(task.outcome),
        format_tokens(task.total_tokens),
        format_duration(clamp_ms(task.total_duration_ms)),
        task.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn outcome_label(outcome: Outcome) -> String {
    if std::io::stdout().is_terminal() {
        format!("\x1b[{}m{}\x1b[0m", outcome.color().ansi_code(), outcome.label())
    } else {
        outcome.label().to_string()
    }
}
