use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use airesearch_agents::build_orchestrator;
use airesearch_core::{
    Config, ConfigLoader, Mode, Orchestrator, Profile, RunLogInput, RunOptions, RunOutcome,
    RunStatus, TelemetryOptions, Topic, TraceSummary, init_metrics_from_env, init_telemetry,
    log_run_completion, persist_trace, render_markdown, save_report,
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "airesearch",
    version,
    about = "Multi-agent research assistant: search, analyze, report"
)]
struct Cli {
    /// Path to a TOML config file (defaults to $AIRESEARCH_CONFIG or ./config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base profile applied before the config file: development, production or test.
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Force offline demo mode regardless of configuration.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a single topic and print the report.
    Run(RunArgs),
    /// Prompt for topics until `quit`.
    Interactive,
    /// Show the effective configuration.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Skip writing the report to the output directory.
    #[arg(long)]
    no_save: bool,

    /// Print the stage trace and persist it as JSON.
    #[arg(long)]
    trace: bool,

    /// Directory for persisted traces (defaults to `<output_dir>/traces`).
    #[arg(long)]
    trace_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Number of runs to estimate cost for.
    #[arg(long, default_value_t = 10)]
    runs: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_telemetry(TelemetryOptions::default().with_level(&config.logging.level))?;
    init_metrics_from_env("airesearch");

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(&config, args).await?,
            Command::Interactive => interactive_command(&config).await?,
            Command::Config(args) => config_command(&config, args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.profile.as_deref() {
        Some(name) => Config::for_profile(name.parse::<Profile>()?),
        None => Config::default(),
    };
    let mut config = ConfigLoader::load_unvalidated(cli.config.clone(), base)?;
    if cli.demo {
        config.mode = Mode::Demo;
    }
    config.validate()?;
    Ok(config)
}

async fn run_command(config: &Config, args: RunArgs) -> Result<()> {
    let topic = Topic::new(args.topic.as_str())?;
    let orchestrator = build_orchestrator(config)?;
    info!(%topic, mode = ?config.mode, "starting research run");

    let trace_dir = args.trace.then(|| {
        args.trace_dir
            .clone()
            .unwrap_or_else(|| config.report.output_dir.join("traces"))
    });
    let outcome = execute_run(&orchestrator, config, topic, !args.no_save, trace_dir).await?;

    match args.format {
        OutputFormat::Markdown => {
            println!("{}", render_markdown(&outcome.report, &outcome.snippets));
            if !outcome.keywords.is_empty() {
                println!("Keywords: {}", outcome.keywords.join(", "));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    if args.trace {
        eprintln!("{}", TraceSummary::from_events(&outcome.trace).render_markdown());
    }

    Ok(())
}

/// Run the pipeline, persist the report and trace when asked, and record the run log.
async fn execute_run(
    orchestrator: &Orchestrator,
    config: &Config,
    topic: Topic,
    save: bool,
    trace_dir: Option<PathBuf>,
) -> Result<RunOutcome> {
    let run_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let result = orchestrator
        .run_with_options(RunOptions::new(topic.clone()).with_run_id(run_id.clone()))
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            if config.logging.persist_runs {
                record_run(RunLogInput {
                    run_id,
                    topic: topic.to_string(),
                    status: RunStatus::Failed {
                        error_kind: err.kind().to_string(),
                        error: err.to_string(),
                    },
                    report_title: None,
                    section_count: 0,
                    sources: Vec::new(),
                    report_path: None,
                    trace_path: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            return Err(err.into());
        }
    };

    let report_path = if save && config.report.save {
        let markdown = render_markdown(&outcome.report, &outcome.snippets);
        match save_report(&config.report.output_dir, topic.as_str(), &markdown) {
            Ok(path) => {
                eprintln!("Report saved to {}", path.display());
                Some(path.display().to_string())
            }
            Err(err) => {
                warn!(error = %err, "failed to save report");
                eprintln!("Could not save report: {err:#}");
                None
            }
        }
    } else {
        None
    };

    let trace_path = match trace_dir {
        Some(dir) => match persist_trace(&dir, &outcome.run_id, &outcome.trace) {
            Ok(path) => {
                eprintln!("Trace saved to {}", path.display());
                Some(path.display().to_string())
            }
            Err(err) => {
                warn!(error = %err, "failed to persist trace");
                None
            }
        },
        None => None,
    };

    if config.logging.persist_runs {
        record_run(RunLogInput {
            run_id: outcome.run_id.clone(),
            topic: topic.to_string(),
            status: RunStatus::Completed,
            report_title: Some(outcome.report.title.clone()),
            section_count: outcome.report.sections.len(),
            sources: outcome
                .snippets
                .iter()
                .map(|snippet| snippet.url.clone())
                .collect(),
            report_path,
            trace_path,
            duration_ms: outcome.duration_ms,
        });
    }

    Ok(outcome)
}

fn record_run(input: RunLogInput) {
    if let Err(err) = log_run_completion(input) {
        warn!(error = %err, "failed to write run log");
    }
}

async fn interactive_command(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let completed =
        interactive_loop(&orchestrator, config, BufReader::new(tokio::io::stdin())).await?;
    info!(completed, "interactive session ended");
    Ok(())
}

/// Prompt for topics read from `reader`; returns how many runs produced a report.
async fn interactive_loop<R>(
    orchestrator: &Orchestrator,
    config: &Config,
    reader: R,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut completed = 0;

    println!("Enter a research topic (or 'quit' to exit)");
    loop {
        print!("\nResearch topic: ");
        io::stdout().flush()?;

        let Some(input) = lines.next_line().await? else {
            break;
        };
        let input = input.trim();

        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }
        let topic = match Topic::new(input) {
            Ok(topic) => topic,
            Err(_) => {
                println!("Please enter a valid topic");
                continue;
            }
        };

        match execute_run(orchestrator, config, topic, true, None).await {
            Ok(outcome) => {
                completed += 1;
                println!("{}", render_markdown(&outcome.report, &outcome.snippets));
            }
            Err(err) => println!("Research failed: {err}"),
        }
    }

    Ok(completed)
}

fn config_command(config: &Config, args: ConfigArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    let key = match config.llm_api_key() {
        Ok(secret) => secret.masked(),
        Err(_) => "(not set)".to_string(),
    };
    println!("{}: {key}", config.llm.api_key_env);
    println!("{}", config.estimate_cost(args.runs));
    Ok(())
}
