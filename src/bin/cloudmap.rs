use std::io::BufRead as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use cloudmap::{
    BackendKind, DirSourceProvider, Geometry, Pipeline, PipelineConfig, RunReport, Scheduler,
};

#[derive(Parser, Debug)]
#[command(name = "cloudmap", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once and publish every pyramid.
    Run(RunArgs),
    /// Run at startup and every interval; read `run`/`force` and `quit` from stdin.
    Schedule(ScheduleArgs),
    /// Print the subsolar point for a timestamp.
    Solar(SolarArgs),
}

#[derive(Parser, Debug)]
struct PipelineArgs {
    /// Pipeline config JSON. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source tree root.
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Output directory for published pyramids.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Cloud compositing backend.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Output height in pixels; width is twice this.
    #[arg(long)]
    height: Option<u32>,

    /// Fixed month (1-12) for the base textures.
    #[arg(long)]
    month: Option<u32>,

    /// Also publish the day/night mask.
    #[arg(long, default_value_t = false)]
    terminator_mask: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Run timestamp (RFC 3339); defaults to now.
    #[arg(long)]
    at: Option<String>,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Override the run interval in minutes.
    #[arg(long)]
    interval_minutes: Option<u64>,
}

#[derive(Parser, Debug)]
struct SolarArgs {
    /// Timestamp (RFC 3339); defaults to now.
    #[arg(long)]
    at: Option<String>,
}

fn main() -> anyhow::Result<()> {
    cloudmap::logging::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Schedule(args) => cmd_schedule(args),
        Command::Solar(args) => cmd_solar(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.pipeline)?;
    let at = parse_at(args.at.as_deref())?;
    let mut pipeline = build_pipeline(config)?;
    let report = pipeline.run_at(at).context("pipeline run")?;
    print_report(&report);
    if !report.failures.is_empty() {
        anyhow::bail!("{} file(s) failed to publish", report.failures.len());
    }
    Ok(())
}

fn cmd_schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let mut config = resolve_config(&args.pipeline)?;
    if let Some(m) = args.interval_minutes {
        config.interval_minutes = m;
    }
    config.validate().context("validate config")?;
    let interval = config.interval();
    let mut pipeline = build_pipeline(config)?;

    let scheduler = Scheduler::start(interval, move || match pipeline.run_now() {
        Ok(report) => print_report(&report),
        Err(e) => eprintln!("run failed: {e}"),
    })
    .context("start scheduler")?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        match line.trim() {
            "run" | "force" => scheduler.force().context("force run")?,
            "quit" | "exit" => break,
            "" => {}
            other => eprintln!("unknown command '{other}' (run, force, quit)"),
        }
    }

    let runner = Arc::clone(scheduler.runner());
    scheduler.shutdown();
    while !runner.wait_idle(Duration::from_secs(60)) {
        eprintln!("waiting for the in-flight run to finish");
    }
    eprintln!(
        "stopped after {} run(s), {} skipped",
        runner.runs_started(),
        runner.runs_skipped()
    );
    Ok(())
}

fn cmd_solar(args: SolarArgs) -> anyhow::Result<()> {
    let at = parse_at(args.at.as_deref())?;
    let sun = cloudmap::solar_position(at);
    println!("timestamp    {}", sun.timestamp_utc.to_rfc3339());
    println!("declination  {:.4}", sun.declination_degrees);
    println!("longitude    {:.4}", sun.subsolar_longitude_degrees);
    Ok(())
}

fn resolve_config(args: &PipelineArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &args.source_root {
        config.source_root = root.clone();
    }
    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(height) = args.height {
        config.geometry = Geometry::from_height(height).context("--height")?;
    }
    if args.month.is_some() {
        config.month = args.month;
    }
    if args.terminator_mask {
        config.write_terminator_mask = true;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate().context("validate config")?;
    Ok(config)
}

fn build_pipeline(config: PipelineConfig) -> anyhow::Result<Pipeline> {
    let provider = Arc::new(DirSourceProvider::new(config.source_root.clone()));
    Pipeline::new(config, provider).context("build pipeline")
}

fn parse_at(at: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("parse timestamp '{s}'"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn print_report(report: &RunReport) {
    for artifact in &report.artifacts {
        for file in &artifact.files {
            eprintln!("wrote {}", file.path.display());
        }
    }
    for failure in &report.failures {
        eprintln!("failed {failure}");
    }
    if report.realtime_skipped {
        eprintln!("skipped earth-realtime (no published day/night pyramid)");
    }
    eprintln!(
        "run for {} (month {}, {} backend) took {:.2}s",
        report.timestamp.to_rfc3339(),
        report.month,
        report.backend,
        report.elapsed.as_secs_f64()
    );
}
