use crate::cli::{AnalyzeArgs, Cli, Commands, ExecuteArgs};
use anyhow::{bail, Context, Result};
use chicory::{
    EngineConfig, ExecutionReport, PlanDocument, PlannedStep, Session, StepStatus,
};
use serde::Serialize;
use tracing::{info, warn};

/// Resolve configuration: defaults, config file, environment, then flags.
pub fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;

    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    if let Commands::Analyze(AnalyzeArgs {
        reasoning_url: Some(url),
        ..
    }) = &cli.command
    {
        config.reasoning_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel the session's in-flight work on Ctrl-C.
fn cancel_on_ctrl_c(session: &Session) {
    let token = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!("Using automation backend at {}", config.backend_url);
    let mut session = Session::from_config(config)?;

    match &cli.command {
        Commands::Health => health(&session, cli.json).await,
        Commands::Windows => windows(&session, cli.json).await,
        Commands::Displays => displays(&session, cli.json),
        Commands::Execute(args) => execute(&mut session, args, cli.json).await,
        Commands::Analyze(args) => analyze(&mut session, args, cli.json).await,
    }
}

async fn health(session: &Session, json: bool) -> Result<()> {
    let ready = session.health().await?;
    let url = &session.config().backend_url;
    if json {
        print_json(&serde_json::json!({"ready": ready, "backend_url": url}))?;
    } else if ready {
        println!("Backend ready at {url}");
    }
    if !ready {
        bail!("Backend at {url} did not answer its health check");
    }
    Ok(())
}

async fn windows(session: &Session, json: bool) -> Result<()> {
    let windows = session.list_windows().await?;
    if json {
        return print_json(&windows);
    }
    println!("{:<10} {:<24} {:<40} {:>24} {:>6}", "ID", "OWNER", "TITLE", "BOUNDS", "SCALE");
    for w in &windows {
        let bounds = format!(
            "{},{} {}x{}",
            w.bounds.x, w.bounds.y, w.bounds.width, w.bounds.height
        );
        println!(
            "{:<10} {:<24} {:<40} {:>24} {:>6.2}",
            w.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            clip(&w.owner.name, 24),
            clip(&w.title, 40),
            bounds,
            w.scale_factor
        );
    }
    Ok(())
}

fn displays(session: &Session, json: bool) -> Result<()> {
    let displays = session.displays()?;
    if json {
        return print_json(&displays);
    }
    for d in &displays {
        println!(
            "{}{} '{}' at ({}, {}) {}x{} scale {:.2}",
            d.id,
            if d.is_primary { "*" } else { "" },
            d.name,
            d.bounds.x,
            d.bounds.y,
            d.bounds.width,
            d.bounds.height,
            d.scale_factor
        );
    }
    Ok(())
}

async fn execute(session: &mut Session, args: &ExecuteArgs, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&args.plan)
        .with_context(|| format!("Failed to read plan {}", args.plan.display()))?;
    let document: PlanDocument = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse plan {}", args.plan.display()))?;
    let plan = document.into_plan()?;

    if args.dry_run {
        let steps = session.dry_run(&plan)?;
        return if json {
            print_json(&steps)
        } else {
            print_planned(&steps);
            Ok(())
        };
    }

    if !json {
        println!("{}\n", plan.describe());
    }
    cancel_on_ctrl_c(session);
    let report = session.execute_plan(plan).await?;
    if json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

async fn analyze(session: &mut Session, args: &AnalyzeArgs, json: bool) -> Result<()> {
    cancel_on_ctrl_c(session);
    let outcome = session.analyze_window(args.window, &args.query).await?;
    if json {
        return print_json(&outcome);
    }

    println!("{}\n", outcome.description);
    if let Some(scroll) = &outcome.scroll {
        println!("Scrolled {} cycles, {} captures saved", scroll.cycles, scroll.artifacts.len());
    }
    print_report(&outcome.report);
    if let Some(dir) = &outcome.artifacts_dir {
        println!("Artifacts: {}", dir.display());
    }
    Ok(())
}

fn print_planned(steps: &[PlannedStep]) {
    for step in steps {
        match (&step.point, &step.skip_reason) {
            (_, Some(reason)) => println!("#{} {:<18} skip: {}", step.index, step.kind, reason),
            (Some(p), None) => println!(
                "#{} {:<18} {}{}",
                step.index,
                step.kind,
                p,
                if step.on_screen { "" } else { "  (off-screen)" }
            ),
            (None, None) => println!("#{} {}", step.index, step.kind),
        }
    }
}

fn print_report(report: &ExecutionReport) {
    for step in &report.steps {
        match &step.status {
            StepStatus::Executed { point: Some(p) } => {
                println!("#{} {:<18} done at {}", step.index, step.kind, p)
            }
            StepStatus::Executed { point: None } => println!("#{} {:<18} done", step.index, step.kind),
            StepStatus::Skipped { reason } => {
                println!("#{} {:<18} skipped: {}", step.index, step.kind, reason)
            }
        }
    }
    println!(
        "{} executed, {} skipped, {} backend calls",
        report.executed(),
        report.skipped(),
        report.backend_calls
    );
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
