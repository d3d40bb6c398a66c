use anyhow::{Context, Result};
use assetline::cli::commands::{BuildCommand, PlanCommand, ValidateCommand};
use assetline::cli::output::*;
use assetline::cli::{Cli, Command};
use assetline::core::{BuildConfig, BuildError, BuildMode, BuildReport, ExecutionStatus, Pipeline};
use assetline::execution::{BuildEngine, CancellationFlag, ExecutionEvent, Notifier, WatchSubscription};
use assetline::handlers::HandlerCatalog;
use indicatif::ProgressBar;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for a build interrupted by the user
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Build(cmd) => run_build(&cli, cmd).await?,
        Command::Validate(cmd) => validate_config(&cli, cmd)?,
        Command::Plan(cmd) => show_plan(&cli, cmd)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<BuildConfig> {
    BuildConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load build config {}", cli.config.display()))
}

fn resolve_pipeline(config: &BuildConfig, mode: BuildMode) -> Result<Pipeline> {
    let catalog = HandlerCatalog::with_builtins();
    Pipeline::from_config(config, mode, &catalog).context("Invalid build configuration")
}

async fn run_build(cli: &Cli, cmd: &BuildCommand) -> Result<()> {
    let config = load_config(cli)?;
    let mode = cmd.mode.map(BuildMode::from).unwrap_or(config.mode);
    let pipeline = resolve_pipeline(&config, mode)?;
    let notifier = Notifier::new(pipeline.notifications.clone(), &pipeline.name);
    let engine = BuildEngine::new(&pipeline, cmd.strategy.into_strategy(pipeline.concurrency));

    let progress = if cmd.json { None } else { Some(create_progress_bar(0)) };
    if let Some(progress) = &progress {
        let progress = progress.clone();
        let verbose = cli.verbose;
        engine
            .add_event_handler(move |event| on_event(&progress, verbose, event))
            .await;
    }

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupt received, cancelling build");
                cancel.cancel();
            }
        });
    }

    let outcome = build_once(&pipeline, &engine, &cancel).await;
    finish_progress(&progress);

    if !cmd.watch {
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                if let Some(notification) = notifier.for_error(&err) {
                    println!("{}", format_notification(&notification));
                }
                return Err(err).context("Build failed");
            }
        };
        print_report(&report, cmd, cli.verbose, &notifier)?;
        if report.status == ExecutionStatus::Cancelled {
            std::process::exit(EXIT_CANCELLED);
        }
        return Ok(());
    }

    print_outcome(outcome, cmd, cli.verbose, &notifier)?;

    let mut subscription = WatchSubscription::start(
        pipeline.source_dir.clone(),
        vec![pipeline.output_dir.clone()],
        pipeline.poll_interval,
        cancel.clone(),
    )
    .await
    .with_context(|| format!("Failed to watch {}", pipeline.source_dir.display()))?;

    println!(
        "{}Watching {} for changes (Ctrl+C to stop)",
        EYES,
        style(pipeline.source_dir.display()).bold()
    );

    while let Some(changes) = subscription.next().await {
        println!("{}", format_changes(&changes));

        if let Some(progress) = &progress {
            progress.reset();
        }
        let outcome = build_once(&pipeline, &engine, &cancel).await;
        finish_progress(&progress);
        print_outcome(outcome, cmd, cli.verbose, &notifier)?;
        // Edits saved during the build are diffed against the pre-build snapshot on the next poll
    }

    println!("{}Stopped watching", INFO);
    Ok(())
}

/// Discover, plan and run once
async fn build_once(
    pipeline: &Pipeline,
    engine: &BuildEngine,
    cancel: &CancellationFlag,
) -> Result<BuildReport, BuildError> {
    let resources = pipeline.discover()?;
    let plan = pipeline.plan(&resources)?;
    debug!(resources = resources.len(), steps = plan.len(), "Planned build");
    engine.run(&plan, cancel).await
}

fn on_event(progress: &ProgressBar, verbose: bool, event: ExecutionEvent) {
    match &event {
        ExecutionEvent::BuildStarted { steps, .. } => {
            progress.set_length(*steps as u64);
            progress.set_position(0);
        }
        ExecutionEvent::StepStarted { resource, step } => {
            progress.set_message(format!("{} [{}]", resource, step));
        }
        ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. } => progress.inc(1),
        _ => {}
    }

    let printable = match &event {
        ExecutionEvent::AssetEmitted { .. } => verbose,
        _ => true,
    };
    if printable {
        if let Some(line) = format_execution_event(&event) {
            progress.println(line);
        }
    }
}

fn finish_progress(progress: &Option<ProgressBar>) {
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
}

fn print_report(report: &BuildReport, cmd: &BuildCommand, verbose: bool, notifier: &Notifier) -> Result<()> {
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", format_report(report, verbose));
    }
    if let Some(notification) = notifier.for_report(report) {
        println!("{}", format_notification(&notification));
    }
    Ok(())
}

/// Report a watch-mode build; errors are shown but never end the session
fn print_outcome(
    outcome: Result<BuildReport, BuildError>,
    cmd: &BuildCommand,
    verbose: bool,
    notifier: &Notifier,
) -> Result<()> {
    match outcome {
        Ok(report) => print_report(&report, cmd, verbose, notifier),
        Err(err) => {
            error!(error = %err, "Build failed");
            println!("{}{}", CROSS, style(&err).red());
            if let Some(notification) = notifier.for_error(&err) {
                println!("{}", format_notification(&notification));
            }
            Ok(())
        }
    }
}

fn validate_config(cli: &Cli, cmd: &ValidateCommand) -> Result<()> {
    let resolved = load_config(cli).and_then(|config| {
        let pipeline = resolve_pipeline(&config, config.mode)?;
        Ok((config, pipeline))
    });

    let (config, pipeline) = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            if cmd.json {
                let output = serde_json::json!({
                    "valid": false,
                    "error": format!("{:#}", err),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}Configuration is invalid: {}", CROSS, style(format!("{:#}", err)).red());
            }
            std::process::exit(1);
        }
    };

    if cmd.json {
        let output = serde_json::json!({
            "valid": true,
            "name": pipeline.name,
            "mode": pipeline.mode(),
            "steps": pipeline.registry().names(),
            "rules": config.rules.len(),
            "plugins": config.plugins,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}Configuration is valid", CHECK);
        println!("  Name:    {}", style(&pipeline.name).bold());
        println!("  Mode:    {}", pipeline.mode());
        println!("  Steps:   {}", pipeline.registry().len());
        println!("  Rules:   {}", config.rules.len());
        println!("  Plugins: {}", config.plugins.len());
    }

    Ok(())
}

fn show_plan(cli: &Cli, cmd: &PlanCommand) -> Result<()> {
    let config = load_config(cli)?;
    let mode = cmd.mode.map(BuildMode::from).unwrap_or(config.mode);
    let pipeline = resolve_pipeline(&config, mode)?;
    let resources = pipeline.discover().context("Failed to discover resources")?;
    let plan = pipeline.plan(&resources).context("Failed to plan build")?;

    if cmd.json {
        let entries: Vec<_> = plan
            .chains()
            .iter()
            .map(|chain| {
                serde_json::json!({
                    "resource": chain.resource.path,
                    "phase": chain.phase,
                    "steps": chain.step_names(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!(
            "{}Plan for {} ({}): {} resources, {} steps",
            INFO,
            style(&pipeline.name).bold(),
            mode,
            plan.chains().len(),
            plan.len()
        );
        println!("{}", format_plan(&plan));
    }

    Ok(())
}
