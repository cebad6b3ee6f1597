use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use screencue::action_engine::capture_sequence::{ActionRequest, CaptureAutomationSequence, InsertionPoint};
use screencue::action_engine::click_sequence::{ClickRequest, RepeatingClickSequence};
use screencue::config::{self, AppConfig};
use screencue::errors::{ScreenCueError, ScreenCueResult};
use screencue::executor::input::{ClickKind, EnigoInjector, MouseButton};
use screencue::perception::region::{parse_region_descriptor, SlurpSelector};
use screencue::perception::traits::{RegionSelector, Selection};
use screencue::perception::types::{Point, Region};
use screencue::{
    collaborators_from_config, init_tracing, Engine, EngineEvent, ErrorKind, RunHandle, RunResult,
};

/// Screen-to-model-to-keyboard automation and a repeating clicker.
#[derive(Parser, Debug)]
#[command(name = "screencue", version)]
struct Cli {
    /// Path to config.toml (default: searched next to the binary, cwd, then the user config dir)
    #[arg(long, global = true, env = "SCREENCUE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Switch focus, type, capture a region, ask the model, type its answer
    Automate(AutomateArgs),
    /// Click repeatedly after a short countdown
    Click(ClickArgs),
    /// Pick a screen region interactively and print it
    SelectRegion,
    /// Write the effective configuration to disk
    SaveConfig,
}

#[derive(Args, Debug)]
struct AutomateArgs {
    /// Capture region as "X,Y WxH"; selected interactively when omitted
    #[arg(long)]
    region: Option<String>,

    /// Click here before typing the response ("X,Y")
    #[arg(long, conflicts_with = "select_insertion")]
    insert_at: Option<Point>,

    /// Pick the insertion point interactively (center of the selected area)
    #[arg(long)]
    select_insertion: bool,

    #[arg(long)]
    initial_text: Option<String>,

    /// Delay between initial keystrokes (ms)
    #[arg(long)]
    initial_delay_ms: Option<u64>,

    #[arg(long)]
    prompt: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Delay between response keystrokes (ms)
    #[arg(long)]
    response_delay_ms: Option<u64>,

    /// Leave screenshots on disk after the run
    #[arg(long, short = 'k')]
    keep_artifacts: bool,
}

#[derive(Args, Debug)]
struct ClickArgs {
    /// Number of clicks, 0 for unlimited
    #[arg(long, short = 'n')]
    count: Option<u64>,

    /// Seconds between clicks
    #[arg(long, short = 'i')]
    interval: Option<f64>,

    /// left, right or middle
    #[arg(long)]
    button: Option<MouseButton>,

    /// single or double
    #[arg(long)]
    kind: Option<ClickKind>,

    /// Sample the pointer once after the countdown and click there every time
    #[arg(long)]
    lock: bool,

    /// Click wherever the pointer is, overriding a locking config
    #[arg(long, conflicts_with = "lock")]
    no_lock: bool,
}

impl ClickArgs {
    /// Explicit flags win over the configured default.
    fn lock_coordinates(&self, default: bool) -> bool {
        match (self.lock, self.no_lock) {
            (true, _) => true,
            (_, true) => false,
            _ => default,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "screencue failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ScreenCueResult<bool> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match cli.command {
        Command::Automate(args) => automate(&config, args).await,
        Command::Click(args) => click(&config, args).await,
        Command::SelectRegion => {
            let region = select_region(&SlurpSelector::new()).await?;
            println!("Region: {region}");
            println!("Center: {}", region.center());
            Ok(true)
        }
        Command::SaveConfig => {
            let path = match &cli.config {
                Some(path) => {
                    config::save_config_to(&config, path)?;
                    path.clone()
                }
                None => config::save_config(&config)?,
            };
            println!("Configuration saved to {}", path.display());
            Ok(true)
        }
    }
}

async fn select_region(selector: &dyn RegionSelector) -> ScreenCueResult<Region> {
    match selector.select().await? {
        Selection::Selected(region) => Ok(region),
        Selection::Cancelled => Err(ScreenCueError::SelectionCancelled),
    }
}

async fn automate(config: &AppConfig, args: AutomateArgs) -> ScreenCueResult<bool> {
    let selector = SlurpSelector::new();
    let region = match args.region.as_deref() {
        Some(descriptor) => parse_region_descriptor(descriptor)?,
        None => {
            eprintln!("Select the capture region...");
            select_region(&selector).await?
        }
    };
    let insertion = match (args.insert_at, args.select_insertion) {
        (Some(point), _) => InsertionPoint::At(point),
        (None, true) => {
            eprintln!("Select the area to type into...");
            InsertionPoint::At(select_region(&selector).await?.center())
        }
        (None, false) => InsertionPoint::CurrentFocus,
    };

    let mut request = ActionRequest::from_defaults(&config.automation, region, insertion);
    if let Some(text) = args.initial_text {
        request.initial_text = text;
    }
    if let Some(ms) = args.initial_delay_ms {
        request.initial_delay = std::time::Duration::from_millis(ms);
    }
    if let Some(prompt) = args.prompt {
        request.prompt = prompt;
    }
    if let Some(model) = args.model {
        request.model = model;
    }
    if let Some(t) = args.temperature {
        request.temperature = t;
    }
    if let Some(n) = args.max_output_tokens {
        request.max_output_tokens = n;
    }
    if let Some(ms) = args.response_delay_ms {
        request.response_delay = std::time::Duration::from_millis(ms);
    }

    let artifact_dir = config.tools.artifact_dir();
    tokio::fs::create_dir_all(&artifact_dir).await?;
    let sequence = CaptureAutomationSequence::new(
        request,
        collaborators_from_config(config)?,
        config.timings.clone(),
        artifact_dir,
    )?;

    let handle = Engine::new().start(sequence)?;
    let (result, artifacts) = follow(handle).await;
    if args.keep_artifacts {
        for path in &artifacts {
            println!("Kept {}", path.display());
        }
    } else {
        for path in &artifacts {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete artifact");
            }
        }
    }
    Ok(result.is_success())
}

async fn click(config: &AppConfig, args: ClickArgs) -> ScreenCueResult<bool> {
    let defaults = &config.clicker;
    let request = ClickRequest::new(
        args.count.unwrap_or(defaults.count),
        args.interval.unwrap_or(defaults.interval_secs),
        args.button.unwrap_or(defaults.button),
        args.kind.unwrap_or(defaults.kind),
        args.lock_coordinates(defaults.lock_coordinates),
    )?;
    let sequence = RepeatingClickSequence::new(request, Arc::new(EnigoInjector::new()), config.timings.clone());

    let handle = Engine::new().start(sequence)?;
    let (result, _) = follow(handle).await;
    // A clicker stopped with Ctrl-C did what it was asked.
    Ok(result.is_success() || result.error_kind() == Some(ErrorKind::Cancelled))
}

/// Prints progress until the terminal event. The first Ctrl-C cancels the run.
async fn follow(mut handle: RunHandle) -> (RunResult, Vec<PathBuf>) {
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(EngineEvent::Progress { step, text }) => println!("[{step}] {text}"),
                Some(EngineEvent::Done { result, artifacts }) => {
                    println!("{}", result.summary());
                    return (result, artifacts);
                }
                None => {
                    let result = RunResult::failure(ErrorKind::Internal, "run ended without a result");
                    println!("{}", result.summary());
                    return (result, Vec::new());
                }
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                    continue;
                }
                eprintln!("Stopping...");
                handle.cancel();
            }
        }
    }
}
