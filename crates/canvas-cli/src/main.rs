mod render;

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use canvas_contracts::events::EventWriter;
use canvas_contracts::models::ModelCatalog;
use canvas_contracts::session::{
    parse_command, DownloadTarget, SeedUpdate, SessionCommand, Toggle, SESSION_HELP_COMMANDS,
};
use canvas_contracts::settings::{Settings, DEFAULT_MODEL};
use canvas_engine::download::save_image;
use canvas_engine::{
    load_model_catalog, EndpointConfig, GenerationError, LoadedImage, Orchestrator,
    OrchestratorEvent, PollinationsClient, RunReport,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};

use crate::render::{history_lines, settings_lines, ProgressRenderer};

const PROGRESS_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "canvas", version, about = "Dream Canvas prompt-to-image CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one batch of images for a prompt and save them.
    Generate(GenerateArgs),
    /// List the models offered by the image service.
    Models,
    /// Interactive session with settings, history and downloads.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long, default_value_t = 512)]
    width: i64,
    #[arg(long, default_value_t = 512)]
    height: i64,
    #[arg(long)]
    seed: Option<i64>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Send `enhance=false` to the image service.
    #[arg(long)]
    no_enhance: bool,
    /// Allow the service watermark.
    #[arg(long)]
    logo: bool,
    /// Allow the service to list the images publicly.
    #[arg(long)]
    public: bool,
}

impl SettingsArgs {
    fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.set_width(self.width);
        settings.set_height(self.height);
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        settings.set_model(&self.model);
        settings.enhance = !self.no_enhance;
        settings.nologo = !self.logo;
        settings.private = !self.public;
        settings
    }
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Skip the prompt rewrite by the text service.
    #[arg(long)]
    raw_prompt: bool,
    #[arg(long)]
    no_save: bool,
    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    raw_prompt: bool,
    #[command(flatten)]
    settings: SettingsArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("canvas error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Models => run_models(),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let events = open_events(&args.out, args.events.as_deref())?;
    let settings = args.settings.to_settings();
    emit(
        &events,
        "session_started",
        json!({ "mode": "generate", "out_dir": args.out.display().to_string(), "settings": settings }),
    );
    let orchestrator = build_orchestrator(!args.raw_prompt, events.clone())?;
    let updates = orchestrator.subscribe();
    let mut renderer = ProgressRenderer::new();

    let result = run_with_progress(&orchestrator, &updates, &mut renderer, |orchestrator| {
        orchestrator.run_generation(&args.prompt, &settings)
    });
    let report = match result {
        Ok(report) => report,
        Err(_) => return Ok(1),
    };
    print_report(&report);
    if !args.no_save {
        for image in &report.images {
            let path = save_and_log(&events, image, &args.out)?;
            println!("Saved {}", path.display());
        }
    }
    Ok(0)
}

fn run_models() -> Result<i32> {
    let client = PollinationsClient::new(EndpointConfig::from_env()?)?;
    let catalog = load_model_catalog(&client);
    if let Some(warning) = catalog.warning() {
        eprintln!("warning: {warning}");
    }
    for model in catalog.models() {
        println!("{model}");
    }
    Ok(0)
}

fn run_session(args: SessionArgs) -> Result<()> {
    let events = open_events(&args.out, args.events.as_deref())?;
    let mut settings = args.settings.to_settings();
    emit(
        &events,
        "session_started",
        json!({ "mode": "session", "out_dir": args.out.display().to_string(), "settings": settings }),
    );

    let client = PollinationsClient::new(EndpointConfig::from_env()?)?;
    let catalog = load_model_catalog(&client);
    emit(
        &events,
        "models_loaded",
        json!({
            "models": catalog.models().collect::<Vec<_>>(),
            "warning": catalog.warning(),
        }),
    );
    if let Some(warning) = catalog.warning() {
        println!("[warn] {warning}");
    }
    if !catalog.contains(&settings.model) {
        println!(
            "Model {} is not offered; using {}",
            settings.model,
            catalog.default_model()
        );
        settings.set_model(catalog.default_model());
    }

    let orchestrator = Orchestrator::from_client(client, !args.raw_prompt).with_events(events.clone());
    let updates = orchestrator.subscribe();
    let mut renderer = ProgressRenderer::new();
    let mut last_report: Option<RunReport> = None;

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Dream Canvas session started. Type a prompt or /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(line.trim_end_matches(['\n', '\r'])) {
            SessionCommand::Noop => {}
            SessionCommand::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
            }
            SessionCommand::Quit => break,
            SessionCommand::ShowSettings => print_lines(settings_lines(&settings)),
            SessionCommand::ListModels => print_models(&catalog, &settings),
            SessionCommand::ShowHistory => print_lines(history_lines(&orchestrator.history())),
            SessionCommand::SetWidth(value) => {
                println!("Width set to {}", settings.set_width(value));
            }
            SessionCommand::SetHeight(value) => {
                println!("Height set to {}", settings.set_height(value));
            }
            SessionCommand::SetSeed(SeedUpdate::Fixed(seed)) => {
                settings.seed = seed;
                println!("Seed set to {seed}");
            }
            SessionCommand::SetSeed(SeedUpdate::Random) => {
                println!("Seed set to {}", settings.reseed());
            }
            SessionCommand::SetModel(model) => {
                if catalog.contains(&model) {
                    settings.set_model(&model);
                    println!("Model set to {}", settings.model);
                } else {
                    println!("Unknown model {model}. Use /models to list the available ones.");
                }
            }
            SessionCommand::SetToggle(toggle, value) => {
                let (name, slot) = match toggle {
                    Toggle::Enhance => ("Enhancement", &mut settings.enhance),
                    Toggle::NoLogo => ("No logo", &mut settings.nologo),
                    Toggle::Private => ("Private", &mut settings.private),
                };
                *slot = value;
                println!("{name} {}", if value { "on" } else { "off" });
            }
            SessionCommand::Generate(prompt) => {
                let result = run_with_progress(&orchestrator, &updates, &mut renderer, |orchestrator| {
                    orchestrator.run_generation(&prompt, &settings)
                });
                if let Ok(report) = result {
                    print_report(&report);
                    last_report = Some(report);
                }
            }
            SessionCommand::Regenerate => {
                if orchestrator.last_prompt().is_none() {
                    println!("Nothing to regenerate yet. Type a prompt first.");
                    continue;
                }
                let result = run_with_progress(&orchestrator, &updates, &mut renderer, |orchestrator| {
                    orchestrator.regenerate(&settings)
                });
                if let Ok(report) = result {
                    print_report(&report);
                    last_report = Some(report);
                }
            }
            SessionCommand::Download(target) => {
                let Some(report) = last_report.as_ref() else {
                    println!("No images to download yet.");
                    continue;
                };
                match select_images(report, target) {
                    Ok(images) => {
                        for image in images {
                            match save_and_log(&events, image, &args.out) {
                                Ok(path) => println!("Saved {}", path.display()),
                                Err(err) => println!("[error] Download failed: {err:#}"),
                            }
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            SessionCommand::Invalid { command, reason } => {
                println!("/{command}: {reason}");
            }
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    Ok(())
}

/// Runs one generation on a worker thread while the caller's thread renders
/// orchestrator notifications as they arrive.
fn run_with_progress<F>(
    orchestrator: &Orchestrator,
    updates: &Receiver<OrchestratorEvent>,
    renderer: &mut ProgressRenderer,
    job: F,
) -> Result<RunReport, GenerationError>
where
    F: FnOnce(&Orchestrator) -> Result<RunReport, GenerationError> + Send,
{
    thread::scope(|scope| {
        let handle = scope.spawn(move || job(orchestrator));
        while !handle.is_finished() {
            match updates.recv_timeout(PROGRESS_POLL) {
                Ok(event) => print_lines(renderer.render(&event)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for event in updates.try_iter() {
            print_lines(renderer.render(&event));
        }
        handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    })
}

fn build_orchestrator(enhance_prompts: bool, events: EventWriter) -> Result<Orchestrator> {
    let client = PollinationsClient::new(EndpointConfig::from_env()?)?;
    Ok(Orchestrator::from_client(client, enhance_prompts).with_events(events))
}

fn open_events(out_dir: &Path, events: Option<&Path>) -> Result<EventWriter> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;
    let path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join("events.jsonl"));
    Ok(EventWriter::new(path, uuid::Uuid::new_v4().to_string()))
}

/// Picks loaded images of the latest run. `One(n)` addresses the n-th image
/// of the batch, counting from 1.
fn select_images(
    report: &RunReport,
    target: DownloadTarget,
) -> std::result::Result<Vec<&LoadedImage>, String> {
    match target {
        DownloadTarget::All if report.images.is_empty() => {
            Err("No images to download yet.".to_string())
        }
        DownloadTarget::All => Ok(report.images.iter().collect()),
        DownloadTarget::One(position) => report
            .images
            .iter()
            .find(|image| image.index + 1 == position)
            .map(|image| vec![image])
            .ok_or_else(|| format!("Image {position} is not available for download.")),
    }
}

fn save_and_log(events: &EventWriter, image: &LoadedImage, dir: &Path) -> Result<PathBuf> {
    let path = save_image(image, dir)?;
    emit(
        events,
        "image_saved",
        json!({
            "index": image.index,
            "seed": image.metadata.seed,
            "url": image.url,
            "path": path.display().to_string(),
        }),
    );
    Ok(path)
}

fn print_report(report: &RunReport) {
    if let Some(enhanced) = report.enhanced_prompt.as_deref() {
        println!("Enhanced prompt: {enhanced}");
    }
    for failure in &report.failed {
        println!(
            "  image {} gave up after {} attempt(s): {}",
            failure.index + 1,
            failure.attempts,
            failure.message
        );
    }
}

fn print_models(catalog: &ModelCatalog, settings: &Settings) {
    for model in catalog.models() {
        let marker = if model == settings.model { "*" } else { " " };
        println!("{marker} {model}");
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

fn emit(events: &EventWriter, event_type: &str, payload: Value) {
    if let Err(err) = events.emit(event_type, json_object(payload)) {
        eprintln!("warning: event log write failed: {err:#}");
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use canvas_contracts::runs::{ImageMetadata, ImageParams};
    use canvas_contracts::session::DownloadTarget;
    use canvas_contracts::settings::Settings;
    use canvas_engine::{LoadedImage, RunReport};
    use clap::Parser;

    use super::{open_events, select_images, Cli, Command};

    fn loaded(index: usize) -> LoadedImage {
        LoadedImage {
            index,
            url: format!("https://image.example/{index}"),
            metadata: ImageMetadata {
                seed: index as i64,
                params: ImageParams::from(&Settings::default()),
                timestamp: "2026-10-16T00:00:00.000Z".to_string(),
            },
            width: 4,
            height: 4,
            bytes: Vec::new(),
        }
    }

    fn report(indices: &[usize]) -> RunReport {
        RunReport {
            run_id: 1,
            prompt: "koi pond".to_string(),
            enhanced_prompt: None,
            images: indices.iter().copied().map(loaded).collect(),
            failed: Vec::new(),
            elapsed_seconds: 1.0,
        }
    }

    #[test]
    fn generate_flags_map_onto_settings() {
        let cli = Cli::try_parse_from([
            "canvas",
            "generate",
            "--prompt",
            "a lighthouse",
            "--out",
            "/tmp/canvas",
            "--width",
            "700",
            "--seed",
            "42",
            "--model",
            "turbo",
            "--no-enhance",
            "--public",
        ]);
        let Ok(Cli {
            command: Command::Generate(args),
        }) = cli
        else {
            panic!("generate args did not parse");
        };
        let settings = args.settings.to_settings();
        assert_eq!((settings.width, settings.height), (704, 512));
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.model, "turbo");
        assert!(!settings.enhance);
        assert!(settings.nologo);
        assert!(!settings.private);
        assert!(!args.raw_prompt);
    }

    #[test]
    fn download_selects_by_batch_position() {
        let batch = report(&[0, 2]);
        let picked = select_images(&batch, DownloadTarget::One(3)).unwrap_or_default();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].index, 2);

        assert!(select_images(&batch, DownloadTarget::One(2)).is_err());
        assert_eq!(
            select_images(&batch, DownloadTarget::All)
                .map(|images| images.len())
                .unwrap_or_default(),
            2
        );
        assert!(select_images(&report(&[]), DownloadTarget::All).is_err());
    }

    #[test]
    fn events_default_to_out_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("run");
        let writer = open_events(&out, None)?;
        assert_eq!(writer.path(), Some(out.join("events.jsonl").as_path()));
        assert!(out.is_dir());
        assert!(!writer.session_id().is_empty());
        Ok(())
    }
}
