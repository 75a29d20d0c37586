use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use scentsync_core::{
    AppConfig, AudioManager, CueSchedule, Experience, HeadlessStage, TimelineConfig, TracingBackend,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> scentsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config, overrides } => run_play(config, &overrides).await,
        Commands::Schedule { config, overrides } => run_schedule(config, &overrides),
    }
}

async fn run_play(path: Option<PathBuf>, overrides: &TimelineOverrides) -> scentsync_core::Result<()> {
    let config = load_config(path, overrides)?;
    tracing::info!(timeline = ?config.timeline, "starting headless journey");

    let audio = Arc::new(AudioManager::new(Arc::new(TracingBackend)));
    let mut experience = Experience::new(config, HeadlessStage::new(), audio);
    experience.play_through().await?;

    let lights = experience.timeline().inspect_stage(|stage| stage.light_updates());
    tracing::info!(lights, "journey complete");
    Ok(())
}

fn run_schedule(path: Option<PathBuf>, overrides: &TimelineOverrides) -> scentsync_core::Result<()> {
    let config = load_config(path, overrides)?;
    let spans = config.timeline.spans();

    let mid_entry = spans.top + spans.transition;
    let base_entry = mid_entry + spans.mid + spans.transition;
    println!("phase       enters at");
    println!("top         {:>9.3}s", 0.0);
    println!("mid         {:>9.3}s", mid_entry.as_secs_f64());
    println!("base        {:>9.3}s", base_entry.as_secs_f64());
    println!("reflection  {:>9.3}s", spans.total().as_secs_f64());
    println!();

    let cues = CueSchedule::from_config(&config.timeline, &config.audio);
    println!("cue   fires at    clip");
    for cue in cues.cues() {
        println!(
            "{:<5} {:>9.3}s  {}",
            cue.layer.name(),
            cue.offset.as_secs_f64(),
            cue.clip
        );
    }
    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    overrides: &TimelineOverrides,
) -> scentsync_core::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig::default(),
    };
    overrides.apply(&mut config.timeline);
    Ok(config)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Timed scent journey runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one full journey against a headless stage, logging every step.
    Play {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: TimelineOverrides,
    },
    /// Print phase boundaries and voice cue offsets without running anything.
    Schedule {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: TimelineOverrides,
    },
}

/// Per-phase durations in seconds, overriding the configuration file.
#[derive(Args, Debug, Default)]
struct TimelineOverrides {
    #[arg(long)]
    top: Option<f64>,
    #[arg(long)]
    mid: Option<f64>,
    #[arg(long)]
    base: Option<f64>,
    #[arg(long)]
    transition: Option<f64>,
}

impl TimelineOverrides {
    fn apply(&self, timeline: &mut TimelineConfig) {
        if let Some(top) = self.top {
            timeline.top_duration = top;
        }
        if let Some(mid) = self.mid {
            timeline.mid_duration = mid;
        }
        if let Some(base) = self.base {
            timeline.base_duration = base;
        }
        if let Some(transition) = self.transition {
            timeline.transition_duration = transition;
        }
    }
}
