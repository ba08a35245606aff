use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tokio::sync::mpsc::{self, Receiver};
use uuid::Uuid;

use vidstories::config::{AppConfig, Persona};
use vidstories::models::{VoiceParam, VoiceSlot};
use vidstories::pipeline::{EventKind, PipelineEvent, StoryRequest, Studio, VoiceMode, VoiceRequest};
use vidstories::services::Services;
use vidstories::utils::{ffmpeg, logger};

#[derive(Parser)]
#[command(name = "vidstories")]
#[command(about = "Narrated, illustrated story videos and tunable voice dialogue", long_about = None)]
struct Cli {
    /// Data root (AUDIO/, IMAGES/, PROJECTS/, DIALOGS/); defaults to VIDSTORIES_ROOT or "."
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story video from a prompt
    Story {
        /// Story concept
        prompt: String,

        /// Persona: default or custom (Persona.txt)
        #[arg(short, long, default_value = "default")]
        persona: Persona,

        /// Text model (gpt-4o-mini, gpt-4-turbo, gpt-4o)
        #[arg(short, long)]
        model: Option<String>,

        /// Narrator voice: 1 or 2
        #[arg(short, long, default_value = "1")]
        voice: VoiceSlot,
    },

    /// Voice a line of dialogue
    Voice {
        #[command(subcommand)]
        action: VoiceAction,
    },

    /// Change a voice parameter
    Tune {
        /// Voice: 1 or 2
        voice: VoiceSlot,

        /// pitch, speed, low_pass, high_pass, bass_boost, formant_shift
        param: VoiceParam,

        /// New value, clamped to the parameter range
        #[arg(long, allow_hyphen_values = true, conflicts_with = "steps")]
        value: Option<f64>,

        /// Move by this many steps (negative to decrease)
        #[arg(long, allow_hyphen_values = true)]
        steps: Option<i32>,
    },

    /// Show both voice profiles
    Voices,

    /// Saved dialogue files
    Files {
        #[command(subcommand)]
        action: Option<FilesAction>,
    },
}

#[derive(Subcommand)]
enum VoiceAction {
    /// Voice the text and keep it in AUDIO/ for listening
    Test(VoiceArgs),
    /// Voice the text and save it to DIALOGS/
    Save(VoiceArgs),
}

#[derive(Args)]
struct VoiceArgs {
    /// Voice: 1 or 2
    #[arg(short, long, default_value = "1")]
    voice: VoiceSlot,

    /// Replaces the scratch text (text_input.txt) before voicing
    #[arg(short, long)]
    text: Option<String>,

    /// Selection start, in characters
    #[arg(long, requires = "to")]
    from: Option<usize>,

    /// Selection end, in characters
    #[arg(long, requires = "from")]
    to: Option<usize>,
}

#[derive(Subcommand)]
enum FilesAction {
    /// List saved dialogue
    List,
    Rename { old_name: String, new_name: String },
    Copy { name: String, destination: PathBuf },
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.root.as_deref()).context("failed to load configuration")?;
    match ffmpeg::get_ffmpeg_version() {
        Ok(version) => info!("{}", version),
        Err(e) => warn!("Video and MP3 export are unavailable: {}", e),
    }

    let services = Services::from_config(&config)?;
    let (events_tx, mut events_rx) = mpsc::channel(256);
    let studio = Studio::open(config, services, events_tx)?;

    match cli.command {
        Commands::Story {
            prompt,
            persona,
            model,
            voice,
        } => {
            let handle = studio.submit_story(StoryRequest {
                prompt,
                persona,
                model,
                voice,
            })?;
            follow_job(&mut events_rx, handle.id()).await?;
        }
        Commands::Voice { action } => {
            let (args, mode) = match action {
                VoiceAction::Test(args) => (args, VoiceMode::Test),
                VoiceAction::Save(args) => (args, VoiceMode::Save),
            };
            let text = match args.text {
                Some(text) => {
                    studio.scratch().save(&text)?;
                    text
                }
                None => studio.scratch().load()?,
            };
            let selection = args.from.zip(args.to).map(|(from, to)| from..to);
            let handle = studio.submit_voice(VoiceRequest {
                text,
                selection,
                voice: args.voice,
                mode,
            })?;
            follow_job(&mut events_rx, handle.id()).await?;
        }
        Commands::Tune {
            voice,
            param,
            value,
            steps,
        } => {
            match (value, steps) {
                (Some(value), _) => studio.set_voice_param(voice, param, value).await?,
                (None, Some(steps)) => studio.nudge_voice_param(voice, param, steps).await?,
                (None, None) => anyhow::bail!("either --value or --steps is required"),
            };
            if let Some(event) = events_rx.recv().await {
                print_event(&event)?;
            }
        }
        Commands::Voices => {
            let profiles = studio.voices().all()?;
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        Commands::Files { action } => match action.unwrap_or(FilesAction::List) {
            FilesAction::List => {
                for file in studio.registry().list_files()? {
                    println!("{}\t{}\t{}", file.name, file.size_label, file.created);
                }
            }
            FilesAction::Rename { old_name, new_name } => {
                let path = studio.registry().rename_file(&old_name, &new_name)?;
                println!("{}", path.display());
            }
            FilesAction::Copy { name, destination } => {
                let path = studio.registry().copy_file(&name, &destination)?;
                println!("{}", path.display());
            }
            FilesAction::Delete { name } => {
                studio.registry().delete_file(&name)?;
            }
        },
    }

    Ok(())
}

/// Печатает события задачи до завершающего
async fn follow_job(events: &mut Receiver<PipelineEvent>, job_id: Uuid) -> anyhow::Result<()> {
    while let Some(event) = events.recv().await {
        print_event(&event)?;
        if event.job_id != job_id || !event.kind.is_terminal() {
            continue;
        }
        if let EventKind::Failed { message, .. } = event.kind {
            anyhow::bail!(message);
        }
        return Ok(());
    }
    anyhow::bail!("event channel closed before job {} finished", job_id)
}

fn print_event(event: &PipelineEvent) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
