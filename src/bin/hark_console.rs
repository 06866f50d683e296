//! Terminal front end for hark.
//!
//! Type a line to say the wake phrase and a command. Typing while an answer
//! is playing barges in. Ctrl+C or end of input shuts down.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hark::collaborators::{AudioSink, SearchClient};
use hark::console::{
    ConsoleInput, ConsoleRecorder, ConsoleSynthesizer, ConsoleTranscriber, ConsoleWake,
};
use hark::llm::OpenAiClient;
use hark::pipeline::capture::CaptureCollaborators;
use hark::pipeline::response::ResponseCollaborators;
use hark::retrieval::LexicalStore;
use hark::search::WebSearch;
use hark::{HarkConfig, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Hark: barge-in voice assistant, driven from the terminal.
#[derive(Parser)]
#[command(name = "hark-console", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "HARK_CONFIG")]
    config: Option<PathBuf>,

    /// Never fall back to web search.
    #[arg(long)]
    no_search: bool,

    /// Write each command and response as WAV into this directory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the assistant (default).
    Chat,
    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// List audio output devices.
    #[cfg(feature = "speaker")]
    Devices,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(HarkConfig::default_config_path);

    match cli.command {
        Some(Command::InitConfig { force }) => init_config(&path, force),
        #[cfg(feature = "speaker")]
        Some(Command::Devices) => {
            for name in hark::audio::CpalSink::list_output_devices()? {
                println!("  - {name}");
            }
            Ok(())
        }
        Some(Command::Chat) | None => {
            let mut config = if path.exists() {
                HarkConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?
            } else {
                HarkConfig::default()
            };
            if cli.no_search {
                config.response.enable_websearch = false;
            }
            if let Some(dir) = cli.dump_dir {
                config.audio.dump_dir = Some(dir);
            }
            config.validate()?;
            let _log_guard = hark::logging::init_tracing(&config.logging)?;
            run_chat(config)
        }
    }
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    HarkConfig::default().save_to_file(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn run_chat(config: HarkConfig) -> anyhow::Result<()> {
    println!("Hark v{}", env!("CARGO_PKG_VERSION"));

    let status = hark::status::from_config(&config.status)?;
    let input = ConsoleInput::new();

    let search: Option<Box<dyn SearchClient>> = if config.response.enable_websearch {
        Some(Box::new(WebSearch::new(&config.search)?))
    } else {
        None
    };
    let rate = config.audio.output_sample_rate;
    let capture = CaptureCollaborators {
        wake: Box::new(ConsoleWake::new(Arc::clone(&input))),
        recorder: Box::new(ConsoleRecorder::new(Arc::clone(&input))),
        transcriber: Box::new(ConsoleTranscriber::new(Arc::clone(&input))),
    };
    let response = ResponseCollaborators {
        retrieval: Box::new(LexicalStore::new()),
        search,
        llm: Box::new(OpenAiClient::new(&config.llm)?),
        synthesizer: Box::new(ConsoleSynthesizer::new("hark", rate)),
        notifier: Box::new(ConsoleSynthesizer::new("hark (searching)", rate)),
        sink: output_sink(&config)?,
        listener: Box::new(ConsoleWake::new(Arc::clone(&input))),
    };

    let wake_phrase = config.conversation.wake_phrase.clone();
    let mut orchestrator = Orchestrator::new(config, status);
    let cancel = orchestrator.cancel_token();
    spawn_ctrl_c(cancel.clone())?;

    orchestrator.start(capture, response)?;
    let eof_cancel = cancel.clone();
    input.spawn_stdin(move || {
        info!("input closed, shutting down");
        eof_cancel.cancel();
    })?;

    println!(
        "\nType a line to say \"{wake_phrase}\" and a command. Press Ctrl+C to quit.\n"
    );
    orchestrator.wait()?;
    Ok(())
}

#[cfg(feature = "speaker")]
fn output_sink(config: &HarkConfig) -> anyhow::Result<Box<dyn AudioSink>> {
    Ok(Box::new(hark::audio::CpalSink::open(&config.audio)?))
}

#[cfg(not(feature = "speaker"))]
fn output_sink(config: &HarkConfig) -> anyhow::Result<Box<dyn AudioSink>> {
    Ok(Box::new(hark::audio::PacedSink::new(config.audio.output_sample_rate)))
}

/// Cancel `token` on Ctrl+C. The signal listener gets its own small runtime.
fn spawn_ctrl_c(token: CancellationToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("hark-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => match signal {
                        Ok(()) => {
                            info!("received Ctrl+C, shutting down...");
                            token.cancel();
                        }
                        Err(e) => warn!("cannot listen for Ctrl+C: {e}"),
                    },
                    () = token.cancelled() => {}
                }
            });
        })?;
    Ok(())
}
