use anyhow::Result;
use clap::Parser;
use lumi_core::{LumiConfig, UiChannels, UiReceivers};
use lumi_expression::{
    CellMeasure, CharacterPresenter, ClockOverlay, HeadlessClock, HeadlessSurface, MusicPlayer,
    PresenterConfig, SilentOutput, Size,
};
use lumi_limbic::{EmotionParams, EmotionState, HeartbeatConfig};
use lumi_memory::MemoryManager;
use lumi_reasoning::providers::{MockProvider, OpenAiCompatClient};
use lumi_reasoning::{CommandCapture, CompanionEngine, EngineSettings, LlmClient, LlmSummarizer};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

mod commands;
mod console;
mod logging;

use commands::{Command, MusicCommand};

const MOCK_REPLY: &str = "（离线模式）我在听呢。";
const SCREEN_WIDTH: u32 = 1920;
const WINDOW_SIZE: Size = Size {
    width: 400,
    height: 600,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lumi desktop companion", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "LUMI_CONFIG", default_value = "lumi.toml")]
    config: PathBuf,

    /// Answer with a canned reply instead of calling the API
    #[arg(long)]
    mock: bool,

    /// Disable idle screen analysis
    #[arg(long)]
    no_vision: bool,

    /// Write UI events to stdout as JSON lines instead of presenting them
    #[arg(long)]
    emit_events: bool,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,

    /// Also write daily log files into this directory
    #[arg(long, env = "LUMI_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

/// `./lumi.toml` first, then the user config dir.
fn resolve_config_path(requested: PathBuf) -> PathBuf {
    if requested.exists() || requested != PathBuf::from("lumi.toml") {
        return requested;
    }
    dirs::config_dir()
        .map(|dir| dir.join("lumi").join("lumi.toml"))
        .filter(|p| p.exists())
        .unwrap_or(requested)
}

fn banner_lines(config: &LumiConfig, mock: bool) -> Vec<String> {
    let mode = if config.settings.stream {
        "streaming"
    } else {
        "single reply"
    };
    let vision = if config.visual.enabled {
        "on"
    } else {
        "off"
    };
    vec![
        "Lumi starting".to_string(),
        format!(
            "Chat model: {}{}",
            config.api.model,
            if mock { " (mock)" } else { "" }
        ),
        format!("Emotion model: {}", config.emotion.emotion_model),
        format!("Memory model: {}", config.memory.memory_model),
        format!(
            "Vision model: {} ({}), analysis model: {}",
            config.visual.vision_model, vision, config.visual.analysis_model
        ),
        format!("Mode: {}", mode),
        format!(
            "Emotion decay: {}/tick, max intensity: {}, impact factor: {}",
            config.emotion.emotion_decay,
            config.emotion.max_intensity,
            config.emotion.emotion_impact_factor
        ),
        format!("Max memories: {}", config.memory.max_memories),
        format!("Language: {}", config.settings.language.display_name()),
        format!("Persona: {}", config.personality.ai_personality),
        format!("System prompt: {}", config.system_prompt()),
    ]
}

fn log_banner(config: &LumiConfig, mock: bool) {
    for line in banner_lines(config, mock) {
        tracing::info!("{}", line);
    }
}

fn run_music(player: &mut MusicPlayer<SilentOutput>, cmd: MusicCommand) {
    match cmd {
        MusicCommand::Toggle => player.toggle_play(),
        MusicCommand::Play => player.play(),
        MusicCommand::Pause => player.pause(),
        MusicCommand::Stop => player.stop(),
        MusicCommand::Next => player.next(),
        MusicCommand::Prev => player.prev(),
        MusicCommand::Volume(v) => player.set_volume(v),
        MusicCommand::Seek(p) => player.set_position(p),
        MusicCommand::List => {
            if player.playlist().is_empty() {
                println!("播放列表为空");
            }
            for (i, track) in player.playlist().iter().enumerate() {
                let marker = if player.current_track() == Some(track.as_path()) {
                    "▶"
                } else {
                    " "
                };
                println!("{} {:>2}. {}", marker, i + 1, track.display());
            }
            return;
        }
        MusicCommand::Reload => match player.load_music() {
            Ok(n) => println!("已加载 {} 首音乐", n),
            Err(e) => println!("加载音乐失败: {:#}", e),
        },
        MusicCommand::Status => {}
    }
    println!("{}", player.status_line());
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = logging::init(args.log_json, args.log_dir.as_deref())?;

    let mut config = LumiConfig::load_or_default(resolve_config_path(args.config));
    if args.no_vision {
        config.visual.enabled = false;
    }
    log_banner(&config, args.mock);

    let llm: Arc<dyn LlmClient> = if args.mock {
        Arc::new(MockProvider::new(MOCK_REPLY))
    } else {
        Arc::new(OpenAiCompatClient::from_config(&config.api)?)
    };

    let (ui, receivers) = UiChannels::new();
    let emotion = Arc::new(EmotionState::new(
        EmotionParams::from(&config.emotion),
        HeartbeatConfig::from_config(&config.emotion),
        ui.clone(),
    ));
    let summarizer = Arc::new(LlmSummarizer::new(
        llm.clone(),
        config.memory.memory_model.clone(),
    ));
    let memory = MemoryManager::load(&config.memory, summarizer).await;
    let settings = EngineSettings::from_config(&config);
    let ai_name = settings.ai_name.clone();
    let engine = CompanionEngine::new(llm, emotion, memory, ui, settings);

    let consumers: Vec<JoinHandle<()>> = if args.emit_events {
        vec![tokio::spawn(async move {
            console::forward_events(receivers, std::io::stdout()).await;
        })]
    } else {
        let presenter = CharacterPresenter::new(
            HeadlessSurface::new(SCREEN_WIDTH, WINDOW_SIZE),
            PresenterConfig::from_config(&config.ui),
            Box::new(CellMeasure::new(config.ui.bubble_font_size as f32)),
        );
        let clock = ClockOverlay::new(HeadlessClock::default(), &config.clock);
        let UiReceivers {
            emotion_rx,
            bubble_rx,
            clock_rx,
        } = receivers;
        vec![
            tokio::spawn(async move {
                presenter.run(emotion_rx, bubble_rx).await;
            }),
            tokio::spawn(async move {
                clock.run(clock_rx).await;
            }),
        ]
    };

    if config.visual.enabled {
        match CommandCapture::from_config(&config.visual) {
            Some(capture) => engine.start_visual_analysis(Arc::new(capture), config.visual.clone()),
            None => tracing::info!("No capture command configured, visual analysis disabled"),
        }
    }

    let mut player = MusicPlayer::new(&config.music, SilentOutput::new());
    match player.load_music() {
        Ok(n) => tracing::info!("Loaded {} music files", n),
        Err(e) => tracing::warn!("Failed to load music: {:#}", e),
    }

    // Conversation text moves to stderr when stdout carries events.
    let show_reply = !args.emit_events;

    if let Some(welcome) = engine.welcome_message().await {
        if show_reply {
            println!("{}: {}", ai_name, welcome);
        } else {
            eprintln!("{}: {}", ai_name, welcome);
        }
    }

    let mut input = console::Input::spawn("> ".to_string())?;
    let mut status: Option<JoinHandle<()>> = None;

    while let Some(line) = input.next_line().await {
        if let Some(task) = status.take() {
            task.abort();
        }

        let command = match commands::parse(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Exit => break,
            Command::Empty => {}
            Command::Time => engine.ui().show_clock(),
            Command::Status => println!("{}", engine.emotion().get_state().await.status_line()),
            Command::Music(cmd) => run_music(&mut player, cmd),
            Command::Chat(text) => {
                engine.process_user_input(&text).await;

                let result = if show_reply {
                    print!("{}: ", ai_name);
                    let _ = std::io::stdout().flush();
                    let result = engine
                        .respond(&text, |chunk| {
                            print!("{}", chunk);
                            let _ = std::io::stdout().flush();
                        })
                        .await;
                    println!();
                    result
                } else {
                    engine.respond(&text, |_| {}).await.inspect(|reply| {
                        eprintln!("{}: {}", ai_name, reply);
                    })
                };

                if let Err(e) = result {
                    tracing::error!("Reply failed: {:#}", e);
                    eprintln!("[错误] {:#}", e);
                }
                if show_reply {
                    status = console::spawn_status_line(engine.emotion().subscribe());
                }
            }
        }
    }

    if let Some(task) = status.take() {
        task.abort();
    }
    player.stop();
    engine.shutdown().await?;
    for task in consumers {
        task.abort();
    }
    tracing::info!("Bye");
    Ok(())
}
