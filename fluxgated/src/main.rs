//! Fluxgate Daemon - Background trial-engine service
//!
//! This daemon runs continuously in the background, managing:
//! - Trial/stream session state
//! - Frame-tick scheduling
//! - Profile persistence (resume level)
//! - IPC server for UI clients
//!
//! Storage locations:
//! - Linux: ~/.local/share/fluxgate/
//! - Windows: %APPDATA%\Fluxgate\
//! - MacOS: ~/Library/Application Support/Fluxgate/

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

use fluxgate::difficulty::ComplexityLevel;
use fluxgate::events::Cue;
use fluxgate::profile::ProfileStore;
use fluxgate::resources::ResourceState;
use fluxgate::rules::Side;
use fluxgate::stats::{GameResult, SessionStats};
use fluxgate::stream::StreamSession;
use fluxgate::trial::{TrialSession, DEFAULT_TRIAL_COUNT};

mod paths;

use paths::AppPaths;

/// Pending cues kept for clients that poll slowly.
const CUE_BACKLOG_CAP: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    Start { protocol: String },
    Stop,
    Input { side: String },
    SetFramerate { fps: u32 },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    State(StateSnapshot),
    Finished { result: GameResult },
    Success { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateSnapshot {
    running: bool,
    frame: u64,
    target_fps: u32,
    protocol: String,
    phase: String,
    level: String,
    window_ms: u32,
    round_elapsed_ms: u32,
    display: DisplayState,
    resources: Option<ResourceState>,
    hud: HudData,
    cues: Vec<Cue>,
    last_result: Option<GameResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct DisplayState {
    text: String,
    marker_color: String,
    anchor_state: Option<String>,
    flash: Option<String>,
    flash_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HudData {
    trials: u32,
    hits: u32,
    misses: u32,
    accuracy: f32,
    recent_rate: f32,
    avg_reaction_ms: i64,
}

fn hud_from(stats: &SessionStats) -> HudData {
    HudData {
        trials: stats.trials,
        hits: stats.hits,
        misses: stats.misses,
        accuracy: stats.accuracy(),
        recent_rate: stats.recent_rate(),
        avg_reaction_ms: stats
            .avg_reaction()
            .map(|d| d.as_millis() as i64)
            .unwrap_or(-1),
    }
}

fn parse_side(s: &str) -> Option<Side> {
    match s.trim().to_ascii_lowercase().as_str() {
        "left" => Some(Side::Left),
        "right" => Some(Side::Right),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

enum Engine {
    Idle,
    Trial(TrialSession),
    Stream(StreamSession),
}

struct DaemonState {
    engine: Engine,
    profile: ProfileStore,
    running: bool,
    frame: u64,
    target_fps: u32,
    seed_counter: u64,
    last_level: ComplexityLevel,
    last_result: Option<GameResult>,
    pending_cues: Vec<Cue>,
}

impl DaemonState {
    fn new(profile: ProfileStore) -> Self {
        let last_level = profile.load();
        Self {
            engine: Engine::Idle,
            profile,
            running: false,
            frame: 0,
            target_fps: 60,
            seed_counter: 0,
            last_level,
            last_result: None,
            pending_cues: Vec::new(),
        }
    }

    fn next_seed(&mut self) -> u64 {
        self.seed_counter = self.seed_counter.wrapping_add(1);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        nanos ^ self.seed_counter.wrapping_mul(0x9E3779B97F4A7C15)
    }

    fn start(&mut self, protocol: &str) -> Result<(), String> {
        let resume_level = self.profile.load();
        let seed = self.next_seed();
        let now = Instant::now();
        match protocol.trim().to_ascii_lowercase().as_str() {
            "trial" => {
                let mut session = TrialSession::new(seed, resume_level, DEFAULT_TRIAL_COUNT);
                session.start(now);
                self.engine = Engine::Trial(session);
            }
            "stream" => {
                let mut session = StreamSession::new(seed, resume_level);
                session.start(now);
                self.engine = Engine::Stream(session);
            }
            other => return Err(format!("Unknown protocol: {}", other)),
        }
        self.last_result = None;
        self.running = true;
        info!("Session started: protocol={} level={}", protocol, resume_level.label());
        Ok(())
    }

    fn stop(&mut self) -> Option<GameResult> {
        let result = match &mut self.engine {
            Engine::Idle => None,
            Engine::Trial(session) => session.stop(),
            Engine::Stream(session) => session.stop(),
        };
        self.engine = Engine::Idle;
        self.running = false;
        if let Some(r) = &result {
            info!("Session stopped: {}", r.details);
            self.last_result = Some(r.clone());
        }
        result
    }

    fn submit(&mut self, side: Side) -> bool {
        let now = Instant::now();
        let accepted = match &mut self.engine {
            Engine::Idle => false,
            Engine::Trial(session) => session.submit(side, now),
            Engine::Stream(session) => session.submit(side, now),
        };
        self.after_step();
        accepted
    }

    fn tick(&mut self) {
        if !self.running {
            return;
        }
        let now = Instant::now();
        match &mut self.engine {
            Engine::Idle => {}
            Engine::Trial(session) => session.tick(now),
            Engine::Stream(session) => session.tick(now),
        }
        self.after_step();
        if let Engine::Trial(session) = &mut self.engine {
            if let Some(result) = session.take_result() {
                info!("Session finished: {}", result.details);
                self.last_result = Some(result);
                self.engine = Engine::Idle;
                self.running = false;
            }
        }
        self.frame += 1;
    }

    /// Drain engine cues into the backlog and persist the level if the
    /// difficulty controller moved it.
    fn after_step(&mut self) {
        let (cues, level) = match &mut self.engine {
            Engine::Idle => (Vec::new(), self.last_level),
            Engine::Trial(session) => (session.cues.drain(), session.difficulty.level),
            Engine::Stream(session) => (session.cues.drain(), session.difficulty.level),
        };
        for cue in &cues {
            info!("Cue: {:?}", cue);
        }
        self.pending_cues.extend(cues);
        if self.pending_cues.len() > CUE_BACKLOG_CAP {
            let excess = self.pending_cues.len() - CUE_BACKLOG_CAP;
            self.pending_cues.drain(..excess);
        }

        if level != self.last_level {
            info!("Level changed: {} -> {}", self.last_level.label(), level.label());
            self.last_level = level;
            if let Err(e) = self.profile.save(level) {
                warn!("Failed to persist level: {}", e);
            }
        }
    }

    fn get_snapshot(&mut self) -> StateSnapshot {
        let now = Instant::now();
        let cues = std::mem::take(&mut self.pending_cues);
        match &self.engine {
            Engine::Idle => StateSnapshot {
                running: self.running,
                frame: self.frame,
                target_fps: self.target_fps,
                protocol: "idle".to_string(),
                phase: "idle".to_string(),
                level: self.last_level.label().to_string(),
                window_ms: 0,
                round_elapsed_ms: 0,
                display: DisplayState::default(),
                resources: None,
                hud: HudData::default(),
                cues,
                last_result: self.last_result.clone(),
            },
            Engine::Trial(session) => {
                let display = match &session.spec {
                    Some(spec) => DisplayState {
                        text: spec.display_text.clone(),
                        marker_color: spec.marker.color().to_string(),
                        anchor_state: None,
                        flash: None,
                        flash_visible: false,
                    },
                    None => DisplayState::default(),
                };
                StateSnapshot {
                    running: self.running,
                    frame: self.frame,
                    target_fps: self.target_fps,
                    protocol: "trial".to_string(),
                    phase: session.phase.label().to_string(),
                    level: session.difficulty.level.label().to_string(),
                    window_ms: session.window_ms(),
                    round_elapsed_ms: session.round_elapsed_ms(now),
                    display,
                    resources: None,
                    hud: hud_from(&session.stats),
                    cues,
                    last_result: self.last_result.clone(),
                }
            }
            Engine::Stream(session) => StateSnapshot {
                running: self.running,
                frame: self.frame,
                target_fps: self.target_fps,
                protocol: "stream".to_string(),
                phase: session.phase.label().to_string(),
                level: session.difficulty.level.label().to_string(),
                window_ms: session.window_ms(),
                round_elapsed_ms: session.round_elapsed_ms(now),
                display: DisplayState {
                    text: session.mapping.shape_for(session.modifier).label().to_string(),
                    marker_color: String::new(),
                    anchor_state: Some(session.state.label().to_string()),
                    flash: Some(session.flash.label().to_string()),
                    flash_visible: session.flash_visible(now),
                },
                resources: Some(session.resources),
                hud: hud_from(&session.stats),
                cues,
                last_result: self.last_result.clone(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let resp = Response::Error {
                    message: format!("Invalid request: {}", e),
                };
                writer
                    .write_all(serde_json::to_string(&resp)?.as_bytes())
                    .await?;
                writer.write_all(b"\n").await?;
                continue;
            }
        };

        let response = match request {
            Request::GetState => {
                let mut s = state.write().await;
                Response::State(s.get_snapshot())
            }
            Request::Start { protocol } => {
                let mut s = state.write().await;
                match s.start(&protocol) {
                    Ok(()) => Response::Success {
                        message: format!("Started {} protocol", protocol),
                    },
                    Err(message) => Response::Error { message },
                }
            }
            Request::Stop => {
                let mut s = state.write().await;
                match s.stop() {
                    Some(result) => Response::Finished { result },
                    None => Response::Success {
                        message: "Stopped".to_string(),
                    },
                }
            }
            Request::Input { side } => {
                let mut s = state.write().await;
                match parse_side(&side) {
                    Some(side) => {
                        let accepted = s.submit(side);
                        Response::Success {
                            message: if accepted {
                                "Input accepted".to_string()
                            } else {
                                "Input ignored".to_string()
                            },
                        }
                    }
                    None => Response::Error {
                        message: format!("Unknown side: {}", side),
                    },
                }
            }
            Request::SetFramerate { fps } => {
                let mut s = state.write().await;
                let clamped = fps.clamp(1, 1000);
                s.target_fps = clamped;
                info!("Framerate set to {} FPS", clamped);
                Response::Success {
                    message: format!("Framerate set to {} FPS", clamped),
                }
            }
            Request::Shutdown => {
                let mut s = state.write().await;
                let level = s.last_level;
                match s.profile.save(level) {
                    Ok(()) => {
                        info!("Shutdown requested; profile saved");
                        tokio::spawn(async {
                            // Give the response a moment to flush before exiting.
                            time::sleep(Duration::from_millis(50)).await;
                            std::process::exit(0);
                        });
                        Response::Success {
                            message: "Shutting down".to_string(),
                        }
                    }
                    Err(e) => Response::Error {
                        message: format!("Save failed, aborting shutdown: {}", e),
                    },
                }
            }
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Setup application paths
    let paths = AppPaths::new()?;
    info!("Data directory: {:?}", paths.data_dir());
    info!("Profile file: {:?}", paths.profile_file());

    let profile = ProfileStore::at(paths.profile_file());
    info!("Resume level: {}", profile.load().label());

    // Initialize daemon state
    let state = Arc::new(RwLock::new(DaemonState::new(profile)));

    // Save on Ctrl-C so the resume level persists even if the daemon is
    // stopped abruptly.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let mut s = state.write().await;
                let level = s.last_level;
                if let Err(e) = s.profile.save(level) {
                    error!("Ctrl-C save failed: {}", e);
                } else {
                    info!("Ctrl-C: profile saved");
                }
                std::process::exit(0);
            }
        });
    }

    // Start IPC server
    let listener = TcpListener::bind("127.0.0.1:9877").await?;
    info!("Fluxgate daemon listening on 127.0.0.1:9877");

    // Frame-tick task
    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            // Read target FPS live so a mid-session change takes effect on
            // the very next frame.
            let target_fps = {
                let s = state_clone.read().await;
                s.target_fps
            };
            let frame_millis = (1000 / target_fps).max(1) as u64;

            tokio::time::sleep(tokio::time::Duration::from_millis(frame_millis)).await;

            let mut s = state_clone.write().await;
            s.tick();
        }
    });

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
