use std::time::{Duration, Instant};

use crate::difficulty::{ComplexityLevel, Difficulty, LevelShift};
use crate::events::{Cue, CueBuffer};
use crate::prng::Prng;
use crate::resources::ResourceState;
use crate::rules::{
    self, ChaosFlags, ChaosPolicy, ModifierKind, ReferenceState, RuleMapping, SessionCipher, Side,
};
use crate::stats::{GameResult, ProtocolMode, SessionStats};
use crate::trial::Phase;

// ─────────────────────────────────────────────────────────────────────────
// Continuous-protocol state machine. Each round shows the current modifier
// symbol and a brief target flash; the participant tracks the RED/BLUE
// anchor state across rounds. The flash is a distractor, never an input
// gate — input stays open for the whole round window.
// ─────────────────────────────────────────────────────────────────────────

pub const READY_DELAY: Duration = Duration::from_millis(2400);
pub const TARGET_REVEAL: Duration = Duration::from_millis(350);
pub const FLASH_VISIBLE: Duration = Duration::from_millis(450);
pub const FEEDBACK_DELAY: Duration = Duration::from_millis(350);
pub const REBOOT_DELAY: Duration = Duration::from_millis(4000);

/// Correct answers in a row before the session cipher is regenerated.
pub const CIPHER_SHIFT_STREAK: u32 = 8;

#[derive(Debug)]
pub struct StreamSession {
    pub phase: Phase,
    pub cipher: SessionCipher,
    pub mapping: RuleMapping,
    pub difficulty: Difficulty,
    pub resources: ResourceState,
    pub stats: SessionStats,
    pub cues: CueBuffer,
    pub policy: ChaosPolicy,
    pub chaos: ChaosFlags,
    /// The tracked anchor state; advances every round by the post-flux
    /// modifier, hit or miss.
    pub state: ReferenceState,
    /// This round's raw modifier symbol (rendered via `mapping`).
    pub modifier: ModifierKind,
    /// What the target flash shows. Under an active lure it may lie; it
    /// never participates in evaluation.
    pub flash: ReferenceState,
    pub response_made: bool,
    pub last_correct: Option<bool>,
    pub streak: u32,

    active: bool,
    round_started_at: Option<Instant>,
    phase_deadline: Option<Instant>,
    prng: Prng,
}

impl StreamSession {
    pub fn new(seed: u64, start_level: ComplexityLevel) -> Self {
        let mut prng = Prng::new(seed);
        let cipher = SessionCipher::random(&mut prng);
        let mapping = RuleMapping::random(&mut prng);
        let state = ReferenceState::random(&mut prng);
        Self {
            phase: Phase::Idle,
            cipher,
            mapping,
            difficulty: Difficulty::new(start_level),
            resources: ResourceState::new(),
            stats: SessionStats::new(),
            cues: CueBuffer::new(),
            policy: ChaosPolicy::default(),
            chaos: ChaosFlags::default(),
            state,
            modifier: ModifierKind::Keep,
            flash: state,
            response_made: false,
            last_correct: None,
            streak: 0,
            active: false,
            round_started_at: None,
            phase_deadline: None,
            prng,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reveal cipher and rule mapping, then enter the round loop.
    pub fn start(&mut self, now: Instant) {
        if self.phase != Phase::Idle {
            return;
        }
        self.active = true;
        self.phase = Phase::Ready;
        self.phase_deadline = Some(now + READY_DELAY);
    }

    pub fn tick(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        match self.phase {
            Phase::Ready => {
                if self.deadline_passed(now) {
                    self.begin_round(now);
                }
            }
            Phase::Cue => {
                if self.round_timed_out(now) {
                    self.resolve(None, Duration::ZERO, now);
                } else if let Some(started) = self.round_started_at {
                    if now.duration_since(started) >= TARGET_REVEAL {
                        self.phase = Phase::Active;
                    }
                }
            }
            Phase::Active => {
                if self.round_timed_out(now) {
                    self.resolve(None, Duration::ZERO, now);
                }
            }
            Phase::Feedback => {
                if self.deadline_passed(now) {
                    self.begin_round(now);
                }
            }
            Phase::Reboot => {
                // Input and countdown stay frozen until the recovery delay
                // elapses; resources and the level penalty were applied on
                // entry.
                if self.deadline_passed(now) {
                    self.begin_round(now);
                }
            }
            _ => {}
        }
    }

    /// Feed one raw input. Accepted for the full round duration regardless
    /// of flash visibility; anything else is silently ignored.
    pub fn submit(&mut self, raw: Side, now: Instant) -> bool {
        if !self.active || self.response_made {
            return false;
        }
        if !matches!(self.phase, Phase::Cue | Phase::Active) {
            return false;
        }
        let Some(started) = self.round_started_at else {
            return false;
        };
        // Guard first, same as the discrete protocol.
        self.response_made = true;
        let side = if self.chaos.input_inverted {
            raw.flip()
        } else {
            raw
        };
        let claimed = ReferenceState::for_side(side);
        self.resolve(Some(claimed), now.duration_since(started), now);
        true
    }

    /// Manual exit: deactivate and drop all deadlines in one synchronous
    /// step, reporting the run so far. Yields the result exactly once; a
    /// second stop is a no-op.
    pub fn stop(&mut self) -> Option<GameResult> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.phase = Phase::Idle;
        self.phase_deadline = None;
        self.round_started_at = None;
        Some(self.stats.result(ProtocolMode::Stream))
    }

    /// Whether the target flash is currently on screen (display hint only).
    pub fn flash_visible(&self, now: Instant) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        match self.round_started_at {
            Some(started) => now.duration_since(started) < TARGET_REVEAL + FLASH_VISIBLE,
            None => false,
        }
    }

    pub fn round_elapsed_ms(&self, now: Instant) -> u32 {
        match self.round_started_at {
            Some(started) => now
                .duration_since(started)
                .as_millis()
                .min(u32::MAX as u128) as u32,
            None => 0,
        }
    }

    pub fn window_ms(&self) -> u32 {
        self.difficulty.window.as_millis().min(u32::MAX as u128) as u32
    }

    fn deadline_passed(&self, now: Instant) -> bool {
        self.phase_deadline.is_some_and(|d| now >= d)
    }

    fn round_timed_out(&self, now: Instant) -> bool {
        // Live window read, so a mid-round speed change moves the deadline.
        self.round_started_at
            .is_some_and(|started| now.duration_since(started) >= self.difficulty.window)
    }

    fn begin_round(&mut self, now: Instant) {
        self.response_made = false;
        self.last_correct = None;
        self.modifier = ModifierKind::random(&mut self.prng);
        self.chaos = ChaosFlags::sample(self.difficulty.level, &self.policy, &mut self.prng);
        self.flash = if self.chaos.lure_active && self.prng.coin() {
            self.state.flip()
        } else {
            self.state
        };
        self.phase = Phase::Cue;
        self.round_started_at = Some(now);
        self.phase_deadline = None;
        self.cues.push(Cue::Tick);
    }

    /// Score this round. The expected state is resolved once with the
    /// post-flux modifier and reused as the next round's anchor, so
    /// evaluation and advance can never disagree.
    fn resolve(&mut self, input: Option<ReferenceState>, reaction: Duration, now: Instant) {
        self.response_made = true;
        let expected = rules::resolve_modifier(self.state, self.modifier, self.chaos.flux_active);
        let was_correct = input == Some(expected);
        self.last_correct = Some(was_correct);
        self.state = expected;

        if was_correct {
            self.stats.record_hit(reaction);
            self.cues.push(Cue::Success);
            if self.resources.on_correct() {
                self.cues.push(Cue::LifeUp);
            }
            self.streak += 1;
            if self.streak >= CIPHER_SHIFT_STREAK {
                self.cipher = SessionCipher::random(&mut self.prng);
                self.cues.push(Cue::CipherShift);
                self.streak = 0;
            }
            if self.difficulty.record_outcome(true) == LevelShift::Up {
                self.cues.push(Cue::LevelUp);
            }
        } else {
            self.stats.record_miss();
            self.cues.push(Cue::Error);
            self.streak = 0;
            let miss = self.resources.on_incorrect();
            if miss.absorbed {
                self.cues.push(Cue::ShieldBreak);
            }
            if miss.reboot {
                self.enter_reboot(now);
                return;
            }
            self.difficulty.record_outcome(false);
        }

        self.phase = Phase::Feedback;
        self.phase_deadline = Some(now + FEEDBACK_DELAY);
        self.round_started_at = None;
    }

    /// Full session failure: freeze the loop for the recovery delay while
    /// the cipher and rule mapping are re-shown, with resources reset and
    /// the level penalty applied up front. The miss that caused this does
    /// not additionally step the ladder — the penalty is exactly one step.
    fn enter_reboot(&mut self, now: Instant) {
        self.resources.reset();
        self.difficulty.apply_reboot_penalty();
        self.cues.push(Cue::Reboot);
        self.phase = Phase::Reboot;
        self.phase_deadline = Some(now + REBOOT_DELAY);
        self.round_started_at = None;
    }
}
