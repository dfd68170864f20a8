use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────
// Difficulty controller: a discrete complexity ladder stepped by recent
// outcomes, plus a continuous response window squeezed on every correct
// answer. The two axes are deliberately orthogonal.
// ─────────────────────────────────────────────────────────────────────────

pub const HISTORY_CAP: usize = 5;
pub const STREAK_MIN: usize = 3;

pub const START_WINDOW: Duration = Duration::from_millis(3000);
pub const MIN_WINDOW: Duration = Duration::from_millis(900);
pub const MAX_WINDOW: Duration = Duration::from_millis(5000);
pub const WINDOW_DECAY: f32 = 0.93;
pub const WINDOW_GROWTH: f32 = 1.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Baseline,
    SpeedUp,
    FluxIntro,
    JitterIntro,
    NoiseIntro,
    MaximumLoad,
}

impl ComplexityLevel {
    pub const ALL: [ComplexityLevel; 6] = [
        ComplexityLevel::Baseline,
        ComplexityLevel::SpeedUp,
        ComplexityLevel::FluxIntro,
        ComplexityLevel::JitterIntro,
        ComplexityLevel::NoiseIntro,
        ComplexityLevel::MaximumLoad,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ComplexityLevel::Baseline => "baseline",
            ComplexityLevel::SpeedUp => "speed_up",
            ComplexityLevel::FluxIntro => "flux_intro",
            ComplexityLevel::JitterIntro => "jitter_intro",
            ComplexityLevel::NoiseIntro => "noise_intro",
            ComplexityLevel::MaximumLoad => "maximum_load",
        }
    }

    pub fn step_up(self) -> Self {
        match self {
            ComplexityLevel::Baseline => ComplexityLevel::SpeedUp,
            ComplexityLevel::SpeedUp => ComplexityLevel::FluxIntro,
            ComplexityLevel::FluxIntro => ComplexityLevel::JitterIntro,
            ComplexityLevel::JitterIntro => ComplexityLevel::NoiseIntro,
            ComplexityLevel::NoiseIntro => ComplexityLevel::MaximumLoad,
            ComplexityLevel::MaximumLoad => ComplexityLevel::MaximumLoad,
        }
    }

    pub fn step_down(self) -> Self {
        match self {
            ComplexityLevel::Baseline => ComplexityLevel::Baseline,
            ComplexityLevel::SpeedUp => ComplexityLevel::Baseline,
            ComplexityLevel::FluxIntro => ComplexityLevel::SpeedUp,
            ComplexityLevel::JitterIntro => ComplexityLevel::FluxIntro,
            ComplexityLevel::NoiseIntro => ComplexityLevel::JitterIntro,
            ComplexityLevel::MaximumLoad => ComplexityLevel::NoiseIntro,
        }
    }

    pub fn unlocks_flux(self) -> bool {
        self >= ComplexityLevel::FluxIntro
    }

    pub fn unlocks_crossover(self) -> bool {
        self >= ComplexityLevel::JitterIntro
    }

    pub fn unlocks_lure(self) -> bool {
        self >= ComplexityLevel::NoiseIntro
    }
}

/// What `record_outcome` did to the ladder this trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelShift {
    None,
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Difficulty {
    pub level: ComplexityLevel,
    pub window: Duration,
    /// Outcomes since the last level change, newest last. Not a true rolling
    /// window: every level change clears it.
    pub history: Vec<bool>,
}

impl Difficulty {
    pub fn new(level: ComplexityLevel) -> Self {
        Self {
            level,
            window: START_WINDOW,
            history: Vec::with_capacity(HISTORY_CAP),
        }
    }

    /// Record one trial outcome. Adjusts the response window every trial and
    /// steps the level by at most one.
    pub fn record_outcome(&mut self, correct: bool) -> LevelShift {
        self.history.push(correct);
        if self.history.len() > HISTORY_CAP {
            self.history.remove(0);
        }

        self.window = if correct {
            self.window.mul_f32(WINDOW_DECAY).max(MIN_WINDOW)
        } else {
            self.window.mul_f32(WINDOW_GROWTH).min(MAX_WINDOW)
        };

        if !correct {
            if self.level > ComplexityLevel::Baseline {
                self.level = self.level.step_down();
                self.history.clear();
                return LevelShift::Down;
            }
            return LevelShift::None;
        }

        if self.level < ComplexityLevel::MaximumLoad
            && self.history.len() >= STREAK_MIN
            && self.history.iter().all(|&c| c)
        {
            self.level = self.level.step_up();
            self.history.clear();
            return LevelShift::Up;
        }

        LevelShift::None
    }

    /// Soft penalty on full session failure: one step down, window back to
    /// the session default.
    pub fn apply_reboot_penalty(&mut self) {
        self.level = self.level.step_down();
        self.window = START_WINDOW;
        self.history.clear();
    }
}
