use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────
// Resource model: lives plus a recoverable buffer. The buffer fills on
// correct answers; a full bar converts into a bonus life, and a half-full
// bar can absorb the mistake that would otherwise end the session.
// ─────────────────────────────────────────────────────────────────────────

pub const LIVES_START: u8 = 3;
pub const LIVES_MAX: u8 = 5;
pub const BUFFER_MAX: u8 = 100;
pub const BUFFER_STEP: u8 = 20;
pub const ABSORB_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub lives: u8,
    pub buffer: u8,
}

/// How a miss was absorbed or punished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissOutcome {
    pub absorbed: bool,
    pub reboot: bool,
}

impl ResourceState {
    pub fn new() -> Self {
        Self {
            lives: LIVES_START,
            buffer: 0,
        }
    }

    /// Credit one correct answer. Returns true when a full buffer converted
    /// into a bonus life.
    pub fn on_correct(&mut self) -> bool {
        self.buffer = self.buffer.saturating_add(BUFFER_STEP);
        if self.buffer < BUFFER_MAX {
            return false;
        }
        self.buffer = 0;
        if self.lives < LIVES_MAX {
            self.lives += 1;
            return true;
        }
        false
    }

    /// Charge one miss. On the last life a half-full buffer is consumed
    /// instead of the life; otherwise a life is lost and hitting zero
    /// signals a reboot. The caller performs `reset()` when rebooting.
    pub fn on_incorrect(&mut self) -> MissOutcome {
        if self.lives == 1 && self.buffer >= ABSORB_THRESHOLD {
            self.buffer = 0;
            return MissOutcome {
                absorbed: true,
                reboot: false,
            };
        }
        self.lives = self.lives.saturating_sub(1);
        self.buffer = 0;
        MissOutcome {
            absorbed: false,
            reboot: self.lives == 0,
        }
    }

    /// Post-reboot reset to session-start defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_fills_and_converts_to_life() {
        let mut r = ResourceState::new();
        for _ in 0..4 {
            assert!(!r.on_correct());
        }
        assert_eq!(r.buffer, 80);
        assert!(r.on_correct());
        assert_eq!(r.buffer, 0);
        assert_eq!(r.lives, 4);
    }

    #[test]
    fn full_buffer_at_max_lives_still_resets() {
        let mut r = ResourceState {
            lives: LIVES_MAX,
            buffer: 80,
        };
        assert!(!r.on_correct());
        assert_eq!(r.buffer, 0);
        assert_eq!(r.lives, LIVES_MAX);
    }

    #[test]
    fn absorb_law() {
        let mut r = ResourceState {
            lives: 1,
            buffer: 60,
        };
        let out = r.on_incorrect();
        assert!(out.absorbed);
        assert!(!out.reboot);
        assert_eq!(r.lives, 1);
        assert_eq!(r.buffer, 0);
    }

    #[test]
    fn reboot_law() {
        let mut r = ResourceState {
            lives: 1,
            buffer: 20,
        };
        let out = r.on_incorrect();
        assert!(!out.absorbed);
        assert!(out.reboot);
        assert_eq!(r.lives, 0);

        r.reset();
        assert_eq!(r.lives, LIVES_START);
        assert_eq!(r.buffer, 0);
    }

    #[test]
    fn ordinary_miss_costs_a_life_and_drains_buffer() {
        let mut r = ResourceState {
            lives: 3,
            buffer: 60,
        };
        let out = r.on_incorrect();
        assert!(!out.absorbed);
        assert!(!out.reboot);
        assert_eq!(r.lives, 2);
        assert_eq!(r.buffer, 0);
    }
}
