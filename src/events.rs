use serde::{Deserialize, Serialize};

// Notification cues for the audio/feedback layer. Fire-and-forget: the
// engine pushes them into a buffer and never depends on whether anyone
// drains it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Success,
    Error,
    Tick,
    LevelUp,
    LifeUp,
    ShieldBreak,
    CipherShift,
    Reboot,
}

#[derive(Debug, Clone, Default)]
pub struct CueBuffer {
    pending: Vec<Cue>,
}

impl CueBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cue: Cue) {
        self.pending.push(cue);
    }

    /// Hand the pending cues to the host, clearing the buffer.
    pub fn drain(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.pending)
    }

    pub fn contains(&self, cue: Cue) -> bool {
        self.pending.contains(&cue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_buffer() {
        let mut b = CueBuffer::new();
        b.push(Cue::Success);
        b.push(Cue::LevelUp);
        assert!(b.contains(Cue::LevelUp));
        assert_eq!(b.drain(), vec![Cue::Success, Cue::LevelUp]);
        assert!(b.drain().is_empty());
    }
}
