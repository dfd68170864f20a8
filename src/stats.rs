use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    Trial,
    Stream,
}

impl ProtocolMode {
    pub fn label(self) -> &'static str {
        match self {
            ProtocolMode::Trial => "trial",
            ProtocolMode::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub hits: u32,
    pub misses: u32,
    pub trials: u32,
    pub recent: Vec<bool>,
    /// Reaction times of HIT trials only; timeouts and misses contribute
    /// nothing here.
    pub hit_reaction: Vec<Duration>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            trials: 0,
            recent: Vec::with_capacity(200),
            hit_reaction: Vec::new(),
        }
    }

    pub fn record_hit(&mut self, reaction: Duration) {
        self.hits += 1;
        self.hit_reaction.push(reaction);
        self.push_recent(true);
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.push_recent(false);
    }

    fn push_recent(&mut self, hit: bool) {
        self.recent.push(hit);
        if self.recent.len() > 200 {
            self.recent.remove(0);
        }
        self.trials += 1;
    }

    pub fn accuracy(&self) -> f32 {
        if self.trials == 0 {
            0.0
        } else {
            self.hits as f32 / self.trials as f32
        }
    }

    pub fn recent_rate(&self) -> f32 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let good = self.recent.iter().filter(|&&b| b).count();
        good as f32 / self.recent.len() as f32
    }

    pub fn avg_reaction(&self) -> Option<Duration> {
        if self.hit_reaction.is_empty() {
            return None;
        }
        let total: Duration = self.hit_reaction.iter().sum();
        Some(total / self.hit_reaction.len() as u32)
    }

    /// Assemble the terminal result for the session so far.
    pub fn result(&self, mode: ProtocolMode) -> GameResult {
        GameResult {
            mode,
            score: self.hits,
            avg_reaction_time: self.avg_reaction(),
            details: format!(
                "Accuracy: {:.0}% ({}/{})",
                self.accuracy() * 100.0,
                self.hits,
                self.trials
            ),
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The one value that crosses the boundary to the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub mode: ProtocolMode,
    pub score: u32,
    pub avg_reaction_time: Option<Duration>,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_details_match_accuracy() {
        let mut s = SessionStats::new();
        for _ in 0..7 {
            s.record_hit(Duration::from_millis(500));
        }
        for _ in 0..3 {
            s.record_miss();
        }
        let r = s.result(ProtocolMode::Trial);
        assert_eq!(r.score, 7);
        assert_eq!(r.details, "Accuracy: 70% (7/10)");
        assert_eq!(r.avg_reaction_time, Some(Duration::from_millis(500)));
    }

    #[test]
    fn avg_reaction_covers_hits_only() {
        let mut s = SessionStats::new();
        s.record_hit(Duration::from_millis(400));
        s.record_hit(Duration::from_millis(600));
        s.record_miss();
        assert_eq!(s.avg_reaction(), Some(Duration::from_millis(500)));

        let empty = SessionStats::new();
        assert_eq!(empty.avg_reaction(), None);
    }

    #[test]
    fn recent_is_bounded() {
        let mut s = SessionStats::new();
        for _ in 0..250 {
            s.record_hit(Duration::from_millis(1));
        }
        assert_eq!(s.recent.len(), 200);
        assert_eq!(s.trials, 250);
    }
}
