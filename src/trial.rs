use std::time::{Duration, Instant};

use crate::difficulty::{ComplexityLevel, Difficulty, LevelShift};
use crate::events::{Cue, CueBuffer};
use crate::prng::Prng;
use crate::rules::{self, ChaosFlags, ChaosPolicy, RuleMapping, SessionCipher, Side, TrialSpec};
use crate::stats::{GameResult, ProtocolMode, SessionStats};

// ─────────────────────────────────────────────────────────────────────────
// Discrete-protocol state machine. The host polls `tick(now)` every display
// frame; input arrives through `submit(raw, now)` at arbitrary moments.
// All phase deadlines are recomputed against the *live* difficulty window,
// so a mid-round speed change takes effect on the next frame.
// ─────────────────────────────────────────────────────────────────────────

pub const READY_DELAY: Duration = Duration::from_millis(2400);
pub const FIXATION_DELAY: Duration = Duration::from_millis(600);
pub const FEEDBACK_DELAY: Duration = Duration::from_millis(700);
pub const DEFAULT_TRIAL_COUNT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ready,
    Fixation,
    Cue,
    Active,
    Feedback,
    Reboot,
    Terminal,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Ready => "ready",
            Phase::Fixation => "fixation",
            Phase::Cue => "cue",
            Phase::Active => "active",
            Phase::Feedback => "feedback",
            Phase::Reboot => "reboot",
            Phase::Terminal => "terminal",
        }
    }
}

#[derive(Debug)]
pub struct TrialSession {
    pub phase: Phase,
    pub cipher: SessionCipher,
    pub mapping: RuleMapping,
    pub difficulty: Difficulty,
    pub stats: SessionStats,
    pub cues: CueBuffer,
    pub policy: ChaosPolicy,
    pub chaos: ChaosFlags,
    pub spec: Option<TrialSpec>,
    pub trial_index: u32,
    pub trial_count: u32,
    pub response_made: bool,
    pub last_input: Option<Side>,
    pub last_correct: Option<bool>,

    active: bool,
    phase_deadline: Option<Instant>,
    cue_shown_at: Option<Instant>,
    result: Option<GameResult>,
    prng: Prng,
}

impl TrialSession {
    pub fn new(seed: u64, start_level: ComplexityLevel, trial_count: u32) -> Self {
        let mut prng = Prng::new(seed);
        let cipher = SessionCipher::random(&mut prng);
        let mapping = RuleMapping::random(&mut prng);
        Self {
            phase: Phase::Idle,
            cipher,
            mapping,
            difficulty: Difficulty::new(start_level),
            stats: SessionStats::new(),
            cues: CueBuffer::new(),
            policy: ChaosPolicy::default(),
            chaos: ChaosFlags::default(),
            spec: None,
            trial_index: 0,
            trial_count: trial_count.max(1),
            response_made: false,
            last_input: None,
            last_correct: None,
            active: false,
            phase_deadline: None,
            cue_shown_at: None,
            result: None,
            prng,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begin the session: reveal cipher and rule mapping for the orientation
    /// delay, then auto-advance into the trial cycle. Only valid from Idle.
    pub fn start(&mut self, now: Instant) {
        if self.phase != Phase::Idle {
            return;
        }
        self.active = true;
        self.phase = Phase::Ready;
        self.phase_deadline = Some(now + READY_DELAY);
    }

    /// Advance phase deadlines. Safe to call at any cadence; a poll landing
    /// after `stop()` is a no-op.
    pub fn tick(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        match self.phase {
            Phase::Ready | Phase::Fixation | Phase::Feedback => {
                if self.deadline_passed(now) {
                    match self.phase {
                        Phase::Ready => self.begin_trial(now),
                        Phase::Fixation => self.enter_cue(now),
                        _ => self.next_trial(now),
                    }
                }
            }
            Phase::Cue => {
                // Live window read: the deadline moves if the controller
                // changed the window mid-round.
                if let Some(shown) = self.cue_shown_at {
                    if now.duration_since(shown) >= self.difficulty.window {
                        self.resolve(None, Duration::ZERO, now);
                    }
                }
            }
            _ => {}
        }
    }

    /// Feed one raw input. The device position resolves to a logical side
    /// through this trial's crossover flag at the moment of input. Returns
    /// whether the input was honored; anything outside the acceptance
    /// window is silently ignored.
    pub fn submit(&mut self, raw: Side, now: Instant) -> bool {
        if !self.active || self.phase != Phase::Cue || self.response_made {
            return false;
        }
        let Some(shown) = self.cue_shown_at else {
            return false;
        };
        // Guard first: everything after this point runs at most once per
        // trial, even against a timeout racing in behind us.
        self.response_made = true;
        let side = if self.chaos.input_inverted {
            raw.flip()
        } else {
            raw
        };
        self.resolve(Some(side), now.duration_since(shown), now);
        true
    }

    /// Manual exit: deactivate and drop every pending deadline in the same
    /// synchronous step, then report the run so far.
    pub fn stop(&mut self) -> Option<GameResult> {
        if self.result.is_none() && self.stats.trials > 0 {
            self.result = Some(self.stats.result(ProtocolMode::Trial));
        }
        self.active = false;
        self.phase = Phase::Idle;
        self.phase_deadline = None;
        self.cue_shown_at = None;
        self.result.take()
    }

    /// The terminal result, yielded exactly once.
    pub fn take_result(&mut self) -> Option<GameResult> {
        self.result.take()
    }

    /// Milliseconds since the cue appeared (for the countdown bar).
    pub fn round_elapsed_ms(&self, now: Instant) -> u32 {
        match self.cue_shown_at {
            Some(shown) => now.duration_since(shown).as_millis().min(u32::MAX as u128) as u32,
            None => 0,
        }
    }

    pub fn window_ms(&self) -> u32 {
        self.difficulty.window.as_millis().min(u32::MAX as u128) as u32
    }

    fn deadline_passed(&self, now: Instant) -> bool {
        self.phase_deadline.is_some_and(|d| now >= d)
    }

    fn begin_trial(&mut self, now: Instant) {
        self.response_made = false;
        self.last_input = None;
        self.last_correct = None;
        self.chaos = ChaosFlags::sample(self.difficulty.level, &self.policy, &mut self.prng);
        self.spec = Some(rules::generate(
            self.difficulty.level,
            &self.cipher,
            &mut self.prng,
        ));
        self.phase = Phase::Fixation;
        self.phase_deadline = Some(now + FIXATION_DELAY);
        self.cue_shown_at = None;
    }

    fn enter_cue(&mut self, now: Instant) {
        self.phase = Phase::Cue;
        self.phase_deadline = None;
        self.cue_shown_at = Some(now);
        self.cues.push(Cue::Tick);
    }

    /// Score this trial. `input` is None on timeout; the correct side stays
    /// computed so feedback can show the right answer.
    fn resolve(&mut self, input: Option<Side>, reaction: Duration, now: Instant) {
        self.response_made = true;
        let Some(spec) = self.spec.as_ref() else {
            return;
        };
        let was_correct = input == Some(spec.correct_side);
        self.last_input = input;
        self.last_correct = Some(was_correct);

        if was_correct {
            self.stats.record_hit(reaction);
            self.cues.push(Cue::Success);
        } else {
            self.stats.record_miss();
            self.cues.push(Cue::Error);
        }

        if self.difficulty.record_outcome(was_correct) == LevelShift::Up {
            self.cues.push(Cue::LevelUp);
        }

        self.phase = Phase::Feedback;
        self.phase_deadline = Some(now + FEEDBACK_DELAY);
        self.cue_shown_at = None;
    }

    fn next_trial(&mut self, now: Instant) {
        self.trial_index += 1;
        if self.trial_index >= self.trial_count {
            self.finish();
        } else {
            self.begin_trial(now);
        }
    }

    fn finish(&mut self) {
        self.phase = Phase::Terminal;
        self.active = false;
        self.phase_deadline = None;
        self.cue_shown_at = None;
        self.result = Some(self.stats.result(ProtocolMode::Trial));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Marker, SemanticClass};

    fn drive_to_cue(s: &mut TrialSession, t: &mut Instant) {
        while s.phase != Phase::Cue {
            *t += Duration::from_millis(50);
            s.tick(*t);
            assert!(s.is_active(), "session ended before cue");
        }
    }

    fn finish_feedback(s: &mut TrialSession, t: &mut Instant) {
        while s.phase == Phase::Feedback {
            *t += Duration::from_millis(50);
            s.tick(*t);
        }
    }

    #[test]
    fn ready_orientation_precedes_first_trial() {
        let mut s = TrialSession::new(1, ComplexityLevel::Baseline, 10);
        let t0 = Instant::now();
        s.start(t0);
        assert_eq!(s.phase, Phase::Ready);
        s.tick(t0 + Duration::from_millis(100));
        assert_eq!(s.phase, Phase::Ready);
        s.tick(t0 + READY_DELAY);
        assert_eq!(s.phase, Phase::Fixation);
        assert!(s.spec.is_some());
    }

    #[test]
    fn input_during_fixation_is_ignored() {
        let mut s = TrialSession::new(2, ComplexityLevel::Baseline, 10);
        let t0 = Instant::now();
        s.start(t0);
        s.tick(t0 + READY_DELAY);
        assert_eq!(s.phase, Phase::Fixation);
        assert!(!s.submit(Side::Left, t0 + READY_DELAY + Duration::from_millis(10)));
        assert_eq!(s.stats.trials, 0);
    }

    #[test]
    fn timeout_counts_as_miss_with_correct_side_preserved() {
        let mut s = TrialSession::new(3, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);
        drive_to_cue(&mut s, &mut t);
        let correct = s.spec.as_ref().unwrap().correct_side;
        t += s.difficulty.window;
        s.tick(t);
        assert_eq!(s.phase, Phase::Feedback);
        assert_eq!(s.last_correct, Some(false));
        assert_eq!(s.last_input, None);
        assert_eq!(s.spec.as_ref().unwrap().correct_side, correct);
        assert_eq!(s.stats.misses, 1);
    }

    #[test]
    fn late_input_idempotence() {
        let mut s = TrialSession::new(4, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);
        drive_to_cue(&mut s, &mut t);
        let correct = s.spec.as_ref().unwrap().correct_side;

        t += Duration::from_millis(300);
        assert!(s.submit(correct, t));
        let (hits, trials) = (s.stats.hits, s.stats.trials);

        // A second input and a timeout poll racing in behind the accepted
        // input must both be no-ops.
        assert!(!s.submit(correct.flip(), t + Duration::from_millis(1)));
        s.tick(t + Duration::from_secs(30));
        finish_feedback(&mut s, &mut t);
        assert_eq!(s.stats.hits, hits);
        assert_eq!(s.stats.trials, trials);
    }

    #[test]
    fn stop_cancels_everything_in_one_step() {
        let mut s = TrialSession::new(5, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);
        drive_to_cue(&mut s, &mut t);
        s.submit(s.spec.as_ref().unwrap().correct_side, t);
        let result = s.stop();
        assert!(result.is_some());
        assert!(!s.is_active());

        // A stale poll or input after exit cannot corrupt state.
        let trials = s.stats.trials;
        s.tick(t + Duration::from_secs(60));
        assert!(!s.submit(Side::Left, t + Duration::from_secs(60)));
        assert_eq!(s.stats.trials, trials);
        assert_eq!(s.phase, Phase::Idle);
    }

    #[test]
    fn crossover_resolves_raw_input_at_the_moment_of_input() {
        let mut s = TrialSession::new(6, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);
        drive_to_cue(&mut s, &mut t);
        s.chaos.input_inverted = true;
        let correct = s.spec.as_ref().unwrap().correct_side;
        // Pressing the *opposite* device side lands on the correct logical
        // side while the crossover is active.
        assert!(s.submit(correct.flip(), t + Duration::from_millis(200)));
        assert_eq!(s.last_correct, Some(true));
    }

    #[test]
    fn ten_trial_protocol_scores_seven_of_ten() {
        let mut s = TrialSession::new(7, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);

        for trial in 0..10u32 {
            drive_to_cue(&mut s, &mut t);

            if trial == 0 {
                // Trial 1 of the acceptance scenario: cipher left=ZID, the
                // stimulus "ZID" under a GREEN marker makes RIGHT correct,
                // and a LEFT input is scored MISS.
                s.cipher = SessionCipher {
                    left_token: "ZID".to_string(),
                    right_token: "DAX".to_string(),
                };
                s.chaos = ChaosFlags::default();
                s.spec = Some(TrialSpec {
                    display_text: "ZID".to_string(),
                    class: SemanticClass::Symbolic,
                    marker: Marker::Invert,
                    correct_side: Side::Right,
                });
                assert!(s.submit(Side::Left, t + Duration::from_millis(400)));
                assert_eq!(s.last_correct, Some(false));
            } else {
                s.chaos = ChaosFlags::default();
                let correct = s.spec.as_ref().unwrap().correct_side;
                // Miss trials 2 and 3 as well; hit the remaining seven with
                // a fixed 500 ms reaction time.
                let input = if trial <= 2 { correct.flip() } else { correct };
                assert!(s.submit(input, t + Duration::from_millis(500)));
            }
            finish_feedback(&mut s, &mut t);
        }

        assert_eq!(s.phase, Phase::Terminal);
        assert!(!s.is_active());
        let result = s.take_result().unwrap();
        assert_eq!(result.mode, ProtocolMode::Trial);
        assert_eq!(result.score, 7);
        assert_eq!(result.details, "Accuracy: 70% (7/10)");
        assert_eq!(result.avg_reaction_time, Some(Duration::from_millis(500)));
        // Produced exactly once.
        assert!(s.take_result().is_none());
    }

    #[test]
    fn window_shrinks_under_correct_answers() {
        let mut s = TrialSession::new(8, ComplexityLevel::Baseline, 10);
        let mut t = Instant::now();
        s.start(t);
        drive_to_cue(&mut s, &mut t);
        let before = s.difficulty.window;
        s.chaos = ChaosFlags::default();
        s.submit(s.spec.as_ref().unwrap().correct_side, t + Duration::from_millis(100));
        assert!(s.difficulty.window < before);
    }
}
