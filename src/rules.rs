use serde::{Deserialize, Serialize};

use crate::difficulty::ComplexityLevel;
use crate::prng::Prng;

// ─────────────────────────────────────────────────────────────────────────
// Rule generator: produces the stimulus for each trial together with the
// side that currently counts as correct. Generation is total — every call
// yields a valid spec, and classes that do not need the session cipher
// never read it.
// ─────────────────────────────────────────────────────────────────────────

/// Probability that a contextual marker inverts the displayed side.
pub const INVERT_PROB: f32 = 0.35;

/// Nonsense syllables the session cipher draws from.
pub const TOKEN_POOL: &[&str] = &[
    "ZID", "DAX", "VEK", "MUR", "LOP", "TIV", "KES", "BON", "FEP", "RUX",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }

    pub fn random(prng: &mut Prng) -> Self {
        if prng.coin() {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// The tracked anchor state of the continuous protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceState {
    Red,
    Blue,
}

impl ReferenceState {
    pub fn flip(self) -> Self {
        match self {
            ReferenceState::Red => ReferenceState::Blue,
            ReferenceState::Blue => ReferenceState::Red,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReferenceState::Red => "RED",
            ReferenceState::Blue => "BLUE",
        }
    }

    /// Which state a binary-choice input claims: left claims RED, right BLUE.
    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Left => ReferenceState::Red,
            Side::Right => ReferenceState::Blue,
        }
    }

    pub fn random(prng: &mut Prng) -> Self {
        if prng.coin() {
            ReferenceState::Red
        } else {
            ReferenceState::Blue
        }
    }
}

/// Modifier symbol meaning in the continuous protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Keep,
    Invert,
}

impl ModifierKind {
    pub fn inverted(self) -> Self {
        match self {
            ModifierKind::Keep => ModifierKind::Invert,
            ModifierKind::Invert => ModifierKind::Keep,
        }
    }

    pub fn random(prng: &mut Prng) -> Self {
        if prng.coin() {
            ModifierKind::Keep
        } else {
            ModifierKind::Invert
        }
    }
}

/// Resolve the next expected state from the current anchor and the round's
/// modifier. An active flux inverts the modifier's effect *before* it is
/// applied; callers must use one resolution for both input evaluation and
/// the next round's anchor.
pub fn resolve_modifier(
    state: ReferenceState,
    modifier: ModifierKind,
    flux_active: bool,
) -> ReferenceState {
    let effective = if flux_active {
        modifier.inverted()
    } else {
        modifier
    };
    match effective {
        ModifierKind::Keep => state,
        ModifierKind::Invert => state.flip(),
    }
}

/// Renderable shapes the modifier kinds are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolShape {
    Star,
    Circle,
}

impl SymbolShape {
    pub fn label(self) -> &'static str {
        match self {
            SymbolShape::Star => "STAR",
            SymbolShape::Circle => "CIRCLE",
        }
    }
}

/// Random bijection between modifier kinds and shapes, fixed per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMapping {
    pub keep: SymbolShape,
    pub invert: SymbolShape,
}

impl RuleMapping {
    pub fn random(prng: &mut Prng) -> Self {
        if prng.coin() {
            Self {
                keep: SymbolShape::Star,
                invert: SymbolShape::Circle,
            }
        } else {
            Self {
                keep: SymbolShape::Circle,
                invert: SymbolShape::Star,
            }
        }
    }

    pub fn shape_for(&self, kind: ModifierKind) -> SymbolShape {
        match kind {
            ModifierKind::Keep => self.keep,
            ModifierKind::Invert => self.invert,
        }
    }
}

/// Two distinct symbolic tokens denoting LEFT/RIGHT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCipher {
    pub left_token: String,
    pub right_token: String,
}

impl SessionCipher {
    pub fn random(prng: &mut Prng) -> Self {
        let left = prng.pick_index(TOKEN_POOL.len());
        // Skip past the left token so the two can never collide.
        let offset = 1 + prng.pick_index(TOKEN_POOL.len() - 1);
        let right = (left + offset) % TOKEN_POOL.len();
        Self {
            left_token: TOKEN_POOL[left].to_string(),
            right_token: TOKEN_POOL[right].to_string(),
        }
    }

    pub fn token_for(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left_token,
            Side::Right => &self.right_token,
        }
    }
}

/// Contextual marker shown with a stimulus. INVERT renders green; the
/// inversion cue must not be perfectly predictable, so it is sampled fresh
/// each trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Obey,
    Invert,
}

impl Marker {
    pub fn color(self) -> &'static str {
        match self {
            Marker::Obey => "WHITE",
            Marker::Invert => "GREEN",
        }
    }

    pub fn apply(self, side: Side) -> Side {
        match self {
            Marker::Obey => side,
            Marker::Invert => side.flip(),
        }
    }

    fn sample(prng: &mut Prng) -> Self {
        if prng.chance(INVERT_PROB) {
            Marker::Invert
        } else {
            Marker::Obey
        }
    }
}

/// Per-trial chaos activation probabilities. The reference policy keeps flux
/// and input crossover mutually exclusive so the task stays learnable, but
/// that exclusion is a tunable value, not a contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChaosPolicy {
    pub flux_prob: f32,
    pub crossover_prob: f32,
    pub lure_prob: f32,
    pub flux_excludes_crossover: bool,
}

impl Default for ChaosPolicy {
    fn default() -> Self {
        Self {
            flux_prob: 0.3,
            crossover_prob: 0.3,
            lure_prob: 0.3,
            flux_excludes_crossover: true,
        }
    }
}

/// Independent chaos switches, resampled each trial once the level has
/// unlocked them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosFlags {
    pub flux_active: bool,
    pub input_inverted: bool,
    pub lure_active: bool,
}

impl ChaosFlags {
    pub fn sample(level: ComplexityLevel, policy: &ChaosPolicy, prng: &mut Prng) -> Self {
        let flux_active = level.unlocks_flux() && prng.chance(policy.flux_prob);
        let crossover_blocked = flux_active && policy.flux_excludes_crossover;
        let input_inverted =
            level.unlocks_crossover() && !crossover_blocked && prng.chance(policy.crossover_prob);
        let lure_active = level.unlocks_lure() && prng.chance(policy.lure_prob);
        Self {
            flux_active,
            input_inverted,
            lure_active,
        }
    }
}

/// Semantic classes in order of conceptual complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticClass {
    Literal,
    Symbolic,
    Contextual,
    Relational,
    Compound,
}

impl SemanticClass {
    pub const ALL: [SemanticClass; 5] = [
        SemanticClass::Literal,
        SemanticClass::Symbolic,
        SemanticClass::Contextual,
        SemanticClass::Relational,
        SemanticClass::Compound,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SemanticClass::Literal => "literal",
            SemanticClass::Symbolic => "symbolic",
            SemanticClass::Contextual => "contextual",
            SemanticClass::Relational => "relational",
            SemanticClass::Compound => "compound",
        }
    }
}

/// One class per level below the ceiling; at maximum load every class is in
/// play and the draw is uniform.
pub fn class_for_level(level: ComplexityLevel, prng: &mut Prng) -> SemanticClass {
    match level {
        ComplexityLevel::Baseline => SemanticClass::Literal,
        ComplexityLevel::SpeedUp => SemanticClass::Symbolic,
        ComplexityLevel::FluxIntro => SemanticClass::Contextual,
        ComplexityLevel::JitterIntro => SemanticClass::Relational,
        ComplexityLevel::NoiseIntro => SemanticClass::Compound,
        ComplexityLevel::MaximumLoad => *prng.pick(&SemanticClass::ALL),
    }
}

/// Generated stimulus for one trial. Immutable once generated; consumed
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub display_text: String,
    pub class: SemanticClass,
    pub marker: Marker,
    pub correct_side: Side,
}

/// Produce the trial spec for the discrete protocol at the given level.
pub fn generate(level: ComplexityLevel, cipher: &SessionCipher, prng: &mut Prng) -> TrialSpec {
    let class = class_for_level(level, prng);
    generate_class(class, level, cipher, prng)
}

fn generate_class(
    class: SemanticClass,
    level: ComplexityLevel,
    cipher: &SessionCipher,
    prng: &mut Prng,
) -> TrialSpec {
    match class {
        SemanticClass::Literal => {
            let target = Side::random(prng);
            TrialSpec {
                display_text: target.label().to_string(),
                class,
                marker: Marker::Obey,
                correct_side: target,
            }
        }
        SemanticClass::Symbolic => {
            let target = Side::random(prng);
            // Once the contextual mechanic is unlocked, symbolic trials may
            // carry the inversion marker as well.
            let marker = if level.unlocks_flux() {
                Marker::sample(prng)
            } else {
                Marker::Obey
            };
            TrialSpec {
                display_text: cipher.token_for(target).to_string(),
                class,
                marker,
                correct_side: marker.apply(target),
            }
        }
        SemanticClass::Contextual => {
            let shown = Side::random(prng);
            let marker = Marker::sample(prng);
            TrialSpec {
                display_text: shown.label().to_string(),
                class,
                marker,
                correct_side: marker.apply(shown),
            }
        }
        SemanticClass::Relational => {
            let anchor = Side::random(prng);
            let equals = prng.coin();
            let relation = if equals { "=" } else { "≠" };
            TrialSpec {
                display_text: format!("{} {}", relation, anchor.label()),
                class,
                marker: Marker::Obey,
                correct_side: if equals { anchor } else { anchor.flip() },
            }
        }
        SemanticClass::Compound => {
            let base = Side::random(prng);
            let same = prng.coin();
            let modifier = if same { "SAME" } else { "OPP" };
            TrialSpec {
                display_text: format!("{} {}", cipher.token_for(base), modifier),
                class,
                marker: Marker::Obey,
                correct_side: if same { base } else { base.flip() },
            }
        }
    }
}
