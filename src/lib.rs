//! Fluxgate — adaptive relational trial engine.
//!
//! Short, timed binary-choice trials whose correct answer comes from a
//! layered, randomized rule set: literal mappings, symbolic ciphers,
//! contextual inversion, relational comparisons, and compound combinations.
//! A closed-loop difficulty controller raises or lowers task load from
//! recent performance, and a lives/buffer resource model decides whether a
//! miss is absorbed, costs a life, or sends the session through a reboot
//! recovery.
//!
//! The crate is synchronous and timer-agnostic: hosts poll
//! [`trial::TrialSession::tick`] / [`stream::StreamSession::tick`] once per
//! display frame and feed input as it arrives. The `fluxgated` daemon wraps
//! this behind a small JSON IPC protocol.

pub mod difficulty;
pub mod events;
pub mod prng;
pub mod profile;
pub mod resources;
pub mod rules;
pub mod stats;
pub mod stream;
pub mod trial;
