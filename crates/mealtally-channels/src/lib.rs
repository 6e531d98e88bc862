//! # mealtally-channels
//!
//! Chat stream boundaries for mealtally.

pub mod transcript;

pub use transcript::TranscriptStream;
