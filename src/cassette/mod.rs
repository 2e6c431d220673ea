//! Cassette format for recording and replaying snapshot source interactions.

pub mod format;
pub mod recorder;
pub mod replayer;
