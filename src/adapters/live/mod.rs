//! Live adapters for real external interactions.

pub mod clock;
pub mod filesystem;
pub mod fs_sink;
pub mod http_source;
pub mod local_source;
