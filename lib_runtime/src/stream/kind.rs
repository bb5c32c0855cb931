use std::fmt;
use std::str::FromStr;

use super::error::StreamError;

/// Backend tag selecting which implementation `open_stream` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamKind {
    /// Placeholder with no implementation behind it.
    None,
    /// Single-process, memory-resident reference backend.
    #[default]
    Memory,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::None => write!(f, "NONE"),
            StreamKind::Memory => write!(f, "MEMORY"),
        }
    }
}

impl FromStr for StreamKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StreamKind::None),
            // "stub" is the tag older configuration files use for the memory backend.
            "memory" | "stub" => Ok(StreamKind::Memory),
            _ => Err(StreamError::UnknownStreamKind(s.to_string())),
        }
    }
}
