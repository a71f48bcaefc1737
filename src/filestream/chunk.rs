//! Typed output units handed to the delivery stage.

use serde::Serialize;

/// Remote file a chunk is appended to. Each type has its own append offset
/// on the service side, so order within a type must be preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    History,
    Summary,
    Output,
    Events,
    Control,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Summary => "summary",
            Self::Output => "output",
            Self::Events => "events",
            Self::Control => "control",
        }
    }

    /// Remote file name for line chunks; control chunks have none.
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            Self::History => Some("wandb-history.jsonl"),
            Self::Summary => Some("wandb-summary.json"),
            Self::Output => Some("output.log"),
            Self::Events => Some("wandb-events.jsonl"),
            Self::Control => None,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Run-state fields sent alongside file data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exitcode: Option<i32>,
    #[serde(skip_serializing_if = "is_false")]
    pub preempting: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uploaded: Vec<String>,
}

/// One unit of ordered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    Line { chunk_type: ChunkType, line: String },
    Control(ControlFields),
}

impl Chunk {
    pub fn line(chunk_type: ChunkType, line: impl Into<String>) -> Self {
        Self::Line {
            chunk_type,
            line: line.into(),
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Self::Line { chunk_type, .. } => *chunk_type,
            Self::Control(_) => ChunkType::Control,
        }
    }

    /// Serialized line, for line chunks.
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::Line { line, .. } => Some(line),
            Self::Control(_) => None,
        }
    }

    pub fn as_control(&self) -> Option<&ControlFields> {
        match self {
            Self::Control(fields) => Some(fields),
            Self::Line { .. } => None,
        }
    }
}
