//! Chunk grammar shared by the encoder and the decoder.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {line}: malformed chunk: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("chunk {0} is defined more than once")]
    DuplicateChunk(usize),
    #[error("stream has no root chunk")]
    MissingRoot,
    #[error("chunk {0} is referenced but never defined")]
    UnknownChunk(usize),
    #[error("chunk {from} references chunk {to}, which comes later in the stream")]
    ForwardReference { from: usize, to: usize },
    #[error("chunk {id}: expected a {expected} chunk")]
    UnexpectedKind { id: usize, expected: ChunkKind },
    #[error("chunk {id}: invalid payload: {reason}")]
    InvalidPayload { id: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Json,
    Module,
    Symbol,
    Error,
}

impl ChunkKind {
    pub fn tag(self) -> char {
        match self {
            ChunkKind::Json => 'J',
            ChunkKind::Module => 'M',
            ChunkKind::Symbol => 'S',
            ChunkKind::Error => 'E',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'J' => Some(ChunkKind::Json),
            'M' => Some(ChunkKind::Module),
            'S' => Some(ChunkKind::Symbol),
            'E' => Some(ChunkKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: usize,
    pub kind: ChunkKind,
    pub payload: Value,
}

impl Chunk {
    /// Parse one line. `line` is 1-based and only used in errors.
    pub fn parse(text: &str, line: usize) -> Result<Self, DecodeError> {
        let malformed = |reason: &str| DecodeError::Malformed {
            line,
            reason: reason.to_string(),
        };
        let digits = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
        if digits == 0 {
            return Err(malformed("missing chunk id"));
        }
        let id = text[..digits]
            .parse::<usize>()
            .map_err(|_| malformed("chunk id out of range"))?;

        let mut rest = text[digits..].chars();
        let kind = rest
            .next()
            .ok_or_else(|| malformed("missing chunk kind"))
            .and_then(|tag| {
                ChunkKind::from_tag(tag).ok_or_else(|| malformed(&format!("unknown chunk kind {tag:?}")))
            })?;
        let payload = serde_json::from_str(rest.as_str()).map_err(|e| malformed(&e.to_string()))?;
        Ok(Self { id, kind, payload })
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id, self.kind.tag(), self.payload)
    }
}

/// All chunks of a stream in stream order. Blank lines are ignored.
pub fn parse_stream(stream: &str) -> Result<Vec<Chunk>, DecodeError> {
    stream
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| Chunk::parse(line, i + 1))
        .collect()
}

/// `"$<n>"` → `n`.
pub(crate) fn reference_id(token: &str, prefix: &str) -> Option<usize> {
    let digits = token.strip_prefix('$')?.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
