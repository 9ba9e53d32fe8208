use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRole {
    User,
    Assistant,
}

/// Tier 1 entry: today's raw turns, no embedding attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortEntry {
    pub role: MemoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
}

/// Tier 2 entry: same shape as Tier 1 plus an embedding, covering today's
/// older turns and the whole of yesterday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumEntry {
    pub role: MemoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub embedding: Vec<f32>,
}

/// Tier 3 entry: one per archived day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongEntry {
    pub date: NaiveDate,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub entry_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

/// Tier 4 chunk: read-only corpus loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseChunk {
    pub text: String,
    pub searchable_text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Value,
    pub char_count: usize,
}

/// One base-memory source file, either with a header or a bare chunk array
/// (§6 persistence format allows both shapes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseFile {
    WithHeader {
        source_file: String,
        embed_model: String,
        chunk_method: String,
        chunks: Vec<BaseChunk>,
    },
    Bare(Vec<BaseChunk>),
}

impl BaseFile {
    pub fn chunks(&self) -> &[BaseChunk] {
        match self {
            BaseFile::WithHeader { chunks, .. } => chunks,
            BaseFile::Bare(chunks) => chunks,
        }
    }
}

/// Which side of a personality exemplar this chunk belongs to: thought-stage
/// (internal cognition) or response-stage (what gets spoken) (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExemplarStage {
    Thought,
    Response,
}

impl ExemplarStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExemplarStage::Thought => "thought",
            ExemplarStage::Response => "response",
        }
    }
}

/// A scored search hit, generic over the payload shape returned by each
/// tier's search method.
#[derive(Debug, Clone)]
pub struct ScoredHit<T> {
    pub item: T,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseHit {
    pub text: String,
    pub metadata: Value,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongHit {
    pub date: NaiveDate,
    pub summary: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediumHit {
    pub role: MemoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub similarity: f32,
}
