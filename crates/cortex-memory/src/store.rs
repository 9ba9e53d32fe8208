use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use cortex_core::config::MemoryConfig;
use cortex_core::error::{CoreError, Result};
use cortex_llm::{cosine_similarity, EmbeddingClient};
use tracing::{info, warn};

use crate::combine::{build_concatenated_query, build_weighted_embedding, CombineStrategy};
use crate::types::{
    BaseChunk, BaseFile, BaseHit, ExemplarStage, LongEntry, LongHit, MediumEntry, MediumHit, MemoryRole, ShortEntry,
};

struct Inner {
    short: VecDeque<ShortEntry>,
    medium: Vec<MediumEntry>,
    long: Vec<LongEntry>,
    base: Vec<BaseChunk>,
    personality_thought: Vec<BaseChunk>,
    personality_response: Vec<BaseChunk>,
}

/// Owns all four memory tiers and their disk persistence (C6).
pub struct MemoryStore {
    inner: Mutex<Inner>,
    data_dir: PathBuf,
    short_capacity: usize,
    user_weight: f32,
    thought_weight: f32,
}

fn short_path(dir: &Path) -> PathBuf {
    dir.join("short_memory.json")
}
fn medium_path(dir: &Path) -> PathBuf {
    dir.join("medium_memory.json")
}
fn long_path(dir: &Path) -> PathBuf {
    dir.join("long_memory.json")
}

impl MemoryStore {
    /// Loads Tiers 1-3 from `config.data_dir` (empty if absent) and Tier 4
    /// from `config.base_memory_dir`. Tier 4 is read-only after this call.
    pub fn load(config: &MemoryConfig) -> Result<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(&data_dir).map_err(|e| CoreError::MemoryIoFailure {
            path: data_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let short = read_json_or_default(&short_path(&data_dir))?;
        let medium = read_json_or_default(&medium_path(&data_dir))?;
        let long = read_json_or_default(&long_path(&data_dir))?;
        let (base, personality_thought, personality_response) = load_base_memory(Path::new(&config.base_memory_dir));

        info!(base_chunks = base.len(), "memory subsystem loaded");

        Ok(Self {
            inner: Mutex::new(Inner { short, medium, long, base, personality_thought, personality_response }),
            data_dir,
            short_capacity: config.short_capacity,
            user_weight: config.combined_user_weight,
            thought_weight: config.combined_thought_weight,
        })
    }

    /// Append a conversational turn to Tier 1. When Tier 1 overflows its
    /// capacity, the oldest entry is embedded and pushed to Tier 2 (§4.6,
    /// §3). Embedding failure means the overflowed turn is dropped from Tier
    /// 2 entirely (§7), not retried.
    pub async fn add_turn(&self, embedder: &EmbeddingClient, role: MemoryRole, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let now = Utc::now();
        let entry = ShortEntry { role, content: content.clone(), timestamp: now, date: now.date_naive() };

        let overflowed = {
            let mut inner = self.inner.lock().expect("memory store mutex poisoned");
            inner.short.push_back(entry);
            if inner.short.len() > self.short_capacity {
                inner.short.pop_front()
            } else {
                None
            }
        };

        if let Some(overflowed) = overflowed {
            match embedder.embed(&overflowed.content).await {
                Ok(embedding) => {
                    let mut inner = self.inner.lock().expect("memory store mutex poisoned");
                    inner.medium.push(MediumEntry {
                        role: overflowed.role,
                        content: overflowed.content,
                        timestamp: overflowed.timestamp,
                        date: overflowed.date,
                        embedding,
                    });
                }
                Err(e) => warn!(error = %e, "embedding failed, overflowed turn dropped from medium tier"),
            }
        }

        self.persist_short()?;
        self.persist_medium()?;
        Ok(())
    }

    /// Dates present in Tiers 1-2 strictly older than yesterday, i.e. ready
    /// for summarization (§4.6, run at startup only per the resolved open
    /// question).
    pub fn dates_needing_archival(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let yesterday = today.pred_opt().unwrap_or(today);
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let mut dates: Vec<NaiveDate> = inner
            .short
            .iter()
            .map(|e| e.date)
            .chain(inner.medium.iter().map(|e| e.date))
            .filter(|d| *d < yesterday)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Summarization itself is delegated to the caller (an LLM call is out
    /// of scope here); this embeds the given summary, appends it to Tier 3,
    /// and evicts the now-redundant raw entries for `date` from Tiers 1-2.
    pub async fn archive_previous_day(&self, embedder: &EmbeddingClient, date: NaiveDate, summary: impl Into<String>) -> Result<()> {
        let summary = summary.into();
        let embedding = embedder.embed(&summary).await.unwrap_or_default();

        let entry_count = {
            let mut inner = self.inner.lock().expect("memory store mutex poisoned");
            let before = inner.short.len() + inner.medium.len();
            inner.short.retain(|e| e.date != date);
            inner.medium.retain(|e| e.date != date);
            let after = inner.short.len() + inner.medium.len();
            let archived = before - after;

            inner.long.push(LongEntry {
                date,
                summary,
                embedding,
                entry_count: archived,
                timestamp: Utc::now(),
                metadata: serde_json::json!({}),
            });
            archived
        };

        info!(%date, entry_count, "archived previous day to long-term memory");
        self.persist_short()?;
        self.persist_medium()?;
        self.persist_long()?;
        Ok(())
    }

    /// Verbatim Tier 2 entries for `date`, oldest first, capped at
    /// `max_entries`, formatted `"[role] content"` for reflective prompts.
    pub fn get_day_context(&self, date: NaiveDate, max_entries: usize) -> Vec<String> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let mut entries: Vec<&MediumEntry> = inner.medium.iter().filter(|e| e.date == date).collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
            .into_iter()
            .rev()
            .take(max_entries)
            .rev()
            .map(|e| format!("[{:?}] {}", e.role, e.content))
            .collect()
    }

    pub fn get_yesterday_context(&self, max_entries: usize) -> Vec<String> {
        let yesterday = Utc::now().date_naive().pred_opt().unwrap_or(Utc::now().date_naive());
        self.get_day_context(yesterday, max_entries)
    }

    async fn combined_query_embedding(
        &self,
        embedder: &EmbeddingClient,
        user_input: &str,
        recent_thoughts: &[String],
        strategy: CombineStrategy,
    ) -> Option<Vec<f32>> {
        match strategy {
            CombineStrategy::TextConcatenation => {
                let text = build_concatenated_query(user_input, recent_thoughts, self.user_weight, self.thought_weight);
                embedder.embed(&text).await.ok()
            }
            CombineStrategy::WeightedEmbedding => {
                build_weighted_embedding(embedder, user_input, recent_thoughts, self.user_weight, self.thought_weight).await
            }
        }
    }

    pub async fn search_base_knowledge_combined(
        &self,
        embedder: &EmbeddingClient,
        user_input: &str,
        recent_thoughts: &[String],
        k: usize,
        min_similarity: f32,
        strategy: CombineStrategy,
    ) -> Vec<BaseHit> {
        let Some(query_vec) = self.combined_query_embedding(embedder, user_input, recent_thoughts, strategy).await else {
            return Vec::new();
        };
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        top_k_hits(&inner.base, &query_vec, k, min_similarity, |c| (c.text.clone(), c.metadata.clone()))
            .into_iter()
            .map(|(similarity, (text, metadata))| BaseHit { text, metadata, similarity })
            .collect()
    }

    pub async fn search_long_memory_combined(
        &self,
        embedder: &EmbeddingClient,
        user_input: &str,
        recent_thoughts: &[String],
        k: usize,
        min_similarity: f32,
        strategy: CombineStrategy,
    ) -> Vec<LongHit> {
        let Some(query_vec) = self.combined_query_embedding(embedder, user_input, recent_thoughts, strategy).await else {
            return Vec::new();
        };
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let scored: Vec<(f32, LongHit)> = inner
            .long
            .iter()
            .map(|e| (cosine_similarity(&e.embedding, &query_vec), LongHit { date: e.date, summary: e.summary.clone(), similarity: 0.0 }))
            .collect();
        select_top_k(scored, k, min_similarity)
            .into_iter()
            .map(|(sim, mut hit)| {
                hit.similarity = sim;
                hit
            })
            .collect()
    }

    pub async fn search_medium_memory_combined(
        &self,
        embedder: &EmbeddingClient,
        user_input: &str,
        recent_thoughts: &[String],
        k: usize,
        min_similarity: f32,
        strategy: CombineStrategy,
    ) -> Vec<MediumHit> {
        let Some(query_vec) = self.combined_query_embedding(embedder, user_input, recent_thoughts, strategy).await else {
            return Vec::new();
        };
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let scored: Vec<(f32, MediumHit)> = inner
            .medium
            .iter()
            .map(|e| {
                (
                    cosine_similarity(&e.embedding, &query_vec),
                    MediumHit { role: e.role, content: e.content.clone(), timestamp: e.timestamp, similarity: 0.0 },
                )
            })
            .collect();
        select_top_k(scored, k, min_similarity)
            .into_iter()
            .map(|(sim, mut hit)| {
                hit.similarity = sim;
                hit
            })
            .collect()
    }

    /// Personality exemplars don't use the combined-query strategy — they're
    /// matched directly against a single query embedding, partitioned by
    /// stage (§4.7).
    pub async fn search_personality_examples(
        &self,
        embedder: &EmbeddingClient,
        query: &str,
        stage: ExemplarStage,
        k: usize,
        min_similarity: f32,
    ) -> Vec<BaseHit> {
        let Ok(query_vec) = embedder.embed(query).await else {
            return Vec::new();
        };
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let pool = match stage {
            ExemplarStage::Thought => &inner.personality_thought,
            ExemplarStage::Response => &inner.personality_response,
        };
        top_k_hits(pool, &query_vec, k, min_similarity, |c| (c.text.clone(), c.metadata.clone()))
            .into_iter()
            .map(|(similarity, (text, metadata))| BaseHit { text, metadata, similarity })
            .collect()
    }

    fn persist_short(&self) -> Result<()> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        write_json(&short_path(&self.data_dir), &inner.short.iter().collect::<Vec<_>>())
    }

    fn persist_medium(&self) -> Result<()> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        write_json(&medium_path(&self.data_dir), &inner.medium)
    }

    fn persist_long(&self) -> Result<()> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        write_json(&long_path(&self.data_dir), &inner.long)
    }

    /// The `n` most recently archived Tier-3 summaries, newest first
    /// (startup reflective context, §4.7).
    pub fn recent_long_summaries(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let mut entries: Vec<&LongEntry> = inner.long.iter().collect();
        entries.sort_by_key(|e| e.timestamp);
        entries.into_iter().rev().take(n).map(|e| format!("{}: {}", e.date, e.summary)).collect()
    }

    pub fn short_len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").short.len()
    }

    pub fn medium_len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").medium.len()
    }

    pub fn long_len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").long.len()
    }
}

/// Score every item against `query_vec`, keep those meeting `min_similarity`,
/// and return the top `k` by similarity descending (argpartition-style: a
/// full sort is fine at this corpus scale, the spec only requires partial
/// selection semantics, not a specific algorithm).
fn top_k_hits<T, U>(items: &[T], query_vec: &[f32], k: usize, min_similarity: f32, extract: impl Fn(&T) -> U) -> Vec<(f32, U)>
where
    T: HasEmbedding,
{
    let scored: Vec<(f32, U)> = items.iter().map(|item| (cosine_similarity(item.embedding(), query_vec), extract(item))).collect();
    select_top_k(scored, k, min_similarity)
}

fn select_top_k<U>(mut scored: Vec<(f32, U)>, k: usize, min_similarity: f32) -> Vec<(f32, U)> {
    scored.retain(|(sim, _)| *sim >= min_similarity);
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

trait HasEmbedding {
    fn embedding(&self) -> &[f32];
}

impl HasEmbedding for BaseChunk {
    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

fn read_json_or_default<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T>
where
    T: Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::MemoryIoFailure { path: path.display().to_string(), reason: e.to_string() })?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&text).map_err(|e| CoreError::MemoryIoFailure { path: path.display().to_string(), reason: e.to_string() })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).map_err(|e| CoreError::MemoryIoFailure { path: path.display().to_string(), reason: e.to_string() })
}

/// Scan `base_memory_dir` for JSON files matching the base-memory schema.
/// Chunks whose metadata carries `"type": "personality"` and a `"stage"`
/// field are partitioned into the personality pools instead of the general
/// corpus.
fn load_base_memory(dir: &Path) -> (Vec<BaseChunk>, Vec<BaseChunk>, Vec<BaseChunk>) {
    let mut base = Vec::new();
    let mut thought = Vec::new();
    let mut response = Vec::new();

    let Ok(entries) = std::fs::read_dir(dir) else {
        return (base, thought, response);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read base memory file");
                continue;
            }
        };
        let parsed: BaseFile = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse base memory file");
                continue;
            }
        };
        for chunk in parsed.chunks() {
            let stage = chunk
                .metadata
                .get("type")
                .and_then(|v| v.as_str())
                .filter(|t| *t == "personality")
                .and_then(|_| chunk.metadata.get("stage"))
                .and_then(|v| v.as_str());
            match stage {
                Some("thought") => thought.push(chunk.clone()),
                Some("response") => response.push(chunk.clone()),
                _ => base.push(chunk.clone()),
            }
        }
    }

    (base, thought, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(dir: &Path, base_dir: &Path) -> MemoryConfig {
        MemoryConfig {
            data_dir: dir.display().to_string(),
            base_memory_dir: base_dir.display().to_string(),
            short_capacity: 2,
            combined_user_weight: 0.6,
            combined_thought_weight: 0.4,
        }
    }

    #[test]
    fn load_with_empty_dirs_starts_empty() {
        let data = tempdir().unwrap();
        let base = tempdir().unwrap();
        let store = MemoryStore::load(&config_for(data.path(), base.path())).unwrap();
        assert_eq!(store.short_len(), 0);
        assert_eq!(store.medium_len(), 0);
        assert_eq!(store.long_len(), 0);
    }

    #[test]
    fn dates_needing_archival_excludes_yesterday_and_today() {
        let data = tempdir().unwrap();
        let base = tempdir().unwrap();
        let store = MemoryStore::load(&config_for(data.path(), base.path())).unwrap();
        let today = Utc::now().date_naive();
        let old_date = today - chrono::Duration::days(5);
        {
            let mut inner = store.inner.lock().unwrap();
            inner.medium.push(MediumEntry {
                role: MemoryRole::User,
                content: "old".to_string(),
                timestamp: Utc::now(),
                date: old_date,
                embedding: vec![1.0],
            });
        }
        let dates = store.dates_needing_archival(today);
        assert_eq!(dates, vec![old_date]);
    }

    #[test]
    fn base_memory_loader_partitions_personality_exemplars() {
        let data = tempdir().unwrap();
        let base = tempdir().unwrap();
        let file_contents = serde_json::json!([
            {"text": "plain fact", "searchable_text": "plain fact", "embedding": [1.0], "metadata": {}, "char_count": 10},
            {"text": "speak warmly", "searchable_text": "speak warmly", "embedding": [1.0], "metadata": {"type": "personality", "stage": "response"}, "char_count": 12},
        ]);
        std::fs::write(base.path().join("corpus.json"), file_contents.to_string()).unwrap();
        let store = MemoryStore::load(&config_for(data.path(), base.path())).unwrap();
        let inner = store.inner.lock().unwrap();
        assert_eq!(inner.base.len(), 1);
        assert_eq!(inner.personality_response.len(), 1);
        assert!(inner.personality_thought.is_empty());
    }
}
