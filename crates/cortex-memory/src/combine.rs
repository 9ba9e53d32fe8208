use cortex_llm::EmbeddingClient;

/// How to fold the user's current message and recent thoughts into one
/// embeddable query (§4.6 "the novel part").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStrategy {
    /// Duplicate each component proportional to its weight, concatenate,
    /// truncate, embed the resulting string.
    TextConcatenation,
    /// Embed each side independently, weight-average the vectors,
    /// L2-normalize.
    WeightedEmbedding,
}

const TEXT_TRUNCATE_CHARS: usize = 500;

/// Build the duplicated-and-truncated query string for the text-concatenation
/// strategy.
pub fn build_concatenated_query(user_input: &str, recent_thoughts: &[String], user_weight: f32, thought_weight: f32) -> String {
    let user_reps = (user_weight * 10.0).round().max(1.0) as usize;
    let thought_reps = (thought_weight * 10.0).round().max(1.0) as usize;

    let mut out = String::new();
    for _ in 0..user_reps {
        out.push_str(user_input);
        out.push(' ');
    }
    for thought in recent_thoughts {
        for _ in 0..thought_reps {
            out.push_str(thought);
            out.push(' ');
        }
    }
    out.chars().take(TEXT_TRUNCATE_CHARS).collect()
}

/// Embed the user text and the average of recent-thought embeddings, then
/// combine with the configured weights and L2-normalize. Falls back to
/// whichever side embedded successfully if the other is empty/unavailable.
pub async fn build_weighted_embedding(
    embedder: &EmbeddingClient,
    user_input: &str,
    recent_thoughts: &[String],
    user_weight: f32,
    thought_weight: f32,
) -> Option<Vec<f32>> {
    let user_vec = embedder.embed(user_input).await.ok();

    let mut thought_vecs = Vec::new();
    for thought in recent_thoughts {
        if let Ok(v) = embedder.embed(thought).await {
            thought_vecs.push(v);
        }
    }
    let thought_vec = average_vectors(&thought_vecs);

    let combined = match (user_vec, thought_vec) {
        (Some(u), Some(t)) if u.len() == t.len() => {
            let mixed: Vec<f32> = u.iter().zip(&t).map(|(a, b)| a * user_weight + b * thought_weight).collect();
            Some(mixed)
        }
        (Some(u), _) => Some(u),
        (None, Some(t)) => Some(t),
        (None, None) => None,
    }?;

    Some(l2_normalize(&combined))
}

fn average_vectors(vecs: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first_len = vecs.first()?.len();
    let mut sum = vec![0.0f32; first_len];
    let mut count = 0usize;
    for v in vecs {
        if v.len() != first_len {
            continue;
        }
        for (s, x) in sum.iter_mut().zip(v) {
            *s += x;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum.into_iter().map(|s| s / count as f32).collect())
}

fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_weights_repetition() {
        let query = build_concatenated_query("hello world", &["a thought".to_string()], 0.6, 0.4);
        let user_count = query.matches("hello world").count();
        let thought_count = query.matches("a thought").count();
        assert!(user_count > thought_count);
    }

    #[test]
    fn concatenation_truncates_to_500_chars() {
        let long_input = "x".repeat(1000);
        let query = build_concatenated_query(&long_input, &[], 0.6, 0.4);
        assert!(query.chars().count() <= TEXT_TRUNCATE_CHARS);
    }

    #[test]
    fn average_vectors_ignores_mismatched_lengths() {
        let vecs = vec![vec![1.0, 1.0], vec![3.0, 3.0], vec![1.0]];
        let avg = average_vectors(&vecs).unwrap();
        assert_eq!(avg, vec![2.0, 2.0]);
    }

    #[test]
    fn l2_normalize_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
