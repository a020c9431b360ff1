//! Passage retrieval for RAG tasks.
//!
//! Ranking is semantic (inner product of embeddings) when an [`Embedder`] is
//! configured and keyword overlap otherwise. Any encoding failure degrades to
//! keyword overlap; retrieval itself never fails.

pub mod embedding;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use taskeval_types::RetrievedPassage;

use crate::similarity::word_set;

pub use embedding::HttpEmbedder;
pub use store::{DocumentStore, StoredDocument};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[derive(Clone, Default)]
pub struct Retriever {
    embedder: Option<Arc<dyn Embedder>>,
}

impl Retriever {
    /// Keyword-overlap ranking only.
    pub fn keyword() -> Self {
        Self { embedder: None }
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
        }
    }

    pub fn is_semantic(&self) -> bool {
        self.embedder.is_some()
    }

    /// The `k` best passages, by descending score and then ascending index.
    pub async fn retrieve(&self, query: &str, documents: &[String], k: usize) -> Vec<RetrievedPassage> {
        if documents.is_empty() || k == 0 {
            return Vec::new();
        }

        let scores = match &self.embedder {
            Some(embedder) => match semantic_scores(embedder.as_ref(), query, documents).await {
                Ok(scores) => scores,
                Err(err) => {
                    tracing::warn!(error = %err, "embedding failed, falling back to keyword overlap");
                    keyword_scores(query, documents)
                }
            },
            None => keyword_scores(query, documents),
        };

        rank(documents, &scores, k)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("semantic", &self.is_semantic())
            .finish()
    }
}

async fn semantic_scores(
    embedder: &dyn Embedder,
    query: &str,
    documents: &[String],
) -> anyhow::Result<Vec<f64>> {
    let mut texts = Vec::with_capacity(documents.len() + 1);
    texts.push(query.to_string());
    texts.extend(documents.iter().cloned());

    let vectors = embedder.encode(&texts).await?;
    if vectors.len() != texts.len() {
        anyhow::bail!("expected {} embeddings, got {}", texts.len(), vectors.len());
    }
    let (query_vec, doc_vecs) = vectors.split_first().ok_or_else(|| anyhow::anyhow!("no embeddings"))?;
    if query_vec.is_empty() {
        anyhow::bail!("empty query embedding");
    }

    doc_vecs
        .iter()
        .map(|doc| {
            if doc.len() != query_vec.len() {
                anyhow::bail!("embedding dimension {} != {}", doc.len(), query_vec.len());
            }
            let score: f64 = doc
                .iter()
                .zip(query_vec)
                .map(|(a, b)| f64::from(*a) * f64::from(*b))
                .sum();
            if !score.is_finite() {
                anyhow::bail!("non-finite similarity score");
            }
            Ok(score)
        })
        .collect()
}

/// |words(query) ∩ words(doc)| / |words(query)|, 0 for a query without words.
pub fn keyword_scores(query: &str, documents: &[String]) -> Vec<f64> {
    let query_words = word_set(query);
    documents
        .iter()
        .map(|doc| {
            if query_words.is_empty() {
                return 0.0;
            }
            let doc_words = word_set(doc);
            query_words.intersection(&doc_words).count() as f64 / query_words.len() as f64
        })
        .collect()
}

fn rank(documents: &[String], scores: &[f64], k: usize) -> Vec<RetrievedPassage> {
    let mut order: Vec<usize> = (0..documents.len()).collect();
    // stable sort keeps ascending index among equal scores
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
        .into_iter()
        .take(k)
        .map(|index| RetrievedPassage {
            content: documents[index].clone(),
            score: scores[index],
            index,
        })
        .collect()
}

/// 0.6 × mean passage score + 0.4 × min(1, chars/200), clamped to
/// [0.1, 0.95]; 0.3 when nothing was retrieved.
pub fn answer_confidence(answer: &str, passages: &[RetrievedPassage]) -> f64 {
    if passages.is_empty() {
        return 0.3;
    }
    let mean = passages.iter().map(|p| p.score).sum::<f64>() / passages.len() as f64;
    let length_score = (answer.chars().count() as f64 / 200.0).min(1.0);
    (0.6 * mean + 0.4 * length_score).clamp(0.1, 0.95)
}
