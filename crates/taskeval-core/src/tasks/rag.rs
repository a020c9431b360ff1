use taskeval_types::{RagInput, RagOutput, RetrievedPassage};

use super::{complete, prefix_chars, Harness, Route};
use crate::error::ExecutionError;
use crate::extract::extract_text;
use crate::provider::{ChatMessage, CompletionRequest};
use crate::retrieval::answer_confidence;

const SYSTEM_PROMPT: &str =
    "You are a professional question-answering assistant. Answer using the provided documents.";

pub(crate) async fn run(
    harness: &Harness,
    route: &Route,
    model: &str,
    input: &RagInput,
) -> Result<RagOutput, ExecutionError> {
    let passages = match input.documents.as_deref() {
        Some(documents) if !documents.is_empty() => {
            harness.retriever().retrieve(&input.query, documents, input.top_k).await
        }
        _ => {
            harness
                .search_documents(&input.query, input.collection.as_deref(), input.top_k)
                .await
        }
    };
    tracing::debug!(retrieved = passages.len(), semantic = harness.retriever().is_semantic(), "passages ranked");

    let answer = match route {
        Route::Provider(client) => {
            let request =
                CompletionRequest::new(SYSTEM_PROMPT, vec![ChatMessage::user(prompt(&input.query, &passages))])
                    .temperature(0.3)
                    .max_tokens(1000);
            let raw = complete(client.as_ref(), model, &request).await?;
            extract_text(&raw, "answer")
        }
        Route::Fallback => fallback_answer(&input.query, &passages),
    };

    let confidence = answer_confidence(&answer, &passages);
    Ok(RagOutput {
        answer,
        retrieved_documents: passages,
        confidence,
    })
}

fn prompt(query: &str, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Document {}: {}", i + 1, p.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Answer the user's question based on the following documents.\n\n\
         Documents:\n{context}\n\n\
         Question: {query}\n\n\
         Give an accurate, detailed answer based on the documents. \
         If they contain no relevant information, say so explicitly."
    )
}

fn fallback_answer(query: &str, passages: &[RetrievedPassage]) -> String {
    match passages.first() {
        Some(top) => format!(
            "Based on the retrieved documents, the answer to '{query}' is: {}...",
            prefix_chars(&top.content, 200)
        ),
        None => format!("Sorry, no documents relevant to '{query}' were found."),
    }
}
