//! Answer composition.
//!
//! Drives one request through its states: retrieve (RAG mode only), build
//! the prompt from system instructions, bounded session history, and
//! retrieved passages, invoke the backend, and record the exchange. The
//! session is updated only after the backend succeeds, so a failed or
//! cancelled request leaves history untouched.
//!
//! `latency_ms` is measured strictly around the backend invocation
//! (including its single retry); retrieval and prompt building are
//! excluded. This is a documented API field, not an incidental metric.

use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use crate::backend::GenerateOptions;
use crate::error::{CoreError, CoreResult};
use crate::models::{AnswerResult, Passage, Turn};
use crate::retrieve;
use crate::service::AppContext;

/// Whether a request consults the document index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Chat,
    Rag,
}

const CHAT_INSTRUCTIONS: &str =
    "You are a helpful and precise assistant. Answer clearly and politely.";

const RAG_INSTRUCTIONS: &str = "Answer the question using the document context below. \
Be precise and detailed. If the context does not contain the information, \
say that you could not find it in the documents.";

/// Answer a question, optionally grounded in uploaded documents.
pub async fn answer(
    ctx: &AppContext,
    question: &str,
    session_id: Option<&str>,
    mode: AnswerMode,
) -> CoreResult<AnswerResult> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CoreError::InvalidArgument("question must not be empty".into()));
    }

    // A request without a session id gets a fresh one, returned to the
    // caller so the conversation can continue.
    let session_id = match session_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let passages = match mode {
        AnswerMode::Rag => retrieve::retrieve(ctx, question, ctx.config.retrieval.top_k).await?,
        AnswerMode::Chat => Vec::new(),
    };

    let history = ctx
        .sessions
        .history(&session_id, ctx.config.session.history_turns);
    let prompt = build_prompt(&history, &passages, question);

    let options = GenerateOptions::from_config(&ctx.config.backend);

    let started = Instant::now();
    let mut outcome = ctx.backend.generate(&prompt, &options).await;
    if matches!(outcome, Err(ref e) if e.is_retryable()) {
        outcome = ctx.backend.generate(&prompt, &options).await;
    }
    let latency_ms = started.elapsed().as_millis() as u64;

    let answer_text = match outcome {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                session_id = %session_id,
                latency_ms,
                outcome = e.code(),
                "request failed"
            );
            return Err(e);
        }
    };

    ctx.sessions
        .append_exchange(&session_id, question, &answer_text);

    tracing::info!(
        session_id = %session_id,
        latency_ms,
        outcome = "ok",
        "request answered"
    );

    Ok(AnswerResult {
        answer: answer_text,
        sources: passages.iter().map(Passage::citation).collect(),
        latency_ms,
        session_id,
        timestamp: Utc::now(),
    })
}

/// Concatenate system instructions, bounded history, document context, and
/// the question into the final prompt.
fn build_prompt(history: &[Turn], passages: &[Passage], question: &str) -> String {
    let mut prompt = String::new();

    // No passages means general-knowledge answering, with or without RAG mode.
    if passages.is_empty() {
        prompt.push_str(CHAT_INSTRUCTIONS);
    } else {
        prompt.push_str(RAG_INSTRUCTIONS);
    }
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("Conversation history:\n");
        for turn in history {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if !passages.is_empty() {
        prompt.push_str("Document context:\n");
        for passage in passages {
            prompt.push('[');
            prompt.push_str(&passage.filename);
            prompt.push_str("] ");
            prompt.push_str(&passage.text);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt.push_str("\n\nAnswer:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn turn(role: Role, text: &str) -> Turn {
        Turn {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_chat_minimal() {
        let prompt = build_prompt(&[], &[], "Qual a capital da França?");
        assert!(prompt.starts_with(CHAT_INSTRUCTIONS));
        assert!(prompt.contains("Question: Qual a capital da França?"));
        assert!(prompt.ends_with("Answer:"));
        assert!(!prompt.contains("Document context:"));
        assert!(!prompt.contains("Conversation history:"));
    }

    #[test]
    fn test_prompt_includes_history_in_order() {
        let history = vec![
            turn(Role::User, "Oi"),
            turn(Role::Assistant, "Olá! Como posso ajudar?"),
        ];
        let prompt = build_prompt(&history, &[], "Quem é você?");
        let user_pos = prompt.find("User: Oi").unwrap();
        let assistant_pos = prompt.find("Assistant: Olá!").unwrap();
        assert!(user_pos < assistant_pos);
    }

    #[test]
    fn test_prompt_with_passages_uses_rag_instructions() {
        let passages = vec![Passage {
            chunk_id: "c1".into(),
            filename: "exemplo.txt".into(),
            text: "Machine Learning é uma subárea da IA.".into(),
            score: 0.8,
        }];
        let prompt = build_prompt(&[], &passages, "O que é machine learning?");
        assert!(prompt.starts_with(RAG_INSTRUCTIONS));
        assert!(prompt.contains("[exemplo.txt] Machine Learning é uma subárea da IA."));
    }

    #[test]
    fn test_prompt_without_passages_falls_back_to_chat_instructions() {
        // RAG mode with an empty index answers from general knowledge.
        let prompt = build_prompt(&[], &[], "O que é machine learning?");
        assert!(prompt.starts_with(CHAT_INSTRUCTIONS));
    }
}
