//! Question-to-passages retrieval.
//!
//! Embeds the question, queries the vector index for the top-k chunks, and
//! labels each hit with its originating document's filename for citation.
//! An empty index yields an empty result, not an error — callers treat
//! that as "answer from general knowledge, no sources".

use crate::error::CoreResult;
use crate::models::Passage;
use crate::service::AppContext;

pub async fn retrieve(ctx: &AppContext, question: &str, k: usize) -> CoreResult<Vec<Passage>> {
    if ctx.index.read().unwrap().size() == 0 {
        return Ok(Vec::new());
    }

    let query = ctx.embedder.embed(question).await?;

    let hits = ctx.index.read().unwrap().search(&query, k)?;
    let documents = ctx.documents.read().unwrap();

    Ok(hits
        .into_iter()
        .map(|(chunk, score)| {
            let filename = documents
                .get(&chunk.document_id)
                .map(|d| d.filename.clone())
                .unwrap_or_else(|| "document".to_string());
            Passage {
                chunk_id: chunk.id,
                filename,
                text: chunk.text,
                score,
            }
        })
        .collect())
}
