use super::connect;
use crate::IndexArgs;
use anyhow::Result;
use apidesk::retriever::{RetrievedContext, Retriever};
use console::style;

pub async fn execute(args: &IndexArgs, query: &str, top_k: usize) -> Result<()> {
    let connection = connect(args).await?;
    let retriever = Retriever::new(connection.embedder, connection.store, connection.handle);

    let context = retriever.retrieve_context(query, top_k).await?;
    if context.is_empty() {
        println!("{}", style("No matching documentation found.").dim());
    } else {
        println!("{}", render_matches(&context));
    }
    Ok(())
}

/// Similarity score as a percentage with two decimals
pub fn similarity(score: f32) -> String {
    format!("{:.2}%", score * 100.0)
}

pub fn render_matches(context: &RetrievedContext) -> String {
    context
        .snippets
        .iter()
        .enumerate()
        .map(|(i, snippet)| {
            format!(
                "{}. {}\n{}",
                i + 1,
                style(similarity(snippet.score)).cyan(),
                snippet.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
