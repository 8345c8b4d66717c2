//! Rerank the sample documents for one query.
//!
//! ```text
//! cargo run --example rerank -- colbert-ir/colbertv2.0
//! COLBERT_RERANK_LOG=debug cargo run --example rerank -- ./modules/colbert
//! ```

use colbert_rerank::core::{init_tracing, sample_documents, RerankOptions};
use colbert_rerank::RerankPipelineBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let model_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "colbert-ir/colbertv2.0".to_string());

    println!("Building pipeline for {model_path}...");
    let pipeline = RerankPipelineBuilder::load(&model_path)?
        .cpu()
        .include_title(false)
        .build()
        .await?;
    println!("Pipeline built successfully.");

    let query = "what is the color of the horse?";
    let documents = sample_documents();
    let results = pipeline.rerank(&[query], &[documents], &RerankOptions::new().max_num_documents(3))?;

    for prediction in &results {
        println!("\nQuery: {}", prediction.sentence);
        for (rank, ranked) in prediction.result.iter().enumerate() {
            println!(
                "{}. [{}] {} (score: {:.4})",
                rank + 1,
                ranked.document.docid,
                ranked.document.text,
                ranked.score
            );
        }
    }

    println!("\nAs JSON:\n{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
