use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use colbert_rerank::core::{sample_documents, SequenceLimits};
use colbert_rerank::{
    Document, DocumentSet, RankedDocument, RerankConfig, RerankError, RerankOptions,
    RerankPipeline, RerankRequest, Scorer,
};

/// Scores a passage by how many query words it contains, and records what it was sent.
#[derive(Default)]
struct OverlapScorer {
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<String>, SequenceLimits)>>,
}

impl Scorer for OverlapScorer {
    fn score(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((query.to_string(), passages.to_vec(), limits));
        }
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(passages
            .iter()
            .map(|p| {
                let p = p.to_lowercase();
                words.iter().filter(|w| p.contains(w.as_str())).count() as f32
            })
            .collect())
    }
}

struct FailingScorer;

impl Scorer for FailingScorer {
    fn score(&self, _query: &str, _passages: &[String], _limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("device out of memory")
    }
}

struct FixedScorer(Vec<f32>);

impl Scorer for FixedScorer {
    fn score(&self, _query: &str, passages: &[String], _limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.iter().copied().take(passages.len()).collect())
    }
}

fn pipeline<S: Scorer>(scorer: S) -> RerankPipeline<S> {
    RerankPipeline::new(scorer, RerankConfig::default()).unwrap()
}

#[test]
fn sample_query_returns_top_three_with_model_scores() -> anyhow::Result<()> {
    let pipeline = pipeline(FixedScorer(vec![0.1, 0.4, 0.2, 0.9, 0.3]));
    let query = "what is the color of the horse?";
    let results = pipeline.rerank(
        &[query],
        &[sample_documents()],
        &RerankOptions::new().max_num_documents(3).include_title(false),
    )?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].sentence, query);
    let ranked = &results[0].result;
    let ids: Vec<&str> = ranked.iter().map(|d| d.document.docid.as_str()).collect();
    let scores: Vec<f32> = ranked.iter().map(|d| d.score).collect();
    assert_eq!(ids, ["3", "1", "4"]);
    assert_eq!(scores, vec![0.9, 0.4, 0.3]);

    let originals = sample_documents();
    for ranked in ranked {
        let index: usize = ranked.document.docid.parse()?;
        assert_eq!(ranked.document, originals.documents[index].document);
    }
    Ok(())
}

#[test]
fn horse_query_ranks_horse_document_first() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    let results = pipeline.rerank(
        &["man riding white horse"],
        &[sample_documents()],
        &RerankOptions::new().max_num_documents(3),
    )?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].sentence, "man riding white horse");
    let top = &results[0].result;
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].document.docid, "3");
    assert_eq!(top[0].score, 4.0);
    assert!(top.windows(2).all(|w| w[0].score >= w[1].score));

    let originals = sample_documents();
    for ranked in top {
        let original = originals
            .iter()
            .find(|d| d.document.docid == ranked.document.docid)
            .unwrap();
        assert_eq!(original.document, ranked.document);
    }
    Ok(())
}

#[test]
fn results_follow_query_order() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    let sets = vec![
        DocumentSet::from_iter([Document::new("drums"), Document::new("monkey drums")]),
        DocumentSet::from_iter([Document::new("food"), Document::new("horse")]),
    ];
    let results = pipeline.rerank(&["monkey drums", "horse"], &sets, &RerankOptions::new())?;

    assert_eq!(results[0].sentence, "monkey drums");
    assert_eq!(results[0].result[0].document.text, "monkey drums");
    assert_eq!(results[1].sentence, "horse");
    assert_eq!(results[1].result[0].document.text, "horse");
    Ok(())
}

#[test]
fn non_positive_limit_keeps_every_document() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    for limit in [0, -1] {
        let results = pipeline.rerank(
            &["horse"],
            &[sample_documents()],
            &RerankOptions::new().max_num_documents(limit),
        )?;
        assert_eq!(results[0].result.len(), 5);
    }

    let results = pipeline.rerank(
        &["horse"],
        &[sample_documents()],
        &RerankOptions::new().max_num_documents(50),
    )?;
    assert_eq!(results[0].result.len(), 5);
    Ok(())
}

#[test]
fn ties_keep_input_order() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    let results = pipeline.rerank(&["zebra"], &[sample_documents()], &RerankOptions::new())?;
    let ids: Vec<&str> = results[0].result.iter().map(|d| d.document.docid.as_str()).collect();
    assert_eq!(ids, ["0", "1", "2", "3", "4"]);
    assert!(results[0].result.iter().all(|d| d.score == 0.0));
    Ok(())
}

#[test]
fn empty_document_set_yields_empty_result() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    let results = pipeline.rerank(
        &["horse", "drums"],
        &[DocumentSet::default(), sample_documents()],
        &RerankOptions::new(),
    )?;
    assert!(results[0].result.is_empty());
    assert_eq!(results[1].result.len(), 5);
    assert_eq!(pipeline.model().calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn options_reach_the_scorer() -> anyhow::Result<()> {
    let pipeline = pipeline(OverlapScorer::default());
    let set = DocumentSet::from_iter([Document::new("A man is eating food.").with_title("Lunch")]);
    pipeline.rerank(
        &["food"],
        &[set],
        &RerankOptions::new().include_title(true).doc_maxlen(64).query_maxlen(16),
    )?;

    let seen = pipeline.model().seen.lock().unwrap();
    let (query, passages, limits) = &seen[0];
    assert_eq!(query, "food");
    assert_eq!(passages, &["Lunch\n\nA man is eating food.".to_string()]);
    assert_eq!(limits.doc_maxlen, 64);
    assert_eq!(limits.query_maxlen, 16);
    Ok(())
}

#[test]
fn scorer_failure_fails_the_whole_request() {
    let pipeline = pipeline(FailingScorer);
    let err = pipeline
        .rerank(&["a", "b"], &[sample_documents(), sample_documents()], &RerankOptions::new())
        .unwrap_err();
    assert!(matches!(err, RerankError::Scorer(_)));
    assert!(err.to_string().contains("device out of memory"));
}

#[test]
fn invalid_override_is_rejected() {
    let pipeline = pipeline(OverlapScorer::default());
    let err = pipeline
        .rerank(&["q"], &[sample_documents()], &RerankOptions::new().doc_maxlen(1))
        .unwrap_err();
    assert!(matches!(err, RerankError::InvalidConfig(_)));
    assert_eq!(pipeline.model().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn wire_request_round_trip() -> anyhow::Result<()> {
    let body = r#"{
        "queries": ["what is the color of the horse?"],
        "documents": [[
            {"document": {"text": "A man is riding a white horse on an enclosed ground.", "title": "riding", "docid": "3"}, "score": 3},
            {"document": {"text": "A man is eating food.", "title": "A", "docid": "0"}, "score": 0}
        ]]
    }"#;
    let request: RerankRequest = serde_json::from_str(body)?;

    let pipeline = pipeline(OverlapScorer::default());
    let prediction = pipeline.run(&request, &RerankOptions::new())?;
    let json = serde_json::to_value(&prediction)?;

    assert_eq!(json["results"][0]["sentence"], "what is the color of the horse?");
    assert_eq!(json["results"][0]["result"][0]["document"]["docid"], "3");
    assert_eq!(json["results"][0]["result"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn mismatched_wire_request_is_rejected() {
    let request = RerankRequest::new(vec!["a".into(), "b".into()], vec![sample_documents()]);
    let err = pipeline(OverlapScorer::default())
        .run(&request, &RerankOptions::new())
        .unwrap_err();
    assert!(matches!(err, RerankError::InputShape(_)));
}

#[test]
fn caller_scores_are_replaced() -> anyhow::Result<()> {
    let set = DocumentSet::new(vec![RankedDocument {
        document: Document::new("horse").with_docid("h"),
        score: 99.0,
    }]);
    let results = pipeline(OverlapScorer::default()).rerank(&["horse"], &[set], &RerankOptions::new())?;
    assert_eq!(results[0].result[0].score, 1.0);
    Ok(())
}
