//! Batch execution: ordering, id correlation, failure isolation, halting
//! and determinism across worker counts.

use rapid_textnorm::prelude::*;

fn pipeline(max_tokens: usize) -> Pipeline {
    let lemmas = MappingTable::from_pairs(TableKind::Lemma, [("running", "run"), ("ran", "run")])
        .unwrap()
        .shared();
    Pipeline::builder()
        .stage(Tokenizer::new().with_max_tokens(max_tokens))
        .stage(ToLowerCase::new())
        .stage(TableSubstitution::lemmatizer(lemmas).unwrap())
        .stage(PorterStemmer)
        .build()
        .unwrap()
}

fn corpus(n: usize) -> Vec<Document> {
    let samples = [
        "Running quickly through the forests",
        "She ran; he was running",
        "Generalizations are hopeful",
        "",
        "Connected connections, connecting connectors!",
    ];
    (0..n)
        .map(|i| Document::new(format!("doc-{i}"), samples[i % samples.len()]))
        .collect()
}

fn executor(workers: usize) -> BatchExecutor {
    BatchExecutor::with_config(pipeline(64), ExecutorConfig::default().with_workers(workers)).unwrap()
}

#[test]
fn test_results_keep_submission_order_and_ids() {
    let docs = corpus(200);
    let expected: Vec<_> = docs.iter().map(|d| d.id.clone()).collect();
    let results: Vec<_> = executor(4).process(docs).collect();
    let ids: Vec<_> = results.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, expected);
    assert!(results.iter().all(|r| r.is_ok()));
}

#[test]
fn test_completion_order_still_correlates_ids() {
    let exec = BatchExecutor::with_config(
        pipeline(64),
        ExecutorConfig::default()
            .with_workers(4)
            .with_order(ResultOrder::Completion),
    )
    .unwrap();
    let reference = pipeline(64);
    for item in exec.process(corpus(60)) {
        let idx: usize = item.id.trim_start_matches("doc-").parse().unwrap();
        let expected = reference.run_document(corpus(idx + 1).pop().unwrap());
        assert_eq!(item.value(), expected.value(), "mismatch for {}", item.id);
    }
}

#[test]
fn test_one_bad_document_does_not_affect_others() {
    let exec = BatchExecutor::with_config(pipeline(3), ExecutorConfig::default().with_workers(3)).unwrap();
    let docs = vec![
        Document::new("d1", "one two"),
        Document::new("d2", "three"),
        Document::new("d3", "far too many tokens here"),
        Document::new("d4", "four five six"),
        Document::new("d5", "seven"),
    ];
    let results: Vec<_> = exec.process(docs).collect();

    assert_eq!(results.len(), 5);
    let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).map(|r| r.id.as_str()).collect();
    assert_eq!(failed, vec!["d3"]);
    match results[2].error() {
        Some(PipelineError::Processing { stage, .. }) => assert_eq!(*stage, "tokenizer"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(results[3].tokens().unwrap(), ["four", "five", "six"]);
}

#[test]
fn test_halt_policy_ends_batch_at_first_failure() {
    let exec = BatchExecutor::with_config(
        pipeline(3),
        ExecutorConfig::default()
            .with_workers(2)
            .with_failure_policy(FailurePolicy::Halt),
    )
    .unwrap();
    let docs = vec![
        Document::new("d1", "ok"),
        Document::new("d2", "a b c d"),
        Document::new("d3", "ok"),
    ];
    let mut results = exec.process(docs);
    let ids: Vec<_> = results.by_ref().map(|r| r.id).collect();
    assert_eq!(ids, vec!["d1", "d2"]);
    assert!(results.halted());
}

#[test]
fn test_same_results_for_any_worker_count() {
    let collect = |workers: usize| -> Vec<(String, Option<Vec<String>>)> {
        executor(workers)
            .process(corpus(120))
            .map(|r| (r.id.clone(), r.tokens().map(|t| t.to_vec())))
            .collect()
    };
    let sequential = collect(1);
    assert_eq!(sequential, collect(2));
    assert_eq!(sequential, collect(8));
}

#[test]
fn test_empty_batch() {
    assert_eq!(executor(2).process(Vec::new()).count(), 0);
    assert_eq!(executor(1).process(Vec::new()).count(), 0);
}

#[test]
fn test_executor_from_spec_json() {
    let spec = PipelineSpec::from_json(
        r#"{
            "v": 1,
            "stages": [{ "kind": "tokenizer" }, { "kind": "to_lower_case" }, { "kind": "post_processor" }],
            "executor": { "workers": 2, "order": "submission" }
        }"#,
    )
    .unwrap();
    let exec = spec.executor(&TableRegistry::new()).unwrap();
    let results: Vec<_> = exec
        .process(vec![Document::new("a", "Hi There"), Document::new("b", "")])
        .collect();
    assert_eq!(results[0].value().unwrap().as_record().unwrap()["token_count"], 2);
    assert_eq!(results[1].value().unwrap().as_record().unwrap()["token_count"], 0);
}

#[test]
fn test_long_y_run_does_not_abort_batch() {
    let long = "y".repeat(200_000);
    let docs = vec![
        Document::new("d1", "connected things"),
        Document::new("d2", long.as_str()),
        Document::new("d3", "Running"),
    ];
    let results: Vec<_> = executor(2).process(docs).collect();

    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2", "d3"]);
    assert!(results.iter().all(|r| r.is_ok()));
    let stemmed = &results[1].tokens().unwrap()[0];
    assert_eq!(stemmed.len(), long.len());
    assert!(stemmed.ends_with('i'));
    assert_eq!(results[2].tokens().unwrap(), ["run"]);
}
