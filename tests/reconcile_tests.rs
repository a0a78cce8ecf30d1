//! End-to-end reconciliation tests, in memory and through CSV files.

use std::fs;
use std::path::Path;

use work_reconciler::{
    reconcile_files, AuthorRow, LexiconAnalyzer, RawRecord, ReconcileConfig, ReconcileError,
    Reconciler, RecordStatus, RunPaths, WorkRow,
};

fn author(name: &str, payload: &str) -> AuthorRow {
    AuthorRow {
        author: name.to_string(),
        author_payload: payload.to_string(),
    }
}

fn work(author_id: &str, work_id: &str, title: &str) -> WorkRow {
    WorkRow {
        author_id: author_id.to_string(),
        work_id: work_id.to_string(),
        title: title.to_string(),
    }
}

fn record(author: &str, title: &str) -> RawRecord {
    RawRecord {
        author: author.to_string(),
        title: title.to_string(),
        url: "https://example.org/record".to_string(),
    }
}

fn vergil_catalog() -> (Vec<AuthorRow>, Vec<WorkRow>) {
    (
        vec![
            author("Vergilius", "{'author_id': 'VERG001', 'score': 0.97}"),
            author("Seneca", "{'author_id': 'SEN001'}"),
        ],
        vec![
            work("VERG001", "W1", "Aeneis"),
            work("VERG001", "W2", "Georgica"),
        ],
    )
}

// === Scenario A: resolved author with works on file ===

#[test]
fn test_aeneid_matches_with_lexicon() {
    let (authors, works) = vergil_catalog();
    let analyzer = LexiconAnalyzer::new().with_lexicon([("aeneidos", "aeneis")]);
    let reconciler = Reconciler::new(analyzer, &ReconcileConfig::default(), authors, works).unwrap();

    let resolution = reconciler
        .reconcile_record(&record("Vergilius", "Aeneidos Libri XII"))
        .unwrap();

    assert_eq!(resolution.status, RecordStatus::Matched);
    assert!(resolution.decisions.len() <= 3);

    let top = &resolution.decisions[0];
    assert_eq!(top.matched_title.as_deref(), Some("Aeneis"));
    assert_eq!(top.matched_work_id.as_deref(), Some("W1"));
    assert_eq!(top.author_id.as_deref(), Some("VERG001"));

    let score = top.confidence_score.unwrap();
    assert!(score > 0.25, "top score should clear the floor, got {score}");
    assert_eq!(top.flagged_for_review, score < 0.5);

    let scores: Vec<f64> = resolution
        .decisions
        .iter()
        .map(|d| d.confidence_score.unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_aeneid_outcome_consistent_with_threshold() {
    let (authors, works) = vergil_catalog();
    let reconciler =
        Reconciler::new(LexiconAnalyzer::new(), &ReconcileConfig::default(), authors, works).unwrap();

    let resolution = reconciler
        .reconcile_record(&record("Vergilius", "Aeneidos Libri XII"))
        .unwrap();

    match resolution.status {
        RecordStatus::Matched => {
            let top = &resolution.decisions[0];
            assert_eq!(top.matched_title.as_deref(), Some("Aeneis"));
            assert!(top.confidence_score.unwrap() > 0.25);
        }
        RecordStatus::NoConfidentMatch => {
            assert_eq!(resolution.decisions.len(), 1);
            assert!(resolution.decisions[0].matched_title.is_none());
            assert!(resolution.decisions[0].flagged_for_review);
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn test_exact_title_is_confident() {
    let (authors, works) = vergil_catalog();
    let reconciler =
        Reconciler::new(LexiconAnalyzer::new(), &ReconcileConfig::default(), authors, works).unwrap();

    let resolution = reconciler
        .reconcile_record(&record("Vergilius", "Georgica : libri quattuor"))
        .unwrap();
    let top = &resolution.decisions[0];
    assert_eq!(top.matched_work_id.as_deref(), Some("W2"));
    assert!((top.confidence_score.unwrap() - 1.0).abs() < 1e-9);
    assert!(!top.flagged_for_review);
}

// === Scenario B: author missing from the inference table ===

#[test]
fn test_unknown_author_single_flagged_row() {
    let (authors, works) = vergil_catalog();
    let reconciler =
        Reconciler::new(LexiconAnalyzer::new(), &ReconcileConfig::default(), authors, works).unwrap();

    let resolution = reconciler
        .reconcile_record(&record("Homerus", "Ilias"))
        .unwrap();

    assert_eq!(resolution.status, RecordStatus::UnknownAuthor);
    assert_eq!(resolution.decisions.len(), 1);
    let row = &resolution.decisions[0];
    assert!(row.author_id.is_none());
    assert!(row.matched_title.is_none());
    assert!(row.confidence_score.is_none());
    assert!(row.flagged_for_review);
}

// === Scenario C: resolved author without works ===

#[test]
fn test_author_without_works_single_flagged_row() {
    let (authors, works) = vergil_catalog();
    let reconciler =
        Reconciler::new(LexiconAnalyzer::new(), &ReconcileConfig::default(), authors, works).unwrap();

    let resolution = reconciler
        .reconcile_record(&record("Seneca", "Epistulae morales ad Lucilium"))
        .unwrap();

    assert_eq!(resolution.status, RecordStatus::NoCandidates);
    assert_eq!(resolution.decisions.len(), 1);
    let row = &resolution.decisions[0];
    assert_eq!(row.author_id.as_deref(), Some("SEN001"));
    assert!(row.matched_title.is_none());
    assert!(row.matched_work_id.is_none());
    assert!(row.confidence_score.is_none());
    assert!(row.flagged_for_review);
}

// === Configuration ===

#[test]
fn test_config_overrides_thresholds() {
    let (authors, works) = vergil_catalog();
    let config = ReconcileConfig::from_toml_str(
        r#"
[selection]
confidence_floor = 0.99
review_floor = 1.0
max_candidates = 1
"#,
    )
    .unwrap();
    let reconciler = Reconciler::new(LexiconAnalyzer::new(), &config, authors, works).unwrap();

    let exact = reconciler
        .reconcile_record(&record("Vergilius", "Georgica"))
        .unwrap();
    assert_eq!(exact.status, RecordStatus::Matched);
    assert_eq!(exact.decisions.len(), 1);

    let loose = reconciler
        .reconcile_record(&record("Vergilius", "Georgicon libri"))
        .unwrap();
    assert_eq!(loose.status, RecordStatus::NoConfidentMatch);
}

// === File-based runs ===

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_reconcile_files_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let records = write(
        dir.path(),
        "records.csv",
        "author,title,url\n\
         Vergilius,Georgica : libri quattuor,https://example.org/1\n\
         Homerus,Ilias,https://example.org/2\n\
         Seneca,\"Epistulae morales, ad Lucilium\",https://example.org/3\n\
         Broken,Aeneis,https://example.org/4\n",
    );
    let authors = write(
        dir.path(),
        "authors.csv",
        "author,author_payload\n\
         Vergilius,\"{'author_id': 'VERG001'}\"\n\
         Seneca,\"{'author_id': 'SEN001'}\"\n\
         Broken,\"{'author_id': \"\n",
    );
    let works = write(
        dir.path(),
        "works.csv",
        "author_id,work_id,title\n\
         VERG001,W1,Aeneis\n\
         VERG001,W2,Georgica\n",
    );
    let output = dir.path().join("decisions.csv");

    let paths = RunPaths {
        records: &records,
        authors: &authors,
        works: &works,
        output: &output,
    };
    let summary = reconcile_files(&paths, &ReconcileConfig::default()).unwrap();

    assert_eq!(summary.records, 4);
    assert_eq!(summary.unknown_author, 1);
    assert_eq!(summary.no_candidates, 1);
    assert_eq!(summary.malformed_payload, 1);
    assert_eq!(summary.matched, 1);

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec![
            "author",
            "title",
            "url",
            "author_id",
            "matched_title",
            "matched_work_id",
            "confidence_score",
            "flagged_for_review"
        ]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), summary.decisions);

    let first = &rows[0];
    assert_eq!(&first[0], "Vergilius");
    assert_eq!(&first[4], "Georgica");
    assert_eq!(&first[6], "1.000");
    assert_eq!(&first[7], "False");

    let homer = rows.iter().find(|r| &r[0] == "Homerus").unwrap();
    assert_eq!(&homer[3], "");
    assert_eq!(&homer[6], "");
    assert_eq!(&homer[7], "True");

    let seneca = rows.iter().find(|r| &r[0] == "Seneca").unwrap();
    assert_eq!(&seneca[1], "Epistulae morales, ad Lucilium");
    assert_eq!(&seneca[3], "SEN001");
    assert_eq!(&seneca[7], "True");
}

#[test]
fn test_missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let records = write(dir.path(), "records.csv", "author,title,url\n");
    let works = write(dir.path(), "works.csv", "author_id,work_id,title\n");
    let authors = dir.path().join("missing.csv");
    let output = dir.path().join("decisions.csv");

    let paths = RunPaths {
        records: &records,
        authors: &authors,
        works: &works,
        output: &output,
    };
    let result = reconcile_files(&paths, &ReconcileConfig::default());

    assert!(matches!(result, Err(ReconcileError::Dataset { .. })));
    assert!(!output.exists());
}

#[test]
fn test_duplicate_work_ids_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let records = write(dir.path(), "records.csv", "author,title,url\nVergilius,Aeneis,u\n");
    let authors = write(
        dir.path(),
        "authors.csv",
        "author,author_payload\nVergilius,\"{'author_id': 'VERG001'}\"\n",
    );
    let works = write(
        dir.path(),
        "works.csv",
        "author_id,work_id,title\nVERG001,W1,Aeneis\nVERG001,W1,Georgica\n",
    );
    let output = dir.path().join("decisions.csv");

    let paths = RunPaths {
        records: &records,
        authors: &authors,
        works: &works,
        output: &output,
    };
    let result = reconcile_files(&paths, &ReconcileConfig::default());
    assert!(matches!(result, Err(ReconcileError::DuplicateWorkId(id)) if id == "W1"));
    assert!(!output.exists());
}
