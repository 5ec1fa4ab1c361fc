use std::cell::Cell;
use std::fs;
use std::time::Duration;

use setlist_charts::{
    emit_document, execute_with_retry, publish_document, write_step_artifact, Config, DocumentSink, EmitError, FontSpec,
    FormatKind, FormatOperation, MatchResult, PlanSink, RetryPolicy, SinkError, TabId,
};

fn fast_retry() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, base_delay_ms: 0, max_delay_ms: 0 }
}

fn test_config() -> Config {
    Config { retry: fast_retry(), ..Config::default() }
}

fn matched(song: &str, page: u32, body: &str) -> MatchResult {
    MatchResult {
        song: song.to_string(),
        matched: true,
        page: Some(page),
        score: 100,
        title: song.to_string(),
        notes: "Key of A".to_string(),
        body: body.to_string(),
    }
}

fn unmatched(song: &str) -> MatchResult {
    MatchResult {
        song: song.to_string(),
        matched: false,
        page: None,
        score: 0,
        title: String::new(),
        notes: String::new(),
        body: String::new(),
    }
}

/// Wraps a PlanSink and injects failures into `insert_text`.
struct FlakySink {
    inner: PlanSink,
    rate_limits_left: u32,
    fail_insert_on_call: Option<u32>,
    insert_calls: u32,
}

impl FlakySink {
    fn new() -> Self {
        FlakySink { inner: PlanSink::new(), rate_limits_left: 0, fail_insert_on_call: None, insert_calls: 0 }
    }
}

impl DocumentSink for FlakySink {
    fn create_document(&mut self, title: &str) -> Result<String, SinkError> {
        self.inner.create_document(title)
    }
    fn list_tabs(&self) -> Result<Vec<TabId>, SinkError> {
        self.inner.list_tabs()
    }
    fn add_tab(&mut self, title: &str) -> Result<TabId, SinkError> {
        self.inner.add_tab(title)
    }
    fn delete_tab(&mut self, tab: &TabId) -> Result<(), SinkError> {
        self.inner.delete_tab(tab)
    }
    fn insert_text(&mut self, tab: &TabId, offset: usize, text: &str) -> Result<usize, SinkError> {
        if self.rate_limits_left > 0 {
            self.rate_limits_left -= 1;
            return Err(SinkError::RateLimited("429".into()));
        }
        self.insert_calls += 1;
        if self.fail_insert_on_call == Some(self.insert_calls) {
            return Err(SinkError::NotFound(tab.clone()));
        }
        self.inner.insert_text(tab, offset, text)
    }
    fn apply(&mut self, tab: &TabId, op: &FormatOperation) -> Result<(), SinkError> {
        self.inner.apply(tab, op)
    }
}

#[test]
fn retry_recovers_from_rate_limits() {
    let calls = Cell::new(0);
    let out = execute_with_retry(&fast_retry(), || {
        calls.set(calls.get() + 1);
        if calls.get() < 3 { Err(SinkError::RateLimited("slow down".into())) } else { Ok(7) }
    });
    assert_eq!(out.unwrap(), 7);
    assert_eq!(calls.get(), 3);
}

#[test]
fn retry_gives_up_after_max_attempts() {
    let calls = Cell::new(0);
    let out: Result<(), SinkError> = execute_with_retry(&fast_retry(), || {
        calls.set(calls.get() + 1);
        Err(SinkError::RateLimited("slow down".into()))
    });
    assert!(matches!(out, Err(SinkError::RateLimited(_))));
    assert_eq!(calls.get(), 3);
}

#[test]
fn other_errors_are_not_retried() {
    let calls = Cell::new(0);
    let out: Result<(), SinkError> = execute_with_retry(&fast_retry(), || {
        calls.set(calls.get() + 1);
        Err(SinkError::Rejected("bad range".into()))
    });
    assert!(matches!(out, Err(SinkError::Rejected(_))));
    assert_eq!(calls.get(), 1);
}

#[test]
fn backoff_doubles_and_caps() {
    let p = RetryPolicy::default();
    assert_eq!(p.delay_for(0), Duration::from_secs(2));
    assert_eq!(p.delay_for(1), Duration::from_secs(4));
    assert_eq!(p.delay_for(5), Duration::from_secs(60));
    assert_eq!(p.delay_for(80), Duration::from_secs(60));
}

#[test]
fn plan_sink_rejects_out_of_range_operations() {
    let mut sink = PlanSink::new();
    sink.create_document("doc").unwrap();
    let tab = sink.list_tabs().unwrap().remove(0);
    let end = sink.insert_text(&tab, 1, "abc\n").unwrap();
    assert_eq!(end, 6);
    let ok = FormatOperation { kind: FormatKind::Style(FontSpec::default()), start: 1, end: 5 };
    let bad = FormatOperation { kind: FormatKind::Emphasis, start: 3, end: 9 };
    assert!(sink.apply(&tab, &ok).is_ok());
    assert!(matches!(sink.apply(&tab, &bad), Err(SinkError::Rejected(_))));
    assert!(matches!(sink.insert_text(&tab, 0, "x"), Err(SinkError::Rejected(_))));
    assert!(matches!(sink.apply(&"t.99".to_string(), &ok), Err(SinkError::NotFound(_))));
}

#[test]
fn publish_builds_one_tab_per_entry() {
    let results = vec![matched("Wagon Wheel", 3, "G   D\nHeaded down south"), unmatched("Mystery Song")];
    let mut sink = PlanSink::new();
    let summary = publish_document(&mut sink, &results, &test_config(), "20260101_120000").unwrap();

    assert_eq!(summary.title, "Setlist_20260101_120000");
    assert_eq!(sink.title, summary.title);
    let titles: Vec<&str> = sink.tabs.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Wagon Wheel", "Mystery Song"]);

    let first = &sink.tabs[0];
    assert_eq!(first.text, "Wagon Wheel\nKey of A\n\nG   D\nHeaded down south\n");
    assert_eq!(first.operations.len(), 4);
    assert_eq!(first.operations[0].kind, FormatKind::Style(FontSpec::default()));

    let second = sink.tab(&summary.tabs[1].tab).unwrap();
    assert_eq!(second.text, "[No chart found]\n");
    assert_eq!(second.operations.len(), 1);
    assert_eq!(summary.tabs.iter().map(|t| t.matched).collect::<Vec<_>>(), vec![true, false]);
}

#[test]
fn publish_retries_rate_limited_inserts() {
    let mut sink = FlakySink::new();
    sink.rate_limits_left = 2;
    let results = vec![matched("Jolene", 1, "Am C")];
    publish_document(&mut sink, &results, &test_config(), "ts").unwrap();
    assert_eq!(sink.inner.tabs[0].text, "Jolene\nKey of A\n\nAm C\n");
}

#[test]
fn publish_stops_at_first_hard_failure() {
    let mut sink = FlakySink::new();
    sink.fail_insert_on_call = Some(2);
    let results = vec![matched("Jolene", 1, "Am C"), matched("Wagon Wheel", 2, "G D"), unmatched("Later")];
    let err = publish_document(&mut sink, &results, &test_config(), "ts").unwrap_err();
    assert!(matches!(err, SinkError::NotFound(_)));

    // partial output is left in place
    assert_eq!(sink.inner.tabs.len(), 3);
    assert!(!sink.inner.tabs[0].text.is_empty());
    assert!(sink.inner.tabs[1].text.is_empty());
    assert!(sink.inner.tabs[2].text.is_empty());
}

#[test]
fn empty_setlist_keeps_default_tab() {
    let mut sink = PlanSink::new();
    let summary = publish_document(&mut sink, &[], &test_config(), "ts").unwrap();
    assert!(summary.tabs.is_empty());
    assert_eq!(sink.tabs.len(), 1);
    assert_eq!(sink.tabs[0].title, "Tab 1");
}

#[test]
fn emit_document_writes_markdown_and_stable_plan() {
    let results = vec![matched("Wagon Wheel", 3, "G   D\nHeaded down south")];
    let mut sink = PlanSink::new();
    publish_document(&mut sink, &results, &test_config(), "ts").unwrap();

    let td = tempfile::tempdir().unwrap();
    let out_a = td.path().join("a");
    let out_b = td.path().join("b");
    let meta_a = serde_json::json!({"threshold": 70, "timestamps": {"started_ms": 1, "finished_ms": 2}});
    let meta_b = serde_json::json!({"threshold": 70, "timestamps": {"started_ms": 5, "finished_ms": 9}});

    let a = emit_document(&sink, &meta_a, out_a.to_str().unwrap(), "setlist").expect("emit ok");
    let b = emit_document(&sink, &meta_b, out_b.to_str().unwrap(), "setlist").expect("emit ok");

    let md = fs::read_to_string(&a.md_path).unwrap();
    assert!(md.contains("## Wagon Wheel"));
    assert!(md.contains("G   D\nHeaded down south"));

    let plan_a: serde_json::Value = serde_json::from_str(&fs::read_to_string(&a.plan_path).unwrap()).unwrap();
    let plan_b: serde_json::Value = serde_json::from_str(&fs::read_to_string(&b.plan_path).unwrap()).unwrap();
    assert_eq!(plan_a["meta_fingerprint"], plan_b["meta_fingerprint"]);
    assert_eq!(plan_a["document"]["tabs"][0]["operations"].as_array().map(Vec::len), Some(4));
    assert_eq!(plan_a["document"]["tabs"][0]["operations"][0]["kind"]["style"]["family"], "Consolas");
}

#[test]
fn publish_applies_configured_font() {
    let cfg = Config { font_family: "Courier New".to_string(), font_size_pt: 10, ..test_config() };
    let results = vec![matched("Jolene", 1, "Am C"), unmatched("Mystery Song")];
    let mut sink = PlanSink::new();
    publish_document(&mut sink, &results, &cfg, "ts").unwrap();

    let font = FontSpec { family: "Courier New".to_string(), size_pt: 10 };
    for tab in &sink.tabs {
        assert_eq!(tab.operations[0].kind, FormatKind::Style(font.clone()), "tab {}", tab.title);
    }
}

#[test]
fn step_artifacts_report_unwritable_dirs() {
    let td = tempfile::tempdir().unwrap();
    let value = serde_json::json!(["Jolene"]);
    let path = write_step_artifact(&td.path().join("artifacts"), "step1_setlist.json", &value).expect("written");
    assert!(fs::read_to_string(&path).unwrap().contains("Jolene"));

    let blocker = td.path().join("blocker");
    fs::write(&blocker, "file, not a dir").unwrap();
    let err = write_step_artifact(&blocker.join("artifacts"), "step1_setlist.json", &value).unwrap_err();
    assert!(matches!(err, EmitError::WriteFailed(_)));
}
