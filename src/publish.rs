use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::format::{format_placeholder_unit, format_song_unit, tab_title, FormattedUnit};
use crate::matcher::MatchResult;
use crate::sink::{execute_with_retry, DocumentSink, SinkError, TabId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedTab {
    pub song: String,
    pub tab: TabId,
    pub matched: bool,
    pub operations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSummary {
    pub document_id: String,
    pub title: String,
    pub tabs: Vec<PublishedTab>,
}

/// Text and ranges for one setlist entry's tab.
pub fn unit_for(result: &MatchResult, cfg: &Config) -> FormattedUnit {
    if result.matched {
        format_song_unit(cfg.insert_anchor, &result.title, &result.notes, &result.body, &cfg.font(), &cfg.classifier())
    } else {
        format_placeholder_unit(cfg.insert_anchor, &cfg.font())
    }
}

/// Create the output document with one tab per setlist entry and fill each
/// tab in setlist order. Sink calls are retried on rate limiting; any other
/// failure stops the run and leaves the document as far as it got.
pub fn publish_document<S: DocumentSink>(
    sink: &mut S,
    results: &[MatchResult],
    cfg: &Config,
    timestamp: &str,
) -> Result<PublishSummary, SinkError> {
    let policy = cfg.retry;
    let title = cfg.document_title(timestamp);
    let document_id = execute_with_retry(&policy, || sink.create_document(&title))?;
    log::info!("{}", serde_json::json!({"tool": "create_document", "id": document_id, "title": title}));

    let defaults = execute_with_retry(&policy, || sink.list_tabs())?;

    let mut tab_ids = Vec::with_capacity(results.len());
    for r in results {
        let name = tab_title(&r.song, cfg.tab_title_max);
        tab_ids.push(execute_with_retry(&policy, || sink.add_tab(&name))?);
    }
    log::info!("{}", serde_json::json!({"tool": "add_tabs", "count": tab_ids.len()}));

    if !tab_ids.is_empty() {
        for default_tab in &defaults {
            if let Err(e) = execute_with_retry(&policy, || sink.delete_tab(default_tab)) {
                log::warn!("could not remove default tab {}: {}", default_tab, e);
            }
        }
    }

    let mut tabs = Vec::with_capacity(results.len());
    for (r, tab) in results.iter().zip(&tab_ids) {
        let unit = unit_for(r, cfg);
        let end = execute_with_retry(&policy, || sink.insert_text(tab, unit.anchor, &unit.text))?;
        if end < unit.anchor + unit.text_len() {
            log::warn!("tab {} reported end offset {} before inserted block end", tab, end);
        }
        for op in &unit.operations {
            execute_with_retry(&policy, || sink.apply(tab, op))?;
        }
        log::info!(
            "{}",
            serde_json::json!({"tool": "fill_tab", "song": r.song, "matched": r.matched, "operations": unit.operations.len()})
        );
        tabs.push(PublishedTab { song: r.song.clone(), tab: tab.clone(), matched: r.matched, operations: unit.operations.len() });
    }

    Ok(PublishSummary { document_id, title, tabs })
}
