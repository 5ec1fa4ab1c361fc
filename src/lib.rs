use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod charts;
pub mod chords;
pub mod config;
pub mod format;
pub mod layout;
pub mod matcher;
pub mod poppler;
pub mod publish;
pub mod setlist;
pub mod sink;

pub use charts::{extract_charts, parse_chart_page, ChartRecord};
pub use chords::{is_chord_line, ChordLineClassifier, ChordSymbols, ChordToken, NashvilleNumbers};
pub use config::{load_config, Config, ConfigError};
pub use format::{
    format_placeholder_unit, format_song_unit, tab_title, FontSpec, FormatKind, FormatOperation, FormattedUnit,
};
pub use layout::{
    column_indices, detect_char_pitch, group_glyphs_into_lines, insert_gap_lines, reconstruct_body, reconstruct_line,
    Glyph, LayoutConfig, LineCluster,
};
pub use matcher::{match_songs_to_charts, match_stats, similarity, MatchReport, MatchResult, MatchStats};
pub use poppler::{check_deps, install_help_for, parse_bbox_xhtml, poppler_extract, DepsResult, PageContent, PopplerError};
pub use publish::{publish_document, PublishSummary, PublishedTab};
pub use setlist::extract_setlist;
pub use sink::{execute_with_retry, DocumentSink, PlanSink, PlanTab, RetryPolicy, SinkError, TabId};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("NoSongs: no songs found in setlist")]
    NoSongs,
    #[error("NoCharts: no chart pages found")]
    NoCharts,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pdf(#[from] PopplerError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Tokenize the setlist, parse the chart pages and match them.
/// Empty inputs surface as `NoSongs` / `NoCharts`.
pub fn prepare_matches(setlist_pages: &[String], chart_pages: &[PageContent], cfg: &Config) -> Result<MatchReport, RunError> {
    let songs = extract_setlist(setlist_pages);
    log::info!("{}", serde_json::json!({"tool": "extract_setlist", "songs": songs.len()}));
    if songs.is_empty() {
        return Err(RunError::NoSongs);
    }

    let charts: BTreeMap<u32, ChartRecord> = extract_charts(chart_pages, &cfg.layout());
    log::info!("{}", serde_json::json!({"tool": "extract_charts", "pages": chart_pages.len(), "charts": charts.len()}));
    if charts.is_empty() {
        return Err(RunError::NoCharts);
    }

    let report = match_songs_to_charts(&songs, &charts, cfg.match_threshold);
    let stats = match_stats(&report.results);
    log::info!(
        "{}",
        serde_json::json!({"tool": "match_songs", "threshold": cfg.match_threshold, "matched": stats.matched, "total": stats.total})
    );
    Ok(report)
}

/// Plain rendering of a plan: one section per tab with its text in a fence.
pub fn render_markdown(plan: &PlanSink) -> String {
    let mut out = format!("# {}\n", plan.title);
    for tab in &plan.tabs {
        out.push_str(&format!("\n## {}\n\n```\n{}\n```\n", tab.title, tab.text.trim_end_matches('\n')));
    }
    out
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("WriteFailed: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitPaths {
    pub md_path: String,
    pub plan_path: String,
}

/// Atomically write the markdown rendering and the JSON plan into outdir.
pub fn emit_document(plan: &PlanSink, meta: &serde_json::Value, outdir: &str, doc_id: &str) -> Result<EmitPaths, EmitError> {
    std::fs::create_dir_all(outdir).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let md_path = Path::new(outdir).join(format!("{}.md", doc_id));
    let plan_path = Path::new(outdir).join(format!("{}.plan.json", doc_id));

    // fingerprint excludes timestamps so identical runs compare equal
    let mut body = serde_json::json!({ "document": plan, "meta": meta });
    let mut normalized = body.clone();
    if let Some(m) = normalized.get_mut("meta").and_then(|m| m.as_object_mut()) {
        m.remove("timestamps");
    }
    let norm_bytes = serde_json::to_vec(&normalized).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("meta_fingerprint".to_string(), serde_json::json!(sha256_hex(&norm_bytes)));
    }

    let pid = std::process::id();
    let md_tmp = md_path.with_extension(format!("md.tmp.{}", pid));
    let plan_tmp = plan_path.with_extension(format!("json.tmp.{}", pid));

    std::fs::write(&md_tmp, render_markdown(plan)).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let plan_bytes = serde_json::to_vec_pretty(&body).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::write(&plan_tmp, plan_bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    std::fs::rename(&md_tmp, &md_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::rename(&plan_tmp, &plan_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    Ok(EmitPaths { md_path: md_path.to_string_lossy().to_string(), plan_path: plan_path.to_string_lossy().to_string() })
}

/// Write one intermediate step as pretty JSON into `dir`, creating it first.
pub fn write_step_artifact(dir: &Path, name: &str, value: &serde_json::Value) -> Result<PathBuf, EmitError> {
    std::fs::create_dir_all(dir).map_err(|e| EmitError::WriteFailed(format!("{}: {}", dir.display(), e)))?;
    let path = dir.join(name);
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::write(&path, bytes).map_err(|e| EmitError::WriteFailed(format!("{}: {}", path.display(), e)))?;
    Ok(path)
}

// Utility to compute sha256 hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}
