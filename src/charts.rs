use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::layout::{group_glyphs_into_lines, reconstruct_body, Glyph, LayoutConfig};
use crate::poppler::PageContent;

static PAGE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\s*$").unwrap());

/// Title, notes line and spacing-preserving body of one chart page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub page: u32,
    pub title: String,
    pub notes: String,
    pub body: String,
}

fn is_content_line(line: &str) -> bool {
    !line.trim().is_empty() && !PAGE_NUMBER_RE.is_match(line)
}

/// Parse one chart page. Returns `None` when the page has fewer than two
/// non-empty, non-page-number lines.
pub fn parse_chart_page(page: u32, text: &str, glyphs: &[Glyph], cfg: &LayoutConfig) -> Option<ChartRecord> {
    let lines: Vec<&str> = text.split('\n').filter(|l| is_content_line(l)).collect();
    if lines.len() < 2 {
        return None;
    }
    let title = lines[0].trim().to_string();
    let notes = lines[1].trim().to_string();

    let body = if !glyphs.is_empty() && lines.len() > 2 {
        let clusters: Vec<_> = group_glyphs_into_lines(glyphs, cfg.y_tolerance)
            .into_iter()
            .filter(|lc| !PAGE_NUMBER_RE.is_match(&lc.raw_text()))
            .collect();
        if clusters.len() > 2 {
            reconstruct_body(&clusters[2..], cfg)
        } else {
            String::new()
        }
    } else {
        // no glyph data: degrade to the plain extracted lines
        lines[2..].join("\n")
    };

    Some(ChartRecord { page, title, notes, body })
}

/// Parse every page of the chart book, keyed by 1-based page number.
pub fn extract_charts(pages: &[PageContent], cfg: &LayoutConfig) -> BTreeMap<u32, ChartRecord> {
    let mut charts = BTreeMap::new();
    for p in pages {
        match parse_chart_page(p.number, &p.text, &p.glyphs, cfg) {
            Some(rec) => {
                log::debug!("page {}: chart {:?}", p.number, rec.title);
                charts.insert(p.number, rec);
            }
            None => log::debug!("page {}: skipped, fewer than two usable lines", p.number),
        }
    }
    charts
}
