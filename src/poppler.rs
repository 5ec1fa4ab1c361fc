use std::path::Path;
use std::process::Command;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::Glyph;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepsResult {
    pub ok: bool,
    pub missing: Vec<String>,
}

/// Check poppler CLI dependencies.
/// - Required: pdftotext (text and glyph boxes)
/// - Optional: pdfinfo (page count for per-page extraction)
pub fn check_deps() -> DepsResult {
    let mut missing = Vec::new();

    let has_pdftotext = which::which("pdftotext").is_ok();
    if !has_pdftotext {
        missing.push("pdftotext".to_string());
    }
    if which::which("pdfinfo").is_err() {
        missing.push("pdfinfo".to_string());
    }

    DepsResult { ok: has_pdftotext, missing }
}

/// Install hint for missing deps.
pub fn install_help_for(missing: &[String]) -> String {
    if !missing.iter().any(|m| m == "pdftotext" || m == "pdfinfo") {
        return String::new();
    }
    "Dependency missing. Install poppler:\n  apt install poppler-utils   (Debian/Ubuntu)\n  brew install poppler        (macOS)".to_string()
}

#[derive(Debug, Error)]
pub enum PopplerError {
    #[error("FileNotFound: {0}")]
    FileNotFound(String),
    #[error("EncryptedPDF: {0}")]
    EncryptedPDF(String),
    #[error("PopplerError: {0}")]
    Other(String),
}

/// Plain text and positioned glyphs of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// 1-based.
    pub number: u32,
    pub text: String,
    pub glyphs: Vec<Glyph>,
}

fn run_poppler(cmd: &mut Command, path: &Path, what: &str) -> Result<String, PopplerError> {
    let out = cmd.output().map_err(|e| PopplerError::Other(e.to_string()))?;
    if !out.status.success() {
        let err = String::from_utf8_lossy(&out.stderr).to_lowercase();
        if err.contains("encrypt") || err.contains("password") {
            return Err(PopplerError::EncryptedPDF(path.display().to_string()));
        }
        return Err(PopplerError::Other(format!("{} failed", what)));
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

fn page_count(path: &Path) -> Result<Option<usize>, PopplerError> {
    if which::which("pdfinfo").is_err() {
        return Ok(None);
    }
    let info = match run_poppler(Command::new("pdfinfo").arg(path), path, "pdfinfo") {
        Ok(s) => s,
        Err(PopplerError::EncryptedPDF(p)) => return Err(PopplerError::EncryptedPDF(p)),
        Err(_) => return Ok(None),
    };
    Ok(info
        .lines()
        .find_map(|l| l.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse::<usize>().ok()))
}

/// Extract plain text pages with pdftotext.
/// Uses per-page extraction when pdfinfo reports a page count, otherwise a
/// single pass split on form feeds.
pub fn extract_text_pages(path: &Path) -> Result<Vec<String>, PopplerError> {
    if !path.exists() {
        return Err(PopplerError::FileNotFound(path.display().to_string()));
    }

    if let Some(n_pages) = page_count(path)? {
        let mut pages = Vec::with_capacity(n_pages);
        for i in 1..=n_pages {
            let mut cmd = Command::new("pdftotext");
            cmd.arg("-q").arg("-nopgbrk");
            cmd.arg("-f").arg(i.to_string());
            cmd.arg("-l").arg(i.to_string());
            cmd.arg(path).arg("-");
            pages.push(run_poppler(&mut cmd, path, &format!("pdftotext page {}", i))?);
        }
        return Ok(pages);
    }

    let mut cmd = Command::new("pdftotext");
    cmd.arg("-q").arg(path).arg("-");
    let s = run_poppler(&mut cmd, path, "pdftotext")?;
    let mut pages: Vec<String> = s.split('\u{000C}').map(|x| x.to_string()).collect();
    while matches!(pages.last(), Some(last) if last.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}

/// Horizontal extent and top edge of one `<word>` box.
#[derive(Debug, Clone, Copy)]
struct WordBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
}

impl WordBox {
    fn from_start(e: &BytesStart) -> Option<WordBox> {
        let (mut x_min, mut y_min, mut x_max) = (None, None, None);
        for attr in e.attributes().flatten() {
            let value = attr.unescape_value().ok().and_then(|v| v.trim().parse::<f64>().ok());
            match attr.key.as_ref() {
                b"xMin" => x_min = value,
                b"yMin" => y_min = value,
                b"xMax" => x_max = value,
                _ => {}
            }
        }
        Some(WordBox { x_min: x_min?, y_min: y_min?, x_max: x_max? })
    }

    /// Divide the box evenly among the characters of `text`.
    fn push_glyphs(&self, text: &str, out: &mut Vec<Glyph>) {
        let n = text.chars().count();
        if n == 0 {
            return;
        }
        let step = (self.x_max - self.x_min) / n as f64;
        for (i, ch) in text.chars().enumerate() {
            out.push(Glyph::new(ch.to_string(), self.x_min + step * i as f64, self.y_min));
        }
    }
}

/// Decode `pdftotext -bbox` output into per-page glyphs.
/// Each word box is divided evenly among its characters. Parsing stops at the
/// first malformed element; pages read up to that point are kept.
pub fn parse_bbox_xhtml(xhtml: &str) -> Vec<Vec<Glyph>> {
    let mut reader = Reader::from_str(xhtml);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut pages: Vec<Vec<Glyph>> = Vec::new();
    let mut word: Option<WordBox> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => pages.push(Vec::new()),
                b"word" => word = WordBox::from_start(&e),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"page" => pages.push(Vec::new()),
            Ok(Event::Text(e)) => {
                if let (Some(w), Some(page)) = (word, pages.last_mut()) {
                    match e.unescape() {
                        Ok(text) => w.push_glyphs(&text, page),
                        Err(err) => log::warn!("bbox word text: {:?}", err),
                    }
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => word = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("bbox parsing error: {:?}", e);
                break;
            }
            _ => {}
        }
    }
    pages
}

/// Extract per-page glyphs via `pdftotext -bbox`.
pub fn extract_glyph_pages(path: &Path) -> Result<Vec<Vec<Glyph>>, PopplerError> {
    if !path.exists() {
        return Err(PopplerError::FileNotFound(path.display().to_string()));
    }
    let mut cmd = Command::new("pdftotext");
    cmd.arg("-q").arg("-bbox").arg(path).arg("-");
    let xhtml = run_poppler(&mut cmd, path, "pdftotext -bbox")?;
    Ok(parse_bbox_xhtml(&xhtml))
}

/// Extract text and glyphs for every page. Glyph extraction failures are
/// tolerated: affected pages carry no glyphs and fall back to plain text.
pub fn poppler_extract(path: &Path) -> Result<Vec<PageContent>, PopplerError> {
    let texts = extract_text_pages(path)?;
    let mut glyph_pages = match extract_glyph_pages(path) {
        Ok(g) => g,
        Err(e) => {
            log::warn!("glyph extraction failed for {}: {}", path.display(), e);
            Vec::new()
        }
    };
    glyph_pages.resize(texts.len(), Vec::new());

    Ok(texts
        .into_iter()
        .zip(glyph_pages)
        .enumerate()
        .map(|(i, (text, glyphs))| PageContent { number: i as u32 + 1, text, glyphs })
        .collect())
}
