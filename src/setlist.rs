use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_NUMBERING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s\.\)•\-\*]+\s*").unwrap());
static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\(\[].*?[\)\]]\s*").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const STOPLIST: &[&str] = &["setlist", "songs", "tracklist", "playlist", "powered by tcpdf"];

// Header lines shorter than this are skipped wherever they repeat.
const HEADER_MAX_LEN: usize = 50;

fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("title") && lower.contains("key")
}

/// Normalize one setlist line into a song name, or `None` when nothing usable remains.
pub fn clean_setlist_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || (is_header_line(line) && line.chars().count() < HEADER_MAX_LEN) {
        return None;
    }
    let cleaned = LEADING_NUMBERING_RE.replace(line, "");
    let cleaned = ANNOTATION_RE.replace_all(&cleaned, " ");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ").trim().to_string();

    if cleaned.chars().count() < 2 || STOPLIST.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }
    Some(cleaned)
}

/// Extract the ordered song names from the setlist pages' plain text.
/// A "Title ... Key" header within the first five lines of a page, and
/// everything above it, is skipped. Duplicates are kept.
pub fn extract_setlist(pages: &[String]) -> Vec<String> {
    let mut songs = Vec::new();
    for page in pages {
        let lines: Vec<&str> = page.split('\n').collect();
        let start = lines
            .iter()
            .take(5)
            .position(|l| is_header_line(l))
            .map(|i| i + 1)
            .unwrap_or(0);
        songs.extend(lines[start..].iter().filter_map(|l| clean_setlist_line(l)));
    }
    log::debug!("setlist tokens: {:?}", songs);
    songs
}
