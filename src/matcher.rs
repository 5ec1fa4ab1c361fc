use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::charts::ChartRecord;

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diag = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb { diag + 1 } else { above.max(row[j]) };
            diag = above;
        }
    }
    row[b.len()]
}

fn char_ratio(a: &[char], b: &[char]) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(2.0 * lcs_len(a, b) as f64 / (a.len() + b.len()) as f64)
}

/// Whole-string similarity `2 * matches / (len_a + len_b)` on a 0..=100
/// scale, where matches is the longest common subsequence. Empty input scores 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    char_ratio(&a, &b)
}

/// Best similarity of the shorter string against every equally long window
/// of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut best = 0;
    for window in long.windows(short.len()) {
        best = best.max(char_ratio(&short, window));
        if best == 100 {
            break;
        }
    }
    best
}

// ASCII only, lowercased, every non-word character turned into a separator.
fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity after stripping punctuation and sorting the remaining tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Case-insensitive maximum of the three measures.
pub fn similarity(song: &str, title: &str) -> u8 {
    let song = song.to_lowercase();
    let title = title.to_lowercase();
    ratio(&song, &title)
        .max(partial_ratio(&song, &title))
        .max(token_sort_ratio(&song, &title))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub song: String,
    pub matched: bool,
    pub page: Option<u32>,
    pub score: u8,
    pub title: String,
    pub notes: String,
    pub body: String,
}

impl MatchResult {
    fn unmatched(song: &str) -> Self {
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
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchReport {
    /// One result per setlist entry, in setlist order.
    pub results: Vec<MatchResult>,
    /// Pages consumed by a match.
    pub used_pages: BTreeSet<u32>,
}

/// Greedily assign each song, in setlist order, to the best-scoring chart
/// page not yet taken. A candidate must score at least `threshold`; ties go
/// to the lowest page number.
pub fn match_songs_to_charts(songs: &[String], charts: &BTreeMap<u32, ChartRecord>, threshold: u8) -> MatchReport {
    let mut report = MatchReport::default();

    for song in songs {
        let mut best: Option<(&ChartRecord, u8)> = None;
        for (page, chart) in charts {
            if report.used_pages.contains(page) {
                continue;
            }
            let score = similarity(song, &chart.title);
            let better = best.map_or(true, |(_, s)| score > s);
            if score >= threshold && better {
                best = Some((chart, score));
            }
        }

        let result = match best {
            Some((chart, score)) => {
                report.used_pages.insert(chart.page);
                log::debug!("{:?} -> page {} ({})", song, chart.page, score);
                MatchResult {
                    song: song.clone(),
                    matched: true,
                    page: Some(chart.page),
                    score,
                    title: chart.title.clone(),
                    notes: chart.notes.clone(),
                    body: chart.body.clone(),
                }
            }
            None => {
                log::debug!("{:?} unmatched", song);
                MatchResult::unmatched(song)
            }
        };
        report.results.push(result);
    }
    report
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub match_rate: f64,
}

pub fn match_stats(results: &[MatchResult]) -> MatchStats {
    let total = results.len();
    let matched = results.iter().filter(|r| r.matched).count();
    let match_rate = if total > 0 { matched as f64 / total as f64 } else { 0.0 };
    MatchStats { total, matched, unmatched: total - matched, match_rate }
}
