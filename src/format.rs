use serde::{Deserialize, Serialize};

use crate::chords::ChordLineClassifier;

/// Font applied to a whole block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size_pt: u32,
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec { family: "Consolas".to_string(), size_pt: 12 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Base font family and size.
    Style(FontSpec),
    /// Centered paragraph.
    Align,
    /// Bold, applied on top of the base style.
    Emphasis,
}

/// One styling instruction over the half-open range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOperation {
    pub kind: FormatKind,
    pub start: usize,
    pub end: usize,
}

impl FormatOperation {
    fn new(kind: FormatKind, start: usize, end: usize) -> Self {
        FormatOperation { kind, start, end }
    }
}

/// The literal text to insert for one tab and the operations to apply after it,
/// in the order they must be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedUnit {
    pub anchor: usize,
    pub text: String,
    pub operations: Vec<FormatOperation>,
}

impl FormattedUnit {
    /// Length of the inserted block in characters.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub const NO_CHART_PLACEHOLDER: &str = "[No chart found]";

/// Lay out a matched song as `title\nnotes\n\nbody\n` at `anchor` and compute
/// the ranges for base style, centered title/notes and bold chord lines.
pub fn format_song_unit(
    anchor: usize,
    title: &str,
    notes: &str,
    body: &str,
    font: &FontSpec,
    classifier: &ChordLineClassifier,
) -> FormattedUnit {
    let text = format!("{}\n{}\n\n{}\n", title, notes, body);
    let len = text.chars().count();
    let mut ops = vec![FormatOperation::new(FormatKind::Style(font.clone()), anchor, anchor + len)];

    let mut cursor = anchor;
    let title_start = cursor;
    cursor += title.chars().count() + 1;
    ops.push(FormatOperation::new(FormatKind::Align, title_start, cursor));

    let notes_start = cursor;
    cursor += notes.chars().count() + 1;
    ops.push(FormatOperation::new(FormatKind::Align, notes_start, cursor));

    // blank separator
    cursor += 1;

    for line in body.split('\n') {
        let line_start = cursor;
        let line_len = line.chars().count();
        cursor += line_len + 1;
        if classifier.is_chord_line(line) {
            ops.push(FormatOperation::new(FormatKind::Emphasis, line_start, line_start + line_len));
        }
    }
    debug_assert_eq!(cursor, anchor + len);

    FormattedUnit { anchor, text, operations: ops }
}

/// Placeholder unit for a setlist entry without a chart: base style only.
pub fn format_placeholder_unit(anchor: usize, font: &FontSpec) -> FormattedUnit {
    let text = format!("{}\n", NO_CHART_PLACEHOLDER);
    let len = text.chars().count();
    FormattedUnit {
        anchor,
        text,
        operations: vec![FormatOperation::new(FormatKind::Style(font.clone()), anchor, anchor + len)],
    }
}

/// Bound a tab title to `max` characters, ending truncated titles with "...".
pub fn tab_title(song: &str, max: usize) -> String {
    if song.chars().count() <= max {
        return song.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = song.chars().take(keep).collect();
    out.push_str("...");
    out
}
