use serde::{Deserialize, Serialize};

/// One positioned character from a decoded page. `top` grows downwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub text: String,
    pub x0: f64,
    pub top: f64,
}

impl Glyph {
    pub fn new(text: impl Into<String>, x0: f64, top: f64) -> Self {
        Glyph { text: text.into(), x0, top }
    }
}

/// Glyphs believed to sit on one visual line, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct LineCluster {
    glyphs: Vec<Glyph>,
}

impl LineCluster {
    pub fn new(mut glyphs: Vec<Glyph>) -> Self {
        glyphs.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        LineCluster { glyphs }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Smallest `top` of any member; used as the line's vertical position.
    pub fn top(&self) -> f64 {
        self.glyphs.iter().map(|g| g.top).fold(f64::INFINITY, f64::min)
    }

    pub fn min_x(&self) -> f64 {
        self.glyphs.first().map(|g| g.x0).unwrap_or(0.0)
    }

    /// Glyph text concatenated without any spacing.
    pub fn raw_text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }
}

/// Tunables for line grouping and column reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub y_tolerance: f64,
    pub fallback_pitch: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
    /// Gap inference is skipped when the typical line spacing is not above this.
    pub min_line_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            y_tolerance: 2.0,
            fallback_pitch: 6.17,
            pitch_min: 3.0,
            pitch_max: 10.0,
            min_line_spacing: 1.0,
        }
    }
}

/// Group glyphs into lines by vertical proximity.
/// Glyphs are swept in `(top, x0)` order; a glyph within `y_tolerance` of the
/// current line's first glyph joins it, otherwise it starts a new line.
pub fn group_glyphs_into_lines(glyphs: &[Glyph], y_tolerance: f64) -> Vec<LineCluster> {
    if glyphs.is_empty() {
        return Vec::new();
    }

    let mut sorted = glyphs.to_vec();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut lines = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return lines;
    };
    let mut ref_y = first.top;
    let mut current = vec![first];

    for g in iter {
        if (g.top - ref_y).abs() < y_tolerance {
            current.push(g);
        } else {
            ref_y = g.top;
            lines.push(LineCluster::new(std::mem::replace(&mut current, vec![g])));
        }
    }
    lines.push(LineCluster::new(current));
    lines
}

/// Lower median of an unsorted sample.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[(values.len() - 1) / 2])
}

/// Upper median of an unsorted sample.
pub(crate) fn upper_median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

/// Infer the monospace character pitch from horizontal deltas between
/// neighbouring glyphs, taking the upper median of an even sample. Deltas
/// outside `(pitch_min, pitch_max)` are ignored; with no usable sample the
/// configured fallback is returned.
pub fn detect_char_pitch(lines: &[LineCluster], cfg: &LayoutConfig) -> f64 {
    let mut spacings: Vec<f64> = lines
        .iter()
        .flat_map(|lc| lc.glyphs.windows(2).map(|w| w[1].x0 - w[0].x0))
        .filter(|dx| *dx > cfg.pitch_min && *dx < cfg.pitch_max)
        .collect();
    upper_median(&mut spacings).unwrap_or(cfg.fallback_pitch)
}

/// Column index of every glyph of `line` relative to `min_x`.
pub fn column_indices(line: &LineCluster, min_x: f64, pitch: f64) -> Vec<usize> {
    line.glyphs
        .iter()
        .map(|g| {
            let col = ((g.x0 - min_x) / pitch + 0.5).floor();
            if col > 0.0 { col as usize } else { 0 }
        })
        .collect()
}

/// Rebuild a line of text, padding with spaces so each glyph lands on its
/// column. Glyphs that collide with an earlier one are appended after it.
pub fn reconstruct_line(line: &LineCluster, min_x: f64, pitch: f64) -> String {
    let mut out = String::new();
    let mut width = 0usize;
    for (g, col) in line.glyphs.iter().zip(column_indices(line, min_x, pitch)) {
        while width < col {
            out.push(' ');
            width += 1;
        }
        out.push_str(&g.text);
        width += g.text.chars().count();
    }
    out.truncate(out.trim_end().len());
    out
}

/// Interleave blank lines where the vertical gap before a line is a multiple
/// of the page's typical spacing. `tops` and `lines` are parallel.
/// Trailing blank lines are dropped.
pub fn insert_gap_lines(tops: &[f64], lines: Vec<String>, min_spacing: f64) -> Vec<String> {
    let mut diffs: Vec<f64> = tops.windows(2).map(|w| w[1] - w[0]).collect();
    let normal = median(&mut diffs).filter(|s| *s > min_spacing);

    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.into_iter().enumerate() {
        let gap = match (normal, i.checked_sub(1)) {
            (Some(normal), Some(prev)) => match (tops.get(prev), tops.get(i)) {
                (Some(a), Some(b)) => Some((b - a) / normal),
                _ => None,
            },
            _ => None,
        };
        if let Some(ratio) = gap {
            let blanks = ratio.round() - 1.0;
            if blanks > 0.0 {
                out.extend(std::iter::repeat(String::new()).take(blanks as usize));
            }
        }
        out.push(line);
    }

    while matches!(out.last(), Some(last) if last.is_empty()) {
        out.pop();
    }
    out
}

/// Run grouping, pitch inference, reconstruction and gap inference over
/// already-grouped body lines.
pub fn reconstruct_body(lines: &[LineCluster], cfg: &LayoutConfig) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let pitch = detect_char_pitch(lines, cfg);
    let min_x = lines.iter().map(LineCluster::min_x).fold(f64::INFINITY, f64::min);
    let tops: Vec<f64> = lines.iter().map(LineCluster::top).collect();
    let text: Vec<String> = lines.iter().map(|lc| reconstruct_line(lc, min_x, pitch)).collect();

    log::debug!("body pitch={:.2} min_x={:.2} lines={}", pitch, min_x, lines.len());
    insert_gap_lines(&tops, text, cfg.min_line_spacing).join("\n")
}
