use once_cell::sync::Lazy;
use regex::Regex;

// root, accidental, quality, extension, compound modifier, slash bass
static CHORD_SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-G][b#]?(m|min|maj|dim|aug|sus|add)?[0-9]?(sus[24]|add[0-9]+|maj[0-9]+)?(/[A-G][b#]?)?$").unwrap()
});

static NASHVILLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[b#]?[1-7](m|-|maj|dim|aug|sus|add|°|\+)?[0-9]?(sus[24]|add[0-9]+|maj[0-9]+)?(/[b#]?[1-7])?$").unwrap()
});

const REST_MARKERS: &[&str] = &["TACET", "N.C."];

/// Decides whether a single whitespace-free token is a chord.
pub trait ChordToken: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_chord(&self, token: &str) -> bool;
}

/// Letter chord symbols (`A`, `F#m7`, `Cmaj7`, `G/B`) plus rest markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChordSymbols;

impl ChordToken for ChordSymbols {
    fn name(&self) -> &'static str {
        "symbols"
    }

    fn is_chord(&self, token: &str) -> bool {
        REST_MARKERS.iter().any(|m| token.eq_ignore_ascii_case(m)) || CHORD_SYMBOL_RE.is_match(token)
    }
}

/// Nashville number notation (`1`, `4`, `6m`, `b7`, `5/7`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NashvilleNumbers;

impl ChordToken for NashvilleNumbers {
    fn name(&self) -> &'static str {
        "nashville"
    }

    fn is_chord(&self, token: &str) -> bool {
        NASHVILLE_RE.is_match(token)
    }
}

/// Look up a notation strategy by its configured name.
pub fn notation_by_name(name: &str) -> Option<Box<dyn ChordToken>> {
    match name.to_ascii_lowercase().as_str() {
        "symbols" => Some(Box::new(ChordSymbols)),
        "nashville" => Some(Box::new(NashvilleNumbers)),
        _ => None,
    }
}

/// Classifies a line as a chord line when at least `min_ratio` of its tokens
/// are accepted by one of the configured notations.
pub struct ChordLineClassifier {
    notations: Vec<Box<dyn ChordToken>>,
    min_ratio: f64,
}

impl Default for ChordLineClassifier {
    fn default() -> Self {
        ChordLineClassifier { notations: vec![Box::new(ChordSymbols)], min_ratio: 0.8 }
    }
}

impl std::fmt::Debug for ChordLineClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.notations.iter().map(|n| n.name()).collect();
        f.debug_struct("ChordLineClassifier")
            .field("notations", &names)
            .field("min_ratio", &self.min_ratio)
            .finish()
    }
}

impl ChordLineClassifier {
    pub fn new(notations: Vec<Box<dyn ChordToken>>, min_ratio: f64) -> Self {
        ChordLineClassifier { notations, min_ratio }
    }

    pub fn with_notation(mut self, notation: Box<dyn ChordToken>) -> Self {
        self.notations.push(notation);
        self
    }

    pub fn is_chord_token(&self, token: &str) -> bool {
        let clean = token.trim_matches(|c: char| matches!(c, '(' | ')' | ',' | '|' | '[' | ']'));
        !clean.is_empty() && self.notations.iter().any(|n| n.is_chord(clean))
    }

    pub fn is_chord_line(&self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return false;
        }
        let chords = tokens.iter().filter(|t| self.is_chord_token(t)).count();
        chords as f64 / tokens.len() as f64 >= self.min_ratio
    }
}

/// Classify with the default letter-symbol notation and an 80% ratio.
pub fn is_chord_line(line: &str) -> bool {
    static DEFAULT: Lazy<ChordLineClassifier> = Lazy::new(ChordLineClassifier::default);
    DEFAULT.is_chord_line(line)
}
