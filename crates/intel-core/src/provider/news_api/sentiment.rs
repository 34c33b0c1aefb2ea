//! Lexicon-based sentiment scoring for short news text.
//!
//! Each lexicon word carries a polarity in `[-1, 1]`. Boosters in the three
//! words before a hit scale it up; negations flip and dampen it. Subjectivity
//! is the share of tokens that carry any opinion at all.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

lazy_static! {
    static ref LEXICON: HashMap<&'static str, f64> = [
        // positive
        ("good", 0.5),
        ("great", 0.7),
        ("excellent", 0.8),
        ("strong", 0.5),
        ("stronger", 0.5),
        ("record", 0.5),
        ("beat", 0.5),
        ("beats", 0.5),
        ("surge", 0.6),
        ("surges", 0.6),
        ("soar", 0.7),
        ("soars", 0.7),
        ("gain", 0.5),
        ("gains", 0.5),
        ("growth", 0.4),
        ("grow", 0.4),
        ("profit", 0.6),
        ("profitable", 0.6),
        ("rise", 0.4),
        ("rises", 0.4),
        ("rally", 0.6),
        ("upgrade", 0.6),
        ("upgraded", 0.6),
        ("outperform", 0.6),
        ("success", 0.7),
        ("successful", 0.7),
        ("innovative", 0.5),
        ("breakthrough", 0.7),
        ("expand", 0.4),
        ("expansion", 0.4),
        ("win", 0.6),
        ("wins", 0.6),
        ("positive", 0.5),
        ("optimistic", 0.6),
        ("boost", 0.5),
        // negative
        ("bad", -0.5),
        ("weak", -0.5),
        ("weaker", -0.5),
        ("miss", -0.5),
        ("misses", -0.5),
        ("loss", -0.6),
        ("losses", -0.6),
        ("decline", -0.5),
        ("declines", -0.5),
        ("drop", -0.4),
        ("drops", -0.4),
        ("fall", -0.4),
        ("falls", -0.4),
        ("plunge", -0.7),
        ("plunges", -0.7),
        ("slump", -0.6),
        ("downgrade", -0.6),
        ("downgraded", -0.6),
        ("underperform", -0.6),
        ("layoffs", -0.6),
        ("lawsuit", -0.6),
        ("sued", -0.6),
        ("fraud", -0.9),
        ("scandal", -0.8),
        ("investigation", -0.5),
        ("probe", -0.5),
        ("fined", -0.5),
        ("recall", -0.5),
        ("bankruptcy", -0.9),
        ("crash", -0.7),
        ("risk", -0.3),
        ("warning", -0.4),
        ("negative", -0.5),
        ("pessimistic", -0.6),
        ("failure", -0.7),
        ("fails", -0.6),
    ]
    .into_iter()
    .collect();

    static ref BOOSTERS: HashMap<&'static str, f64> = [
        ("very", 1.3),
        ("really", 1.3),
        ("extremely", 1.5),
        ("highly", 1.3),
        ("sharply", 1.4),
        ("significantly", 1.3),
        ("massive", 1.4),
        ("massively", 1.4),
        ("hugely", 1.4),
        ("strongly", 1.3),
    ]
    .into_iter()
    .collect();

    static ref NEGATIONS: HashSet<&'static str> = [
        "not", "no", "never", "none", "nothing", "without", "isn't", "aren't", "wasn't",
        "weren't", "hasn't", "haven't", "doesn't", "don't", "didn't", "won't", "can't",
        "cannot", "couldn't", "shouldn't",
    ]
    .into_iter()
    .collect();
}

/// How far back boosters and negations reach.
const MODIFIER_WINDOW: usize = 3;

/// Sentiment of one text or the mean over many.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    /// `-1.0` (negative) to `1.0` (positive).
    pub polarity: f64,
    /// `0.0` (factual) to `1.0` (opinionated).
    pub subjectivity: f64,
}

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment {
        polarity: 0.0,
        subjectivity: 0.0,
    };
}

/// Score one piece of text.
pub fn analyze(text: &str) -> Sentiment {
    let words: Vec<String> = text
        .split_whitespace()
        .map(clean_word)
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Sentiment::NEUTRAL;
    }

    let mut scores = Vec::new();
    for (i, word) in words.iter().enumerate() {
        if let Some(&score) = LEXICON.get(word.as_str()) {
            scores.push(apply_modifiers(&words, i, score));
        }
    }
    if scores.is_empty() {
        return Sentiment::NEUTRAL;
    }

    let polarity = scores.iter().sum::<f64>() / scores.len() as f64;
    Sentiment {
        polarity: polarity.clamp(-1.0, 1.0),
        subjectivity: (scores.len() as f64 / words.len() as f64).clamp(0.0, 1.0),
    }
}

/// Mean sentiment over several texts. `None` when there are none.
pub fn analyze_batch<'a>(texts: impl IntoIterator<Item = &'a str>) -> Option<Sentiment> {
    let results: Vec<Sentiment> = texts.into_iter().map(analyze).collect();
    if results.is_empty() {
        return None;
    }
    let n = results.len() as f64;
    Some(Sentiment {
        polarity: results.iter().map(|s| s.polarity).sum::<f64>() / n,
        subjectivity: results.iter().map(|s| s.subjectivity).sum::<f64>() / n,
    })
}

fn clean_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

fn apply_modifiers(words: &[String], index: usize, mut score: f64) -> f64 {
    for prev in &words[index.saturating_sub(MODIFIER_WINDOW)..index] {
        if let Some(&factor) = BOOSTERS.get(prev.as_str()) {
            score *= factor;
        }
        if NEGATIONS.contains(prev.as_str()) {
            score *= -0.5;
        }
    }
    score.clamp(-1.0, 1.0)
}
