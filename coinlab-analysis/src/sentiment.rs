//! On-chain and social sentiment.
//!
//! On-chain figures are simulated: drawn from fixed plausible ranges with an
//! RNG seeded from the entity id, so the same entity always gets the same
//! numbers. Social sentiment is the mean lexicon polarity of a set of posts.

use crate::forecast::metrics::round3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Posts scored when the caller supplies none.
pub const SAMPLE_POSTS: [&str; 5] = [
    "Bitcoin price is expected to surge this week as whales accumulate.",
    "Investors are losing confidence in the market.",
    "The new update to the Ethereum network boosts security.",
    "Fear is dominating the crypto market today.",
    "Institutional investors are showing strong interest again.",
];

const LEXICON: &[(&str, f64)] = &[
    ("accumulate", 0.3),
    ("adoption", 0.4),
    ("boost", 0.5),
    ("boosts", 0.5),
    ("bullish", 0.7),
    ("confidence", 0.4),
    ("gain", 0.5),
    ("gains", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("growth", 0.4),
    ("interest", 0.2),
    ("new", 0.14),
    ("optimism", 0.6),
    ("optimistic", 0.6),
    ("positive", 0.5),
    ("rally", 0.6),
    ("record", 0.3),
    ("secure", 0.4),
    ("security", 0.3),
    ("strong", 0.43),
    ("surge", 0.6),
    ("upgrade", 0.4),
    ("bad", -0.7),
    ("bearish", -0.7),
    ("crash", -0.8),
    ("decline", -0.4),
    ("dominating", -0.2),
    ("drop", -0.3),
    ("dump", -0.6),
    ("fear", -0.6),
    ("hack", -0.7),
    ("loss", -0.5),
    ("losses", -0.5),
    ("losing", -0.4),
    ("negative", -0.5),
    ("panic", -0.7),
    ("risk", -0.3),
    ("scam", -0.8),
    ("uncertainty", -0.4),
    ("weak", -0.4),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "isn't", "aren't", "don't", "won't"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnChainMetrics {
    pub active_addresses: u64,
    pub transactions: u64,
    pub exchange_inflows: f64,
    pub exchange_outflows: f64,
    pub whale_transactions: u64,
    pub hash_rate: f64,
    pub tvl: f64,
    pub nvt_ratio: f64,
    pub mvrv_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.1 {
            Self::Positive
        } else if score < -0.1 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentReport {
    pub entity_id: String,
    pub onchain_metrics: OnChainMetrics,
    pub average_sentiment: f64,
    pub sentiment_label: SentimentLabel,
}

pub fn simulate_onchain(entity_id: &str) -> OnChainMetrics {
    let seed: [u8; 32] = *blake3::hash(entity_id.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    OnChainMetrics {
        active_addresses: rng.gen_range(500_000..=1_000_000),
        transactions: rng.gen_range(200_000..=500_000),
        exchange_inflows: rng.gen_range(50.0..200.0),
        exchange_outflows: rng.gen_range(50.0..200.0),
        whale_transactions: rng.gen_range(10..=50),
        hash_rate: rng.gen_range(100.0..300.0),
        tvl: rng.gen_range(10_000_000_000.0..20_000_000_000.0),
        nvt_ratio: round2(rng.gen_range(60.0..120.0)),
        mvrv_ratio: round2(rng.gen_range(1.0..3.0)),
    }
}

/// Polarity of one post in [-1, 1]: mean score of lexicon words, with a
/// preceding negation flipping and halving the next word. 0 if no word scores.
pub fn polarity(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    let mut scores = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let Some(&(_, score)) = LEXICON.iter().find(|(w, _)| w == word) else {
            continue;
        };
        let negated = i > 0 && NEGATIONS.iter().any(|n| *n == words[i - 1]);
        scores.push(if negated { -0.5 * score } else { score });
    }
    if scores.is_empty() {
        return 0.0;
    }
    (scores.iter().sum::<f64>() / scores.len() as f64).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    posts: Vec<String>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::with_posts(SAMPLE_POSTS.iter().map(|s| s.to_string()).collect())
    }
}

impl SentimentAnalyzer {
    pub fn with_posts(posts: Vec<String>) -> Self {
        Self { posts }
    }

    pub fn analyze(&self, entity_id: &str) -> SentimentReport {
        let average = if self.posts.is_empty() {
            0.0
        } else {
            self.posts.iter().map(|p| polarity(p)).sum::<f64>() / self.posts.len() as f64
        };
        SentimentReport {
            entity_id: entity_id.to_string(),
            onchain_metrics: simulate_onchain(entity_id),
            average_sentiment: round3(average),
            sentiment_label: SentimentLabel::from_score(average),
        }
    }
}
