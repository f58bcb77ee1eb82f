//! Volume naming, tier classification and natural ordering.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

/// Tier label for content outside the size-tier vocabulary.
pub const MAIN_TIER: &str = "Main";

/// Size-tier vocabulary: `1k`, `2k`, `4k`, `16K`, ...
fn tier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\d+k$").unwrap())
}

/// Tier a variant folder belongs to.
///
/// Size tiers are normalised to lowercase; anything else is [`MAIN_TIER`].
pub fn tier_for_variant(variant: &str) -> String {
    if tier_pattern().is_match(variant) {
        variant.to_ascii_lowercase()
    } else {
        MAIN_TIER.to_string()
    }
}

/// Volume name for a product, tier and sequence index.
///
/// ```
/// use assetlib::library::volume_name;
/// assert_eq!(volume_name("Studio", "4k", 7), "Studio_4k_Vol_007");
/// ```
pub fn volume_name(product: &str, tier: &str, index: u32) -> String {
    format!("{}_{}_Vol_{:03}", product, tier, index)
}

/// Sequence index of a volume name produced by [`volume_name`].
pub fn volume_index(name: &str, product: &str, tier: &str) -> Option<u32> {
    let prefix = format!("{}_{}_Vol_", product, tier);
    let digits = name.strip_prefix(&prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Numeric-aware string comparison (`Vol_2` sorts before `Vol_10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x
                        .to_lowercase()
                        .cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn cmp_digits(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
