//! Edit distance and score normalization for signature strings.

/// Score for identical hash strings.
pub const MAX_SCORE: u8 = 100;

/// Nominal signature length used to normalize distances.
const SPAMSUM_LENGTH: usize = 64;

/// Longest prefix of each hash string that takes part in a comparison.
pub const MAX_COMPARE_LENGTH: usize = SPAMSUM_LENGTH * 2;

const INSERT_COST: usize = 1;
const REMOVE_COST: usize = 1;
const REPLACE_COST: usize = 2;

/// Weighted Levenshtein distance between two byte strings.
///
/// Insertions and deletions cost 1, substitutions cost 2.
pub fn edit_distance(s: &[u8], t: &[u8]) -> usize {
    if s.is_empty() {
        return t.len() * INSERT_COST;
    }
    if t.is_empty() {
        return s.len() * REMOVE_COST;
    }

    let mut prev: Vec<usize> = (0..=t.len()).map(|j| j * INSERT_COST).collect();
    let mut cur = vec![0usize; t.len() + 1];
    for (i, &a) in s.iter().enumerate() {
        cur[0] = (i + 1) * REMOVE_COST;
        for (j, &b) in t.iter().enumerate() {
            let replace = prev[j] + if a == b { 0 } else { REPLACE_COST };
            let remove = prev[j + 1] + REMOVE_COST;
            let insert = cur[j] + INSERT_COST;
            cur[j + 1] = replace.min(remove).min(insert);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[t.len()]
}

/// Similarity of two hash strings in `0..=100`.
///
/// The distance is scaled to the nominal signature length and mapped so that
/// identical strings score 100. Two empty strings carry no information and
/// score 0. Only the first [`MAX_COMPARE_LENGTH`] bytes of each string are
/// compared.
pub fn score_strings(s: &str, t: &str) -> u8 {
    let s = &s.as_bytes()[..s.len().min(MAX_COMPARE_LENGTH)];
    let t = &t.as_bytes()[..t.len().min(MAX_COMPARE_LENGTH)];
    let total = s.len() + t.len();
    if total == 0 {
        return 0;
    }
    let scaled = edit_distance(s, t) * SPAMSUM_LENGTH / total;
    let scaled = scaled * usize::from(MAX_SCORE) / SPAMSUM_LENGTH;
    if scaled >= usize::from(MAX_SCORE) {
        0
    } else {
        MAX_SCORE - scaled as u8
    }
}
