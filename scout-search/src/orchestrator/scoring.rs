//! Signal-diversity scoring for ranked candidates.
//!
//! A company mentioned by several differently-categorised queries is a
//! stronger signal than one mentioned many times by the same kind of
//! query, so the score multiplies the two:
//!
//! ```text
//! score = |distinct categories| * mention_count
//! ```

use std::cmp::Ordering;

use super::candidates::Candidate;

/// Score for a candidate with `categories` distinct labels and `mentions`
/// total mentions. Saturates instead of overflowing.
pub fn signal_score(categories: usize, mentions: u32) -> u32 {
    u32::try_from(categories)
        .unwrap_or(u32::MAX)
        .saturating_mul(mentions)
}

/// Ranking order: score descending, then hostname ascending.
///
/// The hostname tie-break makes the ranking independent of the order the
/// results arrived in.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.hostname.cmp(&b.hostname))
}

/// Sort candidates in place by [`rank_order`].
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(rank_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn candidate(host: &str, score: u32) -> Candidate {
        Candidate {
            name: host.to_owned(),
            canonical_url: format!("https://{host}"),
            hostname: host.to_owned(),
            descriptions: vec![],
            mention_count: score,
            categories: BTreeSet::from(["funding".to_owned()]),
            providers: BTreeSet::new(),
            score,
        }
    }

    #[test]
    fn score_multiplies_diversity_by_mentions() {
        assert_eq!(signal_score(2, 3), 6);
        assert_eq!(signal_score(1, 1), 1);
        assert_eq!(signal_score(0, 5), 0);
    }

    #[test]
    fn score_saturates() {
        assert_eq!(signal_score(usize::MAX, 2), u32::MAX);
        assert_eq!(signal_score(3, u32::MAX), u32::MAX);
    }

    #[test]
    fn sorts_by_score_then_hostname() {
        let mut list = vec![
            candidate("zeta.fr", 2),
            candidate("alpha.fr", 2),
            candidate("mid.fr", 5),
        ];
        sort_candidates(&mut list);
        let hosts: Vec<_> = list.iter().map(|c| c.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["mid.fr", "alpha.fr", "zeta.fr"]);
    }
}
