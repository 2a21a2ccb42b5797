//! Candidate deduplication: one record per organisation.
//!
//! Raw categorised results are grouped by bare hostname. Each group
//! accumulates its mentions, the distinct category labels and providers
//! that surfaced it, and a bounded set of descriptions used later as LLM
//! context. Every choice that depends on several results (display name,
//! canonical URL, which descriptions survive the cap) is made from the
//! whole group with a total order, never from arrival order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{CategorizedResult, ProviderId};

use super::scoring::{signal_score, sort_candidates};
use super::url_normalize::{bare_hostname, parse_lenient};

/// Maximum descriptions kept per candidate.
pub const MAX_DESCRIPTIONS: usize = 8;

/// Names longer than this are treated as headlines, not company names.
const MAX_NAME_CHARS: usize = 60;
const MAX_NAME_WORDS: usize = 6;

/// Separators after which a title carries site or section noise.
const TITLE_SEPARATORS: &[&str] = &[" - ", " | ", " – ", " — ", ": "];

/// Titles that never name a company.
const GENERIC_TITLES: &[&str] = &[
    "home",
    "homepage",
    "home page",
    "accueil",
    "welcome",
    "index",
    "login",
    "sign in",
    "page not found",
    "404",
];

/// A deduplicated organisation surfaced by one sourcing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub canonical_url: String,
    /// Bare hostname; unique within one ranking.
    pub hostname: String,
    pub descriptions: Vec<String>,
    pub mention_count: u32,
    pub categories: BTreeSet<String>,
    pub providers: BTreeSet<ProviderId>,
    pub score: u32,
}

#[derive(Default)]
struct Group {
    mentions: u32,
    name_votes: BTreeMap<String, u32>,
    urls: BTreeSet<String>,
    descriptions: BTreeSet<String>,
    categories: BTreeSet<String>,
    providers: BTreeSet<ProviderId>,
}

/// Merge categorised results into ranked candidates.
///
/// Results whose URL cannot be parsed are dropped; nothing else is
/// filtered. Output is sorted by score descending, ties by hostname.
pub fn rank_candidates<I>(results: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = CategorizedResult>,
{
    let mut groups: HashMap<String, Group> = HashMap::new();

    for CategorizedResult { category, result } in results {
        let Some(url) = parse_lenient(&result.url) else {
            tracing::trace!(url = %result.url, "dropping result without a valid URL");
            continue;
        };
        let Some(host) = bare_hostname(&url) else {
            continue;
        };

        let path = url.path().trim_end_matches('/');
        let canonical = format!("https://{host}{path}");

        let group = groups.entry(host).or_default();
        group.mentions = group.mentions.saturating_add(1);
        group.urls.insert(canonical);
        group.providers.insert(result.provider);

        let category = category.trim();
        if !category.is_empty() {
            group.categories.insert(category.to_lowercase());
        }
        let description = result.description.trim();
        if !description.is_empty() {
            group.descriptions.insert(description.to_owned());
        }
        if let Some(name) = name_from_title(&result.title) {
            *group.name_votes.entry(name).or_insert(0) += 1;
        }
    }

    let mut candidates: Vec<Candidate> = groups
        .into_iter()
        .map(|(host, group)| finish_group(host, group))
        .collect();
    sort_candidates(&mut candidates);
    candidates
}

fn finish_group(hostname: String, group: Group) -> Candidate {
    // Most votes wins; BTreeMap iteration makes ties resolve to the
    // lexicographically smallest name.
    let name = group
        .name_votes
        .iter()
        .fold(None::<(&String, u32)>, |best, (name, &votes)| match best {
            Some((_, best_votes)) if best_votes >= votes => best,
            _ => Some((name, votes)),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| name_from_hostname(&hostname));

    let canonical_url = group
        .urls
        .iter()
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .cloned()
        .unwrap_or_else(|| format!("https://{hostname}"));

    let mut descriptions: Vec<String> = group.descriptions.into_iter().collect();
    descriptions.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    descriptions.truncate(MAX_DESCRIPTIONS);

    Candidate {
        name,
        canonical_url,
        score: signal_score(group.categories.len(), group.mentions),
        hostname,
        descriptions,
        mention_count: group.mentions,
        categories: group.categories,
        providers: group.providers,
    }
}

/// Company name from a result title, if the title yields a plausible one.
///
/// Everything from the first site/section separator on is dropped:
/// `"Qonto - Business account for SMEs"` becomes `"Qonto"`.
pub fn name_from_title(title: &str) -> Option<String> {
    let mut name = title.trim();
    for sep in TITLE_SEPARATORS {
        if let Some((head, _)) = name.split_once(sep) {
            name = head.trim();
        }
    }
    is_plausible_name(name).then(|| name.to_owned())
}

fn is_plausible_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_CHARS
        && name.split_whitespace().count() <= MAX_NAME_WORDS
        && !GENERIC_TITLES.contains(&name.to_lowercase().as_str())
}

/// Fallback display name from the host's first label:
/// `le-wagon.fr` becomes `"Le Wagon"`.
pub fn name_from_hostname(hostname: &str) -> String {
    let label = hostname.split('.').next().unwrap_or(hostname);
    label
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
