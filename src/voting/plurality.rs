use std::collections::HashMap;

use crate::models::OptionSet;
use crate::voting::{RankingEntry, Standings};

/// Ranks every configured option by vote count. Ties keep the order the
/// options were declared in. Counts for names outside `options` are ignored.
pub fn calculate_results(options: &OptionSet, counts: &[(String, i64)]) -> Standings {
    let by_option: HashMap<&str, u64> = counts
        .iter()
        .map(|(option, count)| (option.as_str(), u64::try_from(*count).unwrap_or(0)))
        .collect();

    // Initialize all options, zero if nobody picked them
    let mut tallies: Vec<(&str, u64)> = options
        .iter()
        .map(|option| (option, by_option.get(option).copied().unwrap_or(0)))
        .collect();

    let total_votes: u64 = tallies.iter().map(|(_, votes)| votes).sum();

    // sort_by is stable, which is what gives the declaration-order tie-break
    tallies.sort_by(|a, b| b.1.cmp(&a.1));

    let entries = tallies
        .into_iter()
        .enumerate()
        .map(|(i, (option, votes))| RankingEntry {
            rank: i + 1,
            option: option.to_string(),
            votes,
            percentage: percentage(votes, total_votes),
        })
        .collect();

    Standings {
        entries,
        total_votes,
    }
}

// One decimal place; zero when there are no votes at all.
fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}
