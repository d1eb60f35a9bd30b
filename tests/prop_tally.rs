use proptest::prelude::*;

use opinion_poll::models::OptionSet;
use opinion_poll::voting::plurality::calculate_results;

const NAMES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

fn poll_and_counts() -> impl Strategy<Value = (OptionSet, Vec<(String, i64)>)> {
    (1usize..=NAMES.len()).prop_flat_map(|n| {
        let options = OptionSet::new(NAMES[..n].iter().copied()).unwrap();
        let counts = proptest::collection::vec(0i64..500, n).prop_map(move |counts| {
            NAMES[..n]
                .iter()
                .zip(counts)
                .filter(|(_, c)| *c > 0)
                .map(|(name, c)| (name.to_string(), c))
                .collect::<Vec<_>>()
        });
        (Just(options), counts)
    })
}

proptest! {
    #[test]
    fn every_option_is_ranked_once((options, counts) in poll_and_counts()) {
        let standings = calculate_results(&options, &counts);

        prop_assert_eq!(standings.entries.len(), options.len());
        for (i, entry) in standings.entries.iter().enumerate() {
            prop_assert_eq!(entry.rank, i + 1);
        }
        let mut names: Vec<&str> = standings.entries.iter().map(|e| e.option.as_str()).collect();
        names.sort();
        let mut expected: Vec<&str> = options.iter().collect();
        expected.sort();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn order_is_by_votes_then_declaration((options, counts) in poll_and_counts()) {
        let standings = calculate_results(&options, &counts);
        let position = |name: &str| options.iter().position(|o| o == name).unwrap();

        for pair in standings.entries.windows(2) {
            prop_assert!(pair[0].votes >= pair[1].votes);
            if pair[0].votes == pair[1].votes {
                prop_assert!(position(pair[0].option.as_str()) < position(pair[1].option.as_str()));
            }
        }
    }

    #[test]
    fn totals_and_percentages_agree((options, counts) in poll_and_counts()) {
        let standings = calculate_results(&options, &counts);
        let sum: u64 = standings.entries.iter().map(|e| e.votes).sum();
        prop_assert_eq!(standings.total_votes, sum);

        if sum == 0 {
            prop_assert!(standings.entries.iter().all(|e| e.percentage == 0.0));
        } else {
            let pct: f64 = standings.entries.iter().map(|e| e.percentage).sum();
            // Each entry is off by at most 0.05 after rounding.
            prop_assert!((pct - 100.0).abs() <= 0.05 * options.len() as f64 + 1e-9);
        }
    }

    #[test]
    fn ranking_is_repeatable((options, counts) in poll_and_counts()) {
        prop_assert_eq!(calculate_results(&options, &counts), calculate_results(&options, &counts));
    }
}
