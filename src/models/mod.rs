use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// The fixed, ordered candidate list. Built once from config and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    names: Vec<String>,
}

impl OptionSet {
    /// Builds the set, rejecting blank names and duplicates so that every
    /// option maps to exactly one ranking row.
    pub fn new<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err("poll option names must not be empty".to_string());
            }
            if collected.contains(&name) {
                return Err(format!("duplicate poll option: {}", name));
            }
            collected.push(name);
        }
        if collected.is_empty() {
            return Err("at least one poll option is required".to_string());
        }
        Ok(Self { names: collected })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub option: String,
    pub voter_key: String,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterRecord {
    pub voter_key: String,
    pub first_voted_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(option: &str, voter_key: &str) -> Self {
        Self {
            option: option.to_string(),
            voter_key: voter_key.to_string(),
            cast_at: Utc::now(),
        }
    }

    // The voter row written in the same transaction as this vote.
    pub fn voter_record(&self) -> VoterRecord {
        VoterRecord {
            voter_key: self.voter_key.clone(),
            first_voted_at: self.cast_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_set_keeps_declaration_order() {
        let options = OptionSet::new(["B", "A", "C"]).unwrap();
        assert_eq!(options.iter().collect::<Vec<_>>(), vec!["B", "A", "C"]);
        assert!(options.contains("A"));
        assert!(!options.contains("a"));
    }

    #[test]
    fn option_set_rejects_duplicates_and_blanks() {
        assert!(OptionSet::new(["A", "A"]).is_err());
        assert!(OptionSet::new(["A", "  "]).is_err());
        assert!(OptionSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn voter_record_shares_the_vote_timestamp() {
        let vote = Vote::new("A", "10.0.0.1");
        let record = vote.voter_record();
        assert_eq!(record.voter_key, "10.0.0.1");
        assert_eq!(record.first_voted_at, vote.cast_at);
    }
}
