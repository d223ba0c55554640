use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bigram;
use crate::corpus::{Cooccurrence, Dictionary};
use crate::error::{Error, Result};
use crate::real;

/// The association measure lexvec regresses on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    /// Positive pointwise mutual information.
    #[default]
    #[serde(rename = "ppmi")]
    Ppmi,
    /// Pointwise mutual information.
    #[serde(rename = "pmi")]
    Pmi,
    /// The raw cooccurrence count.
    #[serde(rename = "co")]
    Collocation,
    /// The log of the cooccurrence count.
    #[serde(rename = "logco")]
    LogCollocation,
}

impl FromStr for RelationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ppmi" => Ok(RelationType::Ppmi),
            "pmi" => Ok(RelationType::Pmi),
            "co" => Ok(RelationType::Collocation),
            "logco" => Ok(RelationType::LogCollocation),
            _ => Err(Error::InvalidRelation(s.to_string())),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationType::Ppmi => "ppmi",
            RelationType::Pmi => "pmi",
            RelationType::Collocation => "co",
            RelationType::LogCollocation => "logco",
        })
    }
}

impl RelationType {
    /// Score a pair that cooccurred `co` times, where the words occur
    /// `freq1` and `freq2` times and `log_total` is `smooth * ln(total)`.
    pub fn score(self, co: f64, freq1: u64, freq2: u64, smooth: f64, log_total: f64) -> f64 {
        let pmi = || co.ln() - (freq1 as f64).ln() - smooth * (freq2 as f64).ln() + log_total;
        match self {
            RelationType::Ppmi if co == 0.0 => 0.0,
            RelationType::Ppmi => pmi().max(0.0),
            RelationType::Pmi if co == 0.0 => 1.0,
            RelationType::Pmi => pmi(),
            RelationType::Collocation => co,
            RelationType::LogCollocation => co.ln(),
        }
    }

    /// Score of a pair that never cooccurred.
    pub fn absent(self) -> f64 {
        match self {
            RelationType::Ppmi | RelationType::Collocation | RelationType::LogCollocation => 0.0,
            RelationType::Pmi => 1.0,
        }
    }
}

/// Regression targets for every pair of words, keyed by [`bigram::encode`].
#[derive(Debug)]
pub(crate) struct Relations {
    values: HashMap<u64, real>,
    absent: real,
}

impl Relations {
    pub fn new(typ: RelationType, cooccurrence: &Cooccurrence, dictionary: &Dictionary, smooth: f64) -> Self {
        let log_total = smooth * (dictionary.total_freq() as f64).ln();
        let values = cooccurrence
            .encoded_matrix()
            .iter()
            .map(|(&key, &co)| {
                let (l1, l2) = bigram::decode(key);
                let score = typ.score(
                    co,
                    dictionary.id_freq(l1),
                    dictionary.id_freq(l2),
                    smooth,
                    log_total,
                );
                (key, score as real)
            })
            .collect();
        Relations {
            values,
            absent: typ.absent() as real,
        }
    }

    #[inline]
    pub fn get(&self, l1: u32, l2: u32) -> real {
        self.values
            .get(&bigram::encode(l1, l2))
            .copied()
            .unwrap_or(self.absent)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const SMOOTH: f64 = 0.75;

    #[test]
    fn zero_cooccurrence() {
        assert_eq!(RelationType::Ppmi.score(0.0, 10, 10, SMOOTH, 5.0), 0.0);
        assert_eq!(RelationType::Pmi.score(0.0, 10, 10, SMOOTH, 5.0), 1.0);
        assert_eq!(RelationType::Collocation.score(0.0, 10, 10, SMOOTH, 5.0), 0.0);
        assert_eq!(RelationType::Ppmi.absent(), 0.0);
        assert_eq!(RelationType::Pmi.absent(), 1.0);
    }

    #[test]
    fn ppmi_is_clamped_pmi() {
        let log_total = SMOOTH * (1000.0f64).ln();
        for (co, f1, f2) in [(1.0, 500, 500), (3.0, 2, 7), (40.0, 100, 80), (2.0, 900, 3)] {
            let pmi = RelationType::Pmi.score(co, f1, f2, SMOOTH, log_total);
            let ppmi = RelationType::Ppmi.score(co, f1, f2, SMOOTH, log_total);
            assert!(ppmi >= 0.0);
            assert_relative_eq!(ppmi, pmi.max(0.0));
            let expected = co.ln() - (f1 as f64).ln() - SMOOTH * (f2 as f64).ln() + log_total;
            assert_relative_eq!(pmi, expected);
        }
    }

    #[test]
    fn collocation_passes_through() {
        assert_eq!(RelationType::Collocation.score(7.5, 1, 1, SMOOTH, 0.0), 7.5);
        assert_relative_eq!(
            RelationType::LogCollocation.score(7.5, 1, 1, SMOOTH, 0.0),
            (7.5f64).ln()
        );
    }

    #[test]
    fn tags() {
        for t in ["ppmi", "pmi", "co", "logco"] {
            assert_eq!(t.parse::<RelationType>().unwrap().to_string(), t);
        }
        assert!(matches!(
            "npmi".parse::<RelationType>(),
            Err(Error::InvalidRelation(_))
        ));
    }

    #[test]
    fn relations_fall_back_for_absent_pairs() {
        let mut dic = Dictionary::new();
        dic.add("a", 4);
        dic.add("b", 2);
        let mut cooc = Cooccurrence::default();
        cooc.add(0, 1, 3.0);
        let relations = Relations::new(RelationType::Pmi, &cooc, &dic, SMOOTH);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations.get(1, 0), 1.0);
        let log_total = SMOOTH * (6.0f64).ln();
        let expected = (3.0f64).ln() - (4.0f64).ln() - SMOOTH * (2.0f64).ln() + log_total;
        assert_relative_eq!(relations.get(0, 1), expected as real, epsilon = 1e-6);
    }
}
