use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bigram;
use crate::error::Error;

/// How a pair of tokens `distance` positions apart contributes to its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CountType {
    /// Every pair adds 1.
    #[default]
    #[serde(rename = "inc")]
    Increment,
    /// Every pair adds `1 / distance`.
    #[serde(rename = "prox")]
    Proximity,
}

impl CountType {
    fn weight(self, distance: usize) -> f64 {
        match self {
            CountType::Increment => 1.0,
            CountType::Proximity => 1.0 / distance as f64,
        }
    }
}

impl FromStr for CountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "inc" => Ok(CountType::Increment),
            "prox" => Ok(CountType::Proximity),
            _ => Err(Error::InvalidCountType(s.to_string())),
        }
    }
}

impl fmt::Display for CountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CountType::Increment => "inc",
            CountType::Proximity => "prox",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CooccurrenceOptions {
    pub count_type: CountType,
    /// Pairs up to this many positions apart are counted.
    pub window: usize,
}

impl Default for CooccurrenceOptions {
    fn default() -> Self {
        CooccurrenceOptions {
            count_type: CountType::Increment,
            window: 5,
        }
    }
}

/// Sparse cooccurrence weights keyed by [`bigram::encode`]`(left, right)`.
#[derive(Debug, Default)]
pub struct Cooccurrence {
    matrix: HashMap<u64, f64>,
}

impl Cooccurrence {
    /// Count every pair of ids at most `options.window` apart in `ids`.
    /// Both orders of a pair are counted.
    pub fn count<I>(ids: I, options: CooccurrenceOptions) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut cooc = Cooccurrence::default();
        let mut recent: VecDeque<u32> = VecDeque::with_capacity(options.window + 1);
        for right in ids {
            for (back, &left) in recent.iter().rev().enumerate() {
                let w = options.count_type.weight(back + 1);
                cooc.add(left, right, w);
                if left != right {
                    cooc.add(right, left, w);
                }
            }
            if options.window > 0 {
                if recent.len() == options.window {
                    recent.pop_front();
                }
                recent.push_back(right);
            }
        }
        cooc
    }

    pub fn add(&mut self, left: u32, right: u32, weight: f64) {
        *self.matrix.entry(bigram::encode(left, right)).or_insert(0.0) += weight;
    }

    /// Weight of the ordered pair, 0 when it never occurred.
    pub fn get(&self, left: u32, right: u32) -> f64 {
        self.matrix
            .get(&bigram::encode(left, right))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn encoded_matrix(&self) -> &HashMap<u64, f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }
}
