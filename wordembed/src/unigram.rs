use rand::Rng;

use crate::corpus::Dictionary;

const TABLE_SIZE: usize = 100_000_000;
const SLOTS_PER_WORD: usize = 10_000;
const POWER: f64 = 0.75;

/// Draws negative samples with probability proportional to `count^0.75`.
///
/// Each id fills a share of a lookup table proportional to its weight, so a
/// draw is a single uniform index into the table.
#[derive(Debug)]
pub(crate) struct UnigramTable {
    table: Vec<u32>,
}

impl UnigramTable {
    pub fn new(dictionary: &Dictionary) -> Self {
        let vocab_size = dictionary.len();
        let size = TABLE_SIZE.min(vocab_size.max(1) * SLOTS_PER_WORD);
        let weight = |id: usize| (dictionary.id_freq(id as u32) as f64).powf(POWER);
        let train_words_pow = (0..vocab_size).map(weight).sum::<f64>();

        let mut table = Vec::with_capacity(size);
        let mut i = 0;
        let mut d1 = weight(i) / train_words_pow;
        for a in 0..size {
            table.push(i as u32);
            if (a as f64 / size as f64) > d1 && i + 1 < vocab_size {
                i += 1;
                d1 += weight(i) / train_words_pow;
            }
        }
        UnigramTable { table }
    }

    #[inline]
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        self.table[rng.gen_range(0..self.table.len())]
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn draws_follow_smoothed_counts() {
        let mut dic = Dictionary::new();
        dic.add("a", 16);
        dic.add("b", 1);
        let table = UnigramTable::new(&dic);
        let mut rng = SmallRng::seed_from_u64(11);
        let n = 100_000;
        let a = (0..n).filter(|_| table.sample(&mut rng) == 0).count();
        // 16^0.75 = 8, so "a" should come up 8 times out of 9
        let expected = 8.0 / 9.0;
        assert!((a as f64 / n as f64 - expected).abs() < 0.01);
    }

    #[test]
    fn every_word_is_reachable() {
        let mut dic = Dictionary::new();
        for (w, c) in [("x", 100), ("y", 10), ("z", 1)] {
            dic.add(w, c);
        }
        let table = UnigramTable::new(&dic);
        let mut seen = [false; 3];
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..100_000 {
            seen[table.sample(&mut rng) as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }
}
