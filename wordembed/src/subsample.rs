use rand::Rng;

use crate::corpus::Dictionary;

/// Randomly discards frequent words while keeping their ranking the same.
///
/// A word with relative frequency `f` under threshold `t` is kept with
/// probability `min(1, (sqrt(f / t) + 1) * t / f)`. A threshold of 0 keeps
/// everything.
#[derive(Debug, Clone)]
pub struct Subsampler {
    keep: Vec<f32>,
}

impl Subsampler {
    pub fn new(dictionary: &Dictionary, threshold: f64) -> Self {
        let total = dictionary.total_freq() as f64;
        let keep = (0..dictionary.len() as u32)
            .map(|id| {
                let freq = dictionary.id_freq(id) as f64;
                if threshold <= 0.0 || freq == 0.0 {
                    return 1.0;
                }
                let f = freq / total;
                (((f / threshold).sqrt() + 1.0) * threshold / f).min(1.0) as f32
            })
            .collect();
        Subsampler { keep }
    }

    /// Probability that an occurrence of `id` is kept.
    pub fn keep_probability(&self, id: u32) -> f32 {
        self.keep[id as usize]
    }

    /// Decide whether this occurrence of `id` takes part in training.
    #[inline]
    pub fn trial<R: Rng>(&self, id: u32, rng: &mut R) -> bool {
        let p = self.keep[id as usize];
        p >= 1.0 || rng.gen::<f32>() < p
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    fn dictionary() -> Dictionary {
        let mut dic = Dictionary::new();
        dic.add("the", 50_000);
        dic.add("cat", 1_000);
        dic.add("zebra", 3);
        dic
    }

    #[test]
    fn empirical_keep_rate_matches_formula() {
        let dic = dictionary();
        let t = 1e-3;
        let sub = Subsampler::new(&dic, t);
        let total = dic.total_freq() as f64;
        let mut rng = SmallRng::seed_from_u64(7);
        for id in 0..dic.len() as u32 {
            let f = dic.id_freq(id) as f64 / total;
            let expected = (((f / t).sqrt() + 1.0) * t / f).min(1.0);
            let n = 200_000;
            let kept = (0..n).filter(|_| sub.trial(id, &mut rng)).count();
            let rate = kept as f64 / n as f64;
            assert!(
                (rate - expected).abs() < 0.01,
                "id {id}: rate {rate}, expected {expected}"
            );
        }
    }

    #[test]
    fn rare_words_are_always_kept() {
        let sub = Subsampler::new(&dictionary(), 1e-3);
        assert_eq!(sub.keep_probability(2), 1.0);
        assert!(sub.keep_probability(0) < 0.2);
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let sub = Subsampler::new(&dictionary(), 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!((0..1000).all(|_| sub.trial(0, &mut rng)));
    }
}
