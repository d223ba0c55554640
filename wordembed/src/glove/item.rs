use crate::bigram;
use crate::corpus::Cooccurrence;
use crate::real;

/// One nonzero cooccurrence entry, ready for training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Item {
    pub l1: u32,
    pub l2: u32,
    /// Regression target, `ln(count)`.
    pub f: real,
    /// Loss weight, `min(1, (count / xmax)^alpha)`.
    pub coef: real,
}

impl Item {
    pub fn new(l1: u32, l2: u32, count: f64, xmax: f64, alpha: f64) -> Self {
        let coef = if count >= xmax {
            1.0
        } else {
            (count / xmax).powf(alpha)
        };
        Item {
            l1,
            l2,
            f: count.ln() as real,
            coef: coef as real,
        }
    }
}

pub(crate) fn make_items(cooccurrence: &Cooccurrence, xmax: f64, alpha: f64) -> Vec<Item> {
    cooccurrence
        .encoded_matrix()
        .iter()
        .map(|(&key, &count)| {
            let (l1, l2) = bigram::decode(key);
            Item::new(l1, l2, count, xmax, alpha)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn weighting() {
        let saturated = Item::new(0, 1, 100.0, 100.0, 0.75);
        assert_eq!(saturated.coef, 1.0);
        assert_relative_eq!(saturated.f, (100.0f64).ln() as real);

        let above = Item::new(0, 1, 250.0, 100.0, 0.75);
        assert_eq!(above.coef, 1.0);

        let below = Item::new(0, 1, 10.0, 100.0, 0.75);
        assert_relative_eq!(below.coef, (0.1f64).powf(0.75) as real);
        assert!(below.coef < 1.0);
        assert_relative_eq!(below.f, (10.0f64).ln() as real);

        let single = Item::new(3, 4, 1.0, 100.0, 0.75);
        assert_eq!(single.f, 0.0);
    }

    #[test]
    fn one_item_per_entry() {
        let mut cooc = Cooccurrence::default();
        cooc.add(0, 1, 2.0);
        cooc.add(1, 0, 2.0);
        cooc.add(2, 2, 5.0);
        let mut items = make_items(&cooc, 100.0, 0.75);
        items.sort_by_key(|item| (item.l1, item.l2));
        let pairs: Vec<(u32, u32)> = items.iter().map(|item| (item.l1, item.l2)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert_relative_eq!(items[2].f, (5.0f64).ln() as real);
    }
}
