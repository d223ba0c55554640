use rand::Rng;

/// Positions of the context words around `pos` in a document of length `len`,
/// for a window of `window` words on either side.
///
/// A random shrink `b` in `0..window` is drawn and only offsets `b..2*window-b`
/// are used, so nearby words are visited more often than distant ones.
pub(crate) fn context_positions<R: Rng>(
    pos: usize,
    len: usize,
    window: usize,
    rng: &mut R,
) -> impl Iterator<Item = usize> {
    let b = rng.gen_range(0..window);
    (b..(window * 2 + 1 - b))
        .filter(move |&a| a != window)
        .filter_map(move |a| (pos + a).checked_sub(window))
        .filter(move |&c| c < len)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::context_positions;

    #[test]
    fn stays_inside_document_and_skips_center() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            for pos in 0..6 {
                let ctx: Vec<usize> = context_positions(pos, 6, 2, &mut rng).collect();
                assert!(!ctx.contains(&pos));
                assert!(ctx.iter().all(|&c| c < 6 && c.abs_diff(pos) <= 2));
                assert!(!ctx.is_empty());
            }
        }
    }

    #[test]
    fn window_of_one_is_immediate_neighbours() {
        let mut rng = SmallRng::seed_from_u64(0);
        let ctx: Vec<usize> = context_positions(3, 10, 1, &mut rng).collect();
        assert_eq!(ctx, vec![2, 4]);
    }
}
