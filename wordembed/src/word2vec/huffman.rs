use crate::corpus::Dictionary;

/// Huffman coding of the vocabulary for hierarchical softmax.
///
/// For each word id, `codes[id]` is the sequence of branch bits from the
/// root to the word's leaf and `points[id]` the inner nodes visited on the
/// way, numbered `0..len-1` with the root last. Frequent words get short
/// codes.
#[derive(Debug)]
pub(crate) struct HuffmanTree {
    codes: Vec<Vec<u8>>,
    points: Vec<Vec<u32>>,
}

impl HuffmanTree {
    pub fn new(dictionary: &Dictionary) -> Self {
        let vocab_size = dictionary.len();

        // Leaves must be sorted by decreasing count.
        let mut order: Vec<u32> = (0..vocab_size as u32).collect();
        order.sort_by_key(|&id| std::cmp::Reverse(dictionary.id_freq(id)));

        let mut count = vec![u64::MAX; vocab_size * 2];
        for (rank, &id) in order.iter().enumerate() {
            count[rank] = dictionary.id_freq(id);
        }
        let mut binary = vec![0u8; vocab_size * 2]; // which child a node is of its parent
        let mut parent_node = vec![0usize; vocab_size * 2];

        // Build the tree by adding one node at a time, always merging the
        // two smallest remaining nodes.
        let mut pos1 = vocab_size;
        let mut pos2 = vocab_size;
        for a in 0..vocab_size.saturating_sub(1) {
            let mut smallest = || {
                if pos1 > 0 && count[pos1 - 1] < count[pos2] {
                    pos1 -= 1;
                    pos1
                } else {
                    pos2 += 1;
                    pos2 - 1
                }
            };
            let min1i = smallest();
            let min2i = smallest();

            count[vocab_size + a] = count[min1i] + count[min2i];
            parent_node[min1i] = vocab_size + a;
            parent_node[min2i] = vocab_size + a;
            binary[min2i] = 1;
        }

        let root = (vocab_size * 2).saturating_sub(2);
        let mut codes = vec![vec![]; vocab_size];
        let mut points = vec![vec![]; vocab_size];
        for (rank, &id) in order.iter().enumerate() {
            let mut code = vec![];
            let mut point = vec![];
            let mut b = rank;
            while vocab_size > 1 && b != root {
                code.push(binary[b]);
                point.push((parent_node[b] - vocab_size) as u32);
                b = parent_node[b];
            }
            code.reverse();
            point.reverse();
            codes[id as usize] = code;
            points[id as usize] = point;
        }

        HuffmanTree { codes, points }
    }

    /// Branch bits from the root to `id`.
    pub fn code(&self, id: u32) -> &[u8] {
        &self.codes[id as usize]
    }

    /// Inner nodes from the root to `id`, one per bit of [`code`](Self::code).
    pub fn point(&self, id: u32) -> &[u32] {
        &self.points[id as usize]
    }

    /// Number of inner nodes.
    pub fn inner_nodes(&self) -> usize {
        self.codes.len().saturating_sub(1)
    }
}
