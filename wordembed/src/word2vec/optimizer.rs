use rand::Rng;

use crate::corpus::Dictionary;
use crate::error::Result;
use crate::matrix::{dot_slice, Matrix};
use crate::real;
use crate::unigram::UnigramTable;

use super::huffman::HuffmanTree;

const EXP_TABLE_SIZE: usize = 1000;
const MAX_EXP: real = 6.0;

/// Precomputed logistic function on `[-MAX_EXP, MAX_EXP)`.
#[derive(Debug)]
pub(crate) struct Sigmoid {
    table: Vec<real>,
}

impl Sigmoid {
    pub fn new() -> Self {
        let table = (0..EXP_TABLE_SIZE)
            .map(|i| {
                let e = ((i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP).exp();
                e / (e + 1.0)
            })
            .collect();
        Sigmoid { table }
    }

    /// `None` outside the table's range.
    #[inline]
    pub fn get(&self, f: real) -> Option<real> {
        if f <= -MAX_EXP || f >= MAX_EXP {
            return None;
        }
        let i = ((f + MAX_EXP) * (EXP_TABLE_SIZE as real / MAX_EXP / 2.0)) as usize;
        Some(self.table[i.min(EXP_TABLE_SIZE - 1)])
    }

    /// Saturates to 0 or 1 outside the table's range.
    #[inline]
    pub fn clamped(&self, f: real) -> real {
        match self.get(f) {
            Some(y) => y,
            None if f > 0.0 => 1.0,
            None => 0.0,
        }
    }
}

/// The output layer of word2vec.
#[derive(Debug)]
pub(crate) enum Optimizer {
    /// Output vectors are the context block, rows `vocab_size..2*vocab_size`
    /// of the parameter matrix.
    NegativeSampling {
        table: UnigramTable,
        negative: usize,
        vocab_size: usize,
    },
    /// Output vectors belong to the inner nodes of the Huffman tree.
    HierarchicalSoftmax {
        tree: HuffmanTree,
        weights: Matrix,
        max_depth: usize,
    },
}

impl Optimizer {
    pub fn negative_sampling(dictionary: &Dictionary, negative: usize) -> Self {
        Optimizer::NegativeSampling {
            table: UnigramTable::new(dictionary),
            negative,
            vocab_size: dictionary.len(),
        }
    }

    pub fn hierarchical_softmax(dictionary: &Dictionary, dim: usize, max_depth: usize) -> Result<Self> {
        let tree = HuffmanTree::new(dictionary);
        let weights = Matrix::zeros(tree.inner_nodes().max(1), dim)?;
        Ok(Optimizer::HierarchicalSoftmax {
            tree,
            weights,
            max_depth,
        })
    }

    /// Parameter rows needed for `vocab_size` words.
    pub fn param_rows(&self, vocab_size: usize) -> usize {
        match self {
            Optimizer::NegativeSampling { .. } => vocab_size * 2,
            Optimizer::HierarchicalSoftmax { .. } => vocab_size,
        }
    }

    /// One step of predicting `target` from `hidden`. Updates the output
    /// vectors in place and adds the error for `hidden` to `grad`.
    pub fn update<R: Rng>(
        &self,
        sigmoid: &Sigmoid,
        params: &Matrix,
        target: u32,
        hidden: &[real],
        grad: &mut [real],
        lr: real,
        rng: &mut R,
    ) {
        match self {
            Optimizer::NegativeSampling {
                table,
                negative,
                vocab_size,
            } => {
                for d in 0..=*negative {
                    let (sample, label) = if d == 0 {
                        (target, 1.0)
                    } else {
                        let sample = table.sample(rng);
                        if sample == target {
                            continue;
                        }
                        (sample, 0.0)
                    };
                    let ctx = params.row(*vocab_size + sample as usize);
                    let f = dot_slice(hidden, ctx);
                    let g = (label - sigmoid.clamped(f)) * lr;
                    for (e, c) in grad.iter_mut().zip(ctx) {
                        *e += g * c.get();
                    }
                    for (c, &h) in ctx.iter().zip(hidden) {
                        c.add(g * h);
                    }
                }
            }
            Optimizer::HierarchicalSoftmax {
                tree,
                weights,
                max_depth,
            } => {
                let code = tree.code(target);
                let point = tree.point(target);
                let depth = if *max_depth > 0 {
                    code.len().min(*max_depth)
                } else {
                    code.len()
                };
                for (&bit, &node) in code.iter().zip(point).take(depth) {
                    let inner = weights.row(node as usize);
                    let f = dot_slice(hidden, inner);
                    let Some(f) = sigmoid.get(f) else {
                        continue;
                    };
                    // 'g' is the gradient multiplied by the learning rate
                    let g = (1.0 - bit as real - f) * lr;
                    for (e, w) in grad.iter_mut().zip(inner) {
                        *e += g * w.get();
                    }
                    for (w, &h) in inner.iter().zip(hidden) {
                        w.add(g * h);
                    }
                }
            }
        }
    }
}
