use crate::error::Result;
use crate::matrix::{dot, Matrix};
use crate::real;

/// Update rule for one (word, context) pair. Rows are `dim` weights followed
/// by a bias.
#[derive(Debug)]
pub(crate) enum Solver {
    /// Plain SGD with a fixed learning rate.
    Stochastic,
    /// AdaGrad. `gradsq` has the shape of the parameter matrix and starts at 1.
    AdaGrad { gradsq: Matrix },
}

impl Solver {
    pub fn adagrad(rows: usize, cols: usize) -> Result<Self> {
        let gradsq = Matrix::new(rows, cols, |_, row| row.fill(1.0))?;
        Ok(Solver::AdaGrad { gradsq })
    }

    /// Move `l1 · l2 + b1 + b2` toward `f`, weighted by `coef`.
    pub fn train_one(&self, params: &Matrix, l1: usize, l2: usize, f: real, coef: real, lr: real) {
        let w1 = params.row(l1);
        let w2 = params.row(l2);
        let dim = params.cols() - 1;
        let (v1, b1) = w1.split_at(dim);
        let (v2, b2) = w2.split_at(dim);

        let diff = dot(v1, v2) + b1[0].get() + b2[0].get() - f;
        let fdiff = coef * diff;

        match self {
            Solver::Stochastic => {
                for (x1, x2) in v1.iter().zip(v2) {
                    let t1 = fdiff * x2.get();
                    let t2 = fdiff * x1.get();
                    x1.add(-lr * t1);
                    x2.add(-lr * t2);
                }
                b1[0].add(-lr * fdiff);
                b2[0].add(-lr * fdiff);
            }
            Solver::AdaGrad { gradsq } => {
                let g1 = gradsq.row(l1);
                let g2 = gradsq.row(l2);
                for i in 0..dim {
                    let t1 = fdiff * v2[i].get();
                    let t2 = fdiff * v1[i].get();
                    v1[i].add(-lr * t1 / g1[i].get().sqrt());
                    v2[i].add(-lr * t2 / g2[i].get().sqrt());
                    g1[i].add(t1 * t1);
                    g2[i].add(t2 * t2);
                }
                b1[0].add(-lr * fdiff / g1[dim].get().sqrt());
                b2[0].add(-lr * fdiff / g2[dim].get().sqrt());
                g1[dim].add(fdiff * fdiff);
                g2[dim].add(fdiff * fdiff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loss(params: &Matrix, l1: usize, l2: usize, f: real) -> real {
        let dim = params.cols() - 1;
        let (w1, w2) = (params.row_values(l1), params.row_values(l2));
        let d: real = (0..dim).map(|i| w1[i] * w2[i]).sum::<real>() + w1[dim] + w2[dim] - f;
        d * d
    }

    fn params() -> Matrix {
        Matrix::new(4, 3, |r, row| {
            for (c, v) in row.iter_mut().enumerate() {
                *v = 0.1 * (r + c) as real;
            }
        })
        .unwrap()
    }

    #[test]
    fn sgd_reduces_loss() {
        let params = params();
        let solver = Solver::Stochastic;
        let before = loss(&params, 0, 3, 2.0);
        for _ in 0..20 {
            solver.train_one(&params, 0, 3, 2.0, 1.0, 0.05);
        }
        assert!(loss(&params, 0, 3, 2.0) < before);
        assert_eq!(params.row_values(1), self::params().row_values(1));
    }

    #[test]
    fn adagrad_reduces_loss_and_accumulates() {
        let params = params();
        let solver = Solver::adagrad(4, 3).unwrap();
        let before = loss(&params, 1, 2, 1.5);
        for _ in 0..20 {
            solver.train_one(&params, 1, 2, 1.5, 0.5, 0.05);
        }
        assert!(loss(&params, 1, 2, 1.5) < before);
        let Solver::AdaGrad { gradsq } = &solver else {
            unreachable!()
        };
        assert!(gradsq.row_values(1).iter().all(|&g| g > 1.0));
        assert_eq!(gradsq.row_values(0), vec![1.0; 3]);
    }
}
