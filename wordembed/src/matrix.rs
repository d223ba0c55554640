//! Dense parameter storage shared by all training workers.
//!
//! Every element is a [`Real`]: an `f32` kept in an `AtomicU32` and accessed
//! with relaxed loads and stores. Workers update rows concurrently without
//! any locking; an `add` racing with another `add` on the same element may
//! lose one of the two updates. Asynchronous SGD tolerates that, and it keeps
//! every access free of data races in the Rust sense.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use aligned_box::AlignedBox;

use crate::error::{Error, Result};
use crate::real;

/// Rows start on cache-line boundaries.
const ALIGNMENT: usize = 128;

#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    #[inline]
    pub fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Not atomic as a whole: a concurrent writer may be overwritten.
    #[inline]
    pub fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

impl fmt::Debug for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get().fmt(f)
    }
}

/// Dot product of two parameter rows.
#[inline]
pub fn dot(a: &[Real], b: &[Real]) -> real {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a.get() * b.get()).sum()
}

/// Dot product of a plain vector with a parameter row.
#[inline]
pub fn dot_slice(a: &[real], b: &[Real]) -> real {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&a, b)| a * b.get()).sum()
}

/// A `rows × cols` array of [`Real`]s. The shape is fixed at construction.
pub struct Matrix {
    rows: usize,
    cols: usize,
    /// `data[r * cols..(r+1) * cols]` is row `r`.
    data: AlignedBox<[Real]>,
}

impl Matrix {
    /// Allocate the matrix and fill it by calling `init` exactly once per row,
    /// in row order, with the row index and a zeroed buffer of length `cols`.
    pub fn new<F>(rows: usize, cols: usize, mut init: F) -> Result<Self>
    where
        F: FnMut(usize, &mut [real]),
    {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidOption(format!(
                "matrix shape must be non-empty, got {rows}x{cols}"
            )));
        }
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Allocation(format!("{rows}x{cols} overflows")))?;
        let data = AlignedBox::<[Real]>::slice_from_default(ALIGNMENT, len)
            .map_err(|err| Error::Allocation(format!("{err:?}")))?;

        let matrix = Matrix { rows, cols, data };
        let mut buf = vec![0.0; cols];
        for r in 0..rows {
            buf.fill(0.0);
            init(r, &mut buf);
            for (cell, &v) in matrix.row(r).iter().zip(&buf) {
                cell.set(v);
            }
        }
        Ok(matrix)
    }

    /// A matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Matrix::new(rows, cols, |_, _| {})
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `r` as a view into the shared storage. Panics if `r` is out of range.
    #[inline]
    pub fn row(&self, r: usize) -> &[Real] {
        &self.data[r * self.cols..][..self.cols]
    }

    /// A snapshot of row `r`.
    pub fn row_values(&self, r: usize) -> Vec<real> {
        self.row(r).iter().map(Real::get).collect()
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}
