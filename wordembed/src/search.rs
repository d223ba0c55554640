//! Nearest neighbours by cosine similarity.

use std::cmp::Reverse;
use std::io::BufRead;
use std::ops::Index;

use ordered_float::OrderedFloat;

use crate::corpus::Dictionary;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::real;

pub fn norm(v: &[real]) -> real {
    v.iter().copied().map(|e| e * e).sum::<real>().sqrt()
}

/// Scale `v` to unit length. A zero vector is left alone.
pub fn normalize(v: &mut [real]) {
    let len = norm(v);
    if len > 0.0 {
        for e in v {
            *e /= len;
        }
    }
}

fn dot(a: &[real], b: &[real]) -> real {
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

pub struct Searcher {
    dictionary: Dictionary,
    /// Embedding vector length.
    size: usize,
    /// `embeddings[k * size..(k+1) * size]` is the unit-length vector for word `k`.
    embeddings: Vec<real>,
}

impl Index<usize> for Searcher {
    type Output = [real];

    fn index(&self, i: usize) -> &[real] {
        &self.embeddings[i * self.size..][..self.size]
    }
}

impl Searcher {
    /// One row of `matrix` per word of `dictionary`.
    pub fn new(dictionary: Dictionary, matrix: &Matrix) -> Result<Self> {
        if dictionary.len() != matrix.rows() {
            return Err(Error::ShapeMismatch {
                dictionary: dictionary.len(),
                rows: matrix.rows(),
            });
        }
        let size = matrix.cols();
        let mut embeddings = Vec::with_capacity(matrix.rows() * size);
        for r in 0..matrix.rows() {
            let start = embeddings.len();
            embeddings.extend(matrix.row(r).iter().map(|x| x.get()));
            normalize(&mut embeddings[start..]);
        }
        Ok(Searcher {
            dictionary,
            size,
            embeddings,
        })
    }

    /// Read a word vector file. The vector size is taken from the first
    /// line; later lines of a different size, and repeated words, are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dictionary = Dictionary::new();
        let mut size = None;
        let mut embeddings = vec![];
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values = match fields.map(str::parse::<real>).collect::<std::result::Result<Vec<_>, _>>() {
                Ok(values) if !values.is_empty() => values,
                _ => continue,
            };
            if *size.get_or_insert(values.len()) != values.len() || dictionary.id(word).is_some() {
                continue;
            }
            dictionary.add(word, 1);
            let start = embeddings.len();
            embeddings.extend(values);
            normalize(&mut embeddings[start..]);
        }
        let size = size.ok_or(Error::EmptyVocabulary)?;
        Ok(Searcher {
            dictionary,
            size,
            embeddings,
        })
    }

    pub fn num_words(&self) -> usize {
        self.dictionary.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The `k` words most similar to the sum of `words`, most similar first.
    /// The query words themselves are excluded.
    pub fn search<S: AsRef<str>>(&self, words: &[S], k: usize) -> Result<Vec<(String, real)>> {
        let query = words
            .iter()
            .map(|w| {
                let w = w.as_ref();
                self.dictionary
                    .id(w)
                    .map(|id| id as usize)
                    .ok_or_else(|| Error::UnknownWord(w.to_string()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut vec = vec![0.0; self.size];
        for &i in &query {
            for (v, &r) in vec.iter_mut().zip(&self[i]) {
                *v += r;
            }
        }
        normalize(&mut vec);

        let mut best: Vec<(usize, real)> = (0..self.num_words())
            .filter(|c| !query.contains(c))
            .map(|c| (c, dot(&vec, &self[c])))
            .collect();
        best.sort_by_key(|&(_, dist)| Reverse(OrderedFloat(dist)));
        Ok(best
            .into_iter()
            .take(k)
            .filter_map(|(c, dist)| {
                let word = self.dictionary.word(c as u32)?;
                Some((word.to_string(), dist))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use approx::assert_relative_eq;

    use super::*;

    const VECTORS: &str = "\
king 1 1 0
queen 1 0.9 0.1
apple 0 0 1
pear 0 0.1 1
";

    #[test]
    fn nearest_first() {
        let searcher = Searcher::from_reader(Cursor::new(VECTORS)).unwrap();
        assert_eq!(searcher.num_words(), 4);
        assert_eq!(searcher.size(), 3);
        let hits = searcher.search(&["king"], 2).unwrap();
        assert_eq!(hits[0].0, "queen");
        assert!(hits[0].1 > hits[1].1);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn rows_are_unit_length() {
        let searcher = Searcher::from_reader(Cursor::new(VECTORS)).unwrap();
        for i in 0..searcher.num_words() {
            assert_relative_eq!(norm(&searcher[i]), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn unknown_words_fail() {
        let searcher = Searcher::from_reader(Cursor::new(VECTORS)).unwrap();
        assert!(matches!(
            searcher.search(&["king", "banana"], 3),
            Err(Error::UnknownWord(w)) if w == "banana"
        ));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "a 1 0\nb 1\nc x y\na 0 1\nd 0 1\n";
        let searcher = Searcher::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(searcher.num_words(), 2);
        assert_eq!(searcher[0].to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn from_matrix() {
        let mut dic = Dictionary::new();
        dic.add("x", 1);
        dic.add("y", 1);
        let m = Matrix::new(2, 2, |r, row| row[r] = 3.0).unwrap();
        let searcher = Searcher::new(dic.clone(), &m).unwrap();
        assert_eq!(searcher[1].to_vec(), vec![0.0, 1.0]);
        let wrong = Matrix::zeros(3, 2).unwrap();
        assert!(matches!(
            Searcher::new(dic, &wrong),
            Err(Error::ShapeMismatch { dictionary: 2, rows: 3 })
        ));
    }
}
