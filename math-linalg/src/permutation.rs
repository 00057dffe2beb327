//! Index permutations between natural and clustered orderings
//!
//! `o2p[i]` is the position of original index `i` in permuted order and
//! `p2o[p]` is the original index stored at permuted position `p`. The two
//! tables are always mutual inverses.

use crate::error::{LinalgError, Result};

/// Bijection of `0..n` stored in both directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPermutation {
    o2p: Vec<usize>,
    p2o: Vec<usize>,
}

impl IndexPermutation {
    /// Identity permutation of `0..n`
    pub fn identity(n: usize) -> Self {
        Self {
            o2p: (0..n).collect(),
            p2o: (0..n).collect(),
        }
    }

    /// Build from the permuted-to-original table, validating that it is a bijection
    pub fn from_p2o(p2o: Vec<usize>) -> Result<Self> {
        let n = p2o.len();
        let mut o2p = vec![usize::MAX; n];
        for (p, &o) in p2o.iter().enumerate() {
            if o >= n {
                return Err(LinalgError::InvalidPermutation(format!(
                    "index {o} at position {p} is out of range 0..{n}"
                )));
            }
            if o2p[o] != usize::MAX {
                return Err(LinalgError::InvalidPermutation(format!(
                    "index {o} appears twice"
                )));
            }
            o2p[o] = p;
        }
        Ok(Self { o2p, p2o })
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        self.p2o.len()
    }

    /// Whether the permutation is empty
    pub fn is_empty(&self) -> bool {
        self.p2o.is_empty()
    }

    /// Original index to permuted position
    pub fn o2p(&self) -> &[usize] {
        &self.o2p
    }

    /// Permuted position to original index
    pub fn p2o(&self) -> &[usize] {
        &self.p2o
    }
}
