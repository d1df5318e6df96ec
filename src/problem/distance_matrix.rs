use serde::{Deserialize, Serialize};

/// Square table of pairwise values over the canonical location ordering
/// (depot at 0, customers following).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
}

pub fn euclidean((xi, yi): (f64, f64), (xj, yj): (f64, f64)) -> f64 {
    ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt()
}

impl DistanceMatrix {
    /// Only the upper triangle is computed; the lower one is mirrored, the
    /// diagonal stays exactly zero.
    pub fn with_euclidean_distances(coords: &[(f64, f64)]) -> Self {
        let n = coords.len();
        let mut rows = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let distance = euclidean(coords[i], coords[j]);
                rows[i][j] = distance;
                rows[j][i] = distance;
            }
        }
        Self { rows }
    }

    /// Wraps rows as they are; shape is checked by the validator.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[inline(always)]
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    pub fn max_distance(&self) -> f64 {
        self.rows
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(0.0, f64::max)
    }
}

pub struct DistanceMatrixBuilder {
    n: usize,
    rows: Vec<Vec<f64>>,
}

impl DistanceMatrixBuilder {
    pub fn with_num_nodes(num_nodes: usize) -> Self {
        Self {
            n: num_nodes,
            rows: vec![vec![0.0; num_nodes]; num_nodes],
        }
    }

    pub fn set_arc(&mut self, from: usize, to: usize, value: f64) -> &mut Self {
        debug_assert!(from < self.n);
        debug_assert!(to < self.n);
        self.rows[from][to] = value;
        self
    }

    pub fn build(self) -> DistanceMatrix {
        DistanceMatrix { rows: self.rows }
    }
}
