use serde::{Deserialize, Serialize};

/// Tours over 0-based customer indices of the referenced instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub instance_uid: String,
    pub tours: Vec<Vec<usize>>,
    pub objective: Option<f64>,
    pub authors: Option<String>,
}

impl Solution {
    pub fn number_of_tours(&self) -> usize {
        self.tours.iter().filter(|tour| !tour.is_empty()).count()
    }

    pub fn number_of_visits(&self) -> usize {
        self.tours.iter().map(|tour| tour.len()).sum()
    }
}
