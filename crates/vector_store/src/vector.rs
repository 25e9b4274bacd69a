use demo_core::EMBEDDING_DIMENSIONS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// User-facing problems with a submitted or imported vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorError {
    #[error("Please enter a query vector.")]
    Empty,

    #[error("Invalid vector format: could not convert '{0}' to a finite number")]
    InvalidFormat(String),

    #[error("Query vector must have exactly {expected} dimensions.")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A vector with exactly [`EMBEDDING_DIMENSIONS`] finite components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector([f32; EMBEDDING_DIMENSIONS]);

impl EmbeddingVector {
    pub const fn new(components: [f32; EMBEDDING_DIMENSIONS]) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }
}

impl TryFrom<Vec<f32>> for EmbeddingVector {
    type Error = VectorError;

    fn try_from(components: Vec<f32>) -> Result<Self, Self::Error> {
        if let Some(bad) = components.iter().find(|c| !c.is_finite()) {
            return Err(VectorError::InvalidFormat(bad.to_string()));
        }

        let got = components.len();
        let array: [f32; EMBEDDING_DIMENSIONS] =
            components
                .try_into()
                .map_err(|_| VectorError::DimensionMismatch {
                    expected: EMBEDDING_DIMENSIONS,
                    got,
                })?;

        Ok(Self(array))
    }
}

impl FromStr for EmbeddingVector {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_query_vector(s)
    }
}

impl fmt::Display for EmbeddingVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Parses free text such as `"0.1, 0.9, 0.2"` or `"0.1 0.9 0.2"`.
///
/// Format problems are reported before the component count is checked, so
/// `"a b"` is an [`VectorError::InvalidFormat`] rather than a dimension error.
pub fn parse_query_vector(input: &str) -> Result<EmbeddingVector, VectorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(VectorError::Empty);
    }

    let components = trimmed
        .replace(',', " ")
        .split_whitespace()
        .map(parse_component)
        .collect::<Result<Vec<f32>, VectorError>>()?;

    EmbeddingVector::try_from(components)
}

pub(crate) fn parse_component(token: &str) -> Result<f32, VectorError> {
    token
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| VectorError::InvalidFormat(token.to_string()))
}

/// `1 - cosine_distance`, computed the way pgvector's `<=>` does.
///
/// Returns `None` when the lengths differ. A zero-length (all zero) vector
/// yields NaN, matching the database operator.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return Some(f64::NAN);
    }

    Some((dot / denominator).clamp(-1.0, 1.0))
}
