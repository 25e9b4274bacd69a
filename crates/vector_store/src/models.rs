use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::vector::EmbeddingVector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown user tier '{0}'")]
pub struct UnknownTier(pub String);

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }
}

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub tier: Tier,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i32,
    pub user_id: Option<i32>,
    pub title: String,
    pub upload_date: Option<DateTime<Utc>>,
}

/// A stored embedding row. The vector is kept raw since the column may hold
/// anything another writer put there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: i32,
    pub doc_id: Option<i32>,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// An embedding waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmbedding {
    pub doc_id: i32,
    pub content: String,
    pub vector: EmbeddingVector,
}

impl NewEmbedding {
    pub fn new(doc_id: i32, content: impl Into<String>, vector: EmbeddingVector) -> Self {
        Self {
            doc_id,
            content: content.into(),
            vector,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub embedding: Embedding,
    pub similarity: f64,
}

impl SearchResult {
    pub fn new(embedding: Embedding, similarity: f64) -> Self {
        Self {
            embedding,
            similarity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub users: Vec<User>,
    pub documents: Vec<Document>,
    pub embeddings: Vec<Embedding>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub users: i64,
    pub documents: i64,
    pub embeddings: i64,
}
