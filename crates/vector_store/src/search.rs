use crate::models::SearchResult;
use crate::store::VectorStore;
use crate::vector::{parse_query_vector, EmbeddingVector, VectorError};

/// Terminal state of one search request.
///
/// `NoInput → Validating → {ValidationError | Querying} → {QueryError | Results}`
#[derive(Debug)]
pub enum SearchOutcome {
    /// Nothing was submitted (plain GET of the form).
    NoInput,
    ValidationError(VectorError),
    QueryError(String),
    Results {
        query: EmbeddingVector,
        results: Vec<SearchResult>,
    },
}

impl SearchOutcome {
    pub fn is_query_error(&self) -> bool {
        matches!(self, SearchOutcome::QueryError(_))
    }
}

/// Runs one search request. Input is validated before any connection is
/// opened, so malformed vectors never reach the database.
pub async fn run_search(store: &VectorStore, submitted: Option<&str>) -> SearchOutcome {
    let Some(input) = submitted else {
        return SearchOutcome::NoInput;
    };

    let query = match parse_query_vector(input) {
        Ok(query) => query,
        Err(e) => {
            tracing::info!("Rejected query vector {:?}: {}", input, e);
            return SearchOutcome::ValidationError(e);
        }
    };

    match store.similarity_search(&query).await {
        Ok(results) => SearchOutcome::Results { query, results },
        Err(e) => {
            tracing::error!("Similarity search failed: {:#}", e);
            SearchOutcome::QueryError(format!("{:#}", e))
        }
    }
}
