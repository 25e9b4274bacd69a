//! Server-rendered HTML for the overview and search pages.
use std::fmt::Write;
use vector_store::{Overview, SearchOutcome, SearchResult};

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; margin: 2rem; color: #1d1d1f; }
    nav a { margin-right: 1rem; }
    table { border-collapse: collapse; margin-bottom: 2rem; width: 100%; }
    th, td { border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; }
    th { background: #f6f8fa; }
    .error { color: #b00020; font-weight: 600; }
    input { width: 20rem; padding: 0.4rem; }
    button { padding: 0.45rem 1rem; }
"#;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
  <nav><a href="/">Overview</a><a href="/search">Search</a><a href="/api/stats">Stats (JSON)</a></nav>
  {body}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn format_vector(vector: Option<&[f32]>) -> String {
    match vector {
        Some(components) => {
            let parts: Vec<String> = components.iter().map(|c| c.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        None => "NULL".to_string(),
    }
}

fn format_optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "NULL".to_string(), |v| v.to_string())
}

pub fn render_error_page(message: &str) -> String {
    format!("<h1>Error</h1><p>{}</p>", escape_html(message))
}

pub fn render_overview(overview: &Overview) -> String {
    let mut body = String::from("<h1>Database Overview</h1>");

    let _ = write!(body, "<h2>Users ({})</h2>", overview.users.len());
    body.push_str("<table><tr><th>ID</th><th>Email</th><th>Tier</th><th>Created</th></tr>");
    for user in &overview.users {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            user.id,
            escape_html(&user.email),
            user.tier,
            format_optional(user.created_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())),
        );
    }
    body.push_str("</table>");

    let _ = write!(body, "<h2>Documents ({})</h2>", overview.documents.len());
    body.push_str(
        "<table><tr><th>ID</th><th>User ID</th><th>Title</th><th>Uploaded</th></tr>",
    );
    for document in &overview.documents {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            document.id,
            format_optional(document.user_id),
            escape_html(&document.title),
            format_optional(
                document
                    .upload_date
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            ),
        );
    }
    body.push_str("</table>");

    let _ = write!(body, "<h2>Embeddings ({})</h2>", overview.embeddings.len());
    body.push_str(
        "<table><tr><th>ID</th><th>Doc ID</th><th>Content</th><th>Embedding</th></tr>",
    );
    for embedding in &overview.embeddings {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            embedding.id,
            format_optional(embedding.doc_id),
            escape_html(&embedding.content),
            format_vector(embedding.embedding.as_deref()),
        );
    }
    body.push_str("</table>");

    page("Database Overview", &body)
}

fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "<p>No embeddings stored yet.</p>".to_string();
    }

    let mut table = String::from(
        "<table><tr><th>ID</th><th>Doc ID</th><th>Content</th><th>Embedding</th><th>Similarity</th></tr>",
    );
    for result in results {
        let _ = write!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.4}</td></tr>",
            result.embedding.id,
            format_optional(result.embedding.doc_id),
            escape_html(&result.embedding.content),
            format_vector(result.embedding.embedding.as_deref()),
            result.similarity,
        );
    }
    table.push_str("</table>");
    table
}

/// `submitted` is echoed back into the form so the user can correct it.
pub fn render_search_page(submitted: &str, outcome: &SearchOutcome) -> String {
    let mut body = format!(
        r#"<h1>Similarity Search</h1>
  <form method="post" action="/search">
    <label for="query_vector">Query vector (3 numbers, comma or space separated)</label><br />
    <input id="query_vector" name="query_vector" value="{}" placeholder="0.1, 0.9, 0.2" />
    <button type="submit">Search</button>
  </form>"#,
        escape_html(submitted)
    );

    match outcome {
        SearchOutcome::NoInput => {}
        SearchOutcome::ValidationError(e) => {
            let _ = write!(body, r#"<p class="error">{}</p>"#, escape_html(&e.to_string()));
        }
        SearchOutcome::QueryError(message) => {
            let _ = write!(
                body,
                r#"<p class="error">Database error: {}</p>"#,
                escape_html(message)
            );
        }
        SearchOutcome::Results { query, results } => {
            let _ = write!(
                body,
                "<h2>Top {} results for {}</h2>",
                results.len(),
                escape_html(&query.to_string())
            );
            body.push_str(&render_results(results));
        }
    }

    page("Similarity Search", &body)
}
