//! Multi-document YAML splitting

use crate::document::Document;
use tracing::debug;

/// Split `content` on lines that are exactly `---` and parse every chunk.
///
/// Blank chunks, unparseable chunks and chunks that are not a non-empty map
/// are dropped with a debug note naming `file_name`.
pub fn parse_documents(file_name: &str, content: &str) -> Vec<Document> {
    let mut documents = Vec::new();
    let mut chunk = String::new();

    for line in content.lines() {
        if line == "---" {
            push_chunk(file_name, &chunk, &mut documents);
            chunk.clear();
        } else {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }
    push_chunk(file_name, &chunk, &mut documents);

    documents
}

fn push_chunk(file_name: &str, chunk: &str, documents: &mut Vec<Document>) {
    if chunk.trim().is_empty() {
        return;
    }

    match Document::from_yaml(chunk) {
        Ok(doc) if doc.is_object() => documents.push(doc),
        Ok(_) => debug!(file = file_name, "Skipping YAML chunk that is not a map"),
        Err(err) => debug!(file = file_name, error = %err, "Failed to parse YAML chunk"),
    }
}
