//! JSON Lines document input.

use anyhow::{Context, Result};
use simserver_index::Document;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

/// Read documents from a JSON Lines file, or stdin when `source` is `-`.
///
/// Each non-blank line is one `{"id": ..., "text": ..., ...}` object.
pub fn read_documents(source: &str) -> Result<Vec<Document>> {
    if source == "-" {
        parse_lines(io::stdin().lock(), "stdin")
    } else {
        let file = File::open(source).with_context(|| format!("Failed to open {}", source))?;
        parse_lines(BufReader::new(file), source)
    }
}

fn parse_lines<R: BufRead>(reader: R, source: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", source))?;
        if line.trim().is_empty() {
            continue;
        }

        let document: Document = serde_json::from_str(&line)
            .with_context(|| format!("Invalid document at {}:{}", source, number + 1))?;
        documents.push(document);
    }

    tracing::debug!("Read {} documents from {}", documents.len(), source);
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_lines() {
        let input = "{\"id\": \"a\", \"text\": \"graph minors\", \"lang\": \"en\"}\n\n{\"text\": \"no id\"}\n";
        let documents = parse_lines(input.as_bytes(), "test").unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id.as_deref(), Some("a"));
        assert_eq!(documents[0].metadata["lang"], "en");
        assert!(documents[1].id.is_none());
    }

    #[test]
    fn test_invalid_line_reports_position() {
        let input = "{\"id\": \"a\", \"text\": \"ok\"}\n{\"id\": \"b\"}\n";
        let err = parse_lines(input.as_bytes(), "docs.jsonl").unwrap_err();
        assert!(format!("{}", err).contains("docs.jsonl:2"));
    }

    #[test]
    fn test_read_documents_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"id\": \"x\", \"text\": \"user interface\"}}").unwrap();

        let documents = read_documents(file.path().to_str().unwrap()).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "user interface");
    }

    #[test]
    fn test_missing_file() {
        assert!(read_documents("/nonexistent/docs.jsonl").is_err());
    }
}
