//! Workflow document parsing and discovery.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};

/// Parse a workflow document from a JSON string.
///
/// Only syntax is checked here; structure is the validator's job.
pub fn parse_document(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(Error::Parse("Empty workflow document".to_string()));
    }

    serde_json::from_str(text).map_err(|e| {
        Error::Parse(format!(
            "Invalid JSON at line {} column {}: {}",
            e.line(),
            e.column(),
            e
        ))
    })
}

/// Parse a workflow document from a file path.
pub fn parse_document_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    parse_document(&content)
}

/// List the workflow files in a directory, sorted by name.
///
/// The layout is flat: only `*.json` files directly inside `dir` count.
pub fn discover_workflow_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "Workflows directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if path.is_file() && is_json {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Pretty-printed JSON with a trailing newline, as stored on disk.
pub fn render_document(document: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(document)?;
    text.push('\n');
    Ok(text)
}

pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    std::fs::write(path, render_document(document)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_document() {
        let doc = parse_document(r#"{"name": "wf", "nodes": [], "connections": {}}"#).unwrap();
        assert_eq!(doc["name"], "wf");
    }

    #[test]
    fn test_parse_empty_document() {
        let err = parse_document("   \n").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("empty workflow"));
    }

    #[test]
    fn test_parse_invalid_json_reports_location() {
        let err = parse_document("{\n  \"name\": \n}").unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_discover_only_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = discover_workflow_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_workflow_files(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_write_document_is_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        write_document(&path, &json!({"name": "wf"})).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"name\": \"wf\"\n}\n");
        assert_eq!(parse_document_file(&path).unwrap()["name"], "wf");
    }
}
