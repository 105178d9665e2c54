//! Event ingestion.
//!
//! Reads the events produced by the repository miner: either one JSON array
//! or JSON Lines (one event per line) when the file extension is `.jsonl` or
//! `.ndjson`. Events without a `weight` default to 1.

use anyhow::{Context, Result};
use std::path::Path;

use crate::graph::Event;

/// Load events from a JSON or JSON Lines file.
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events from {}", path.display()))?;

    let events = if is_json_lines(path) {
        parse_json_lines(&contents)
            .with_context(|| format!("Failed to parse JSON Lines in {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON events in {}", path.display()))?
    };

    tracing::info!(path = %path.display(), count = events.len(), "Loaded events");
    Ok(events)
}

fn is_json_lines(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"))
}

/// Parse one event per non-blank line.
pub fn parse_json_lines(contents: &str) -> Result<Vec<Event>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationKind;
    use std::io::Write;

    const LINE_A: &str = r#"{"source":{"id":"A"},"target":{"id":"B"},"kind":"comment","timestamp":"2024-01-01T00:00:00Z"}"#;
    const LINE_B: &str = r#"{"source":{"id":"B"},"target":{"id":"C"},"kind":"closure","timestamp":"2024-01-02T00:00:00Z","weight":2.5}"#;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "events.json", &format!("[{},\n{}]", LINE_A, LINE_B));
        let events = load_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, RelationKind::Comment);
        assert!((events[0].weight - 1.0).abs() < f64::EPSILON);
        assert!((events[1].weight - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_json_lines_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "events.jsonl", &format!("{}\n\n{}\n", LINE_A, LINE_B));
        let events = load_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].source.id, "B");
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = parse_json_lines(&format!("{}\nnot json\n", LINE_A)).unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {}", err);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_events(Path::new("/tmp/definitely-missing-events-98765.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read events"));
    }
}
