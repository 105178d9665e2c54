//! Gephi CSV writer.
//!
//! Writes a [`GraphExport`] as the node/edge table pair Gephi's spreadsheet
//! importer expects:
//!
//! - `<prefix>_nodes.csv`: `Id,Label,<attribute…>,Community`
//! - `<prefix>_edges.csv`: `Source,Target,Weight,Type` (always `Directed`)
//!
//! Attribute columns are the sorted union of every node's attribute names;
//! a node lacking one leaves the cell empty, as does a missing community.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::graph::GraphExport;

/// Paths of the two files produced for one export.
pub fn output_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let base = prefix.to_string_lossy();
    let base = base.strip_suffix(".csv").unwrap_or(&base);
    (
        PathBuf::from(format!("{}_nodes.csv", base)),
        PathBuf::from(format!("{}_edges.csv", base)),
    )
}

/// Write the node and edge tables. Returns `(nodes_path, edges_path)`.
pub fn write_csv(export: &GraphExport, prefix: &Path) -> Result<(PathBuf, PathBuf)> {
    let (nodes_path, edges_path) = output_paths(prefix);
    if let Some(parent) = nodes_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    write_nodes(export, &nodes_path)
        .with_context(|| format!("Failed to write {}", nodes_path.display()))?;
    write_edges(export, &edges_path)
        .with_context(|| format!("Failed to write {}", edges_path.display()))?;

    tracing::info!(
        scope = %export.scope,
        nodes = export.nodes.len(),
        edges = export.edges.len(),
        path = %nodes_path.display(),
        "Wrote Gephi CSV"
    );
    Ok((nodes_path, edges_path))
}

fn write_nodes(export: &GraphExport, path: &Path) -> Result<()> {
    let attributes = export.attribute_names();
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["Id".to_string(), "Label".to_string()];
    header.extend(attributes.iter().cloned());
    header.push("Community".to_string());
    writer.write_record(&header)?;

    for node in &export.nodes {
        let mut row = vec![node.id.clone(), node.label.clone()];
        for name in &attributes {
            row.push(
                node.attributes
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(node.community.map(|c| c.to_string()).unwrap_or_default());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_edges(export: &GraphExport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Source", "Target", "Weight", "Type"])?;
    for edge in &export.edges {
        let weight = edge.weight.to_string();
        writer.write_record([
            edge.source.as_str(),
            edge.target.as_str(),
            weight.as_str(),
            "Directed",
        ])?;
    }
    writer.flush()?;
    Ok(())
}
