//! Map file loading.
//!
//! A map is a line-oriented edge list, one undirected edge per line:
//!
//! ```text
//! # start_id,start_x,start_y,end_id,end_x,end_y,weight
//! N1,0,0,N2,100,0,12.5
//! ```
//!
//! Lines starting with `#` and blank lines are ignored. Weights are travel
//! times in seconds. Any failure here is a configuration error: the
//! simulation must not start.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::info;

use crate::routing::{Edge, GraphError, RoadGraph};

const FIELDS_PER_EDGE: usize = 7;

#[derive(Debug)]
pub enum MapLoadError {
    Io(io::Error),
    /// A data line that could not be read as seven fields.
    Malformed { line: u64, reason: String },
    InvalidEdge { line: u64, source: GraphError },
    /// The file held no edges at all.
    Empty,
}

impl fmt::Display for MapLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapLoadError::Io(err) => write!(f, "failed to read map: {err}"),
            MapLoadError::Malformed { line, reason } => {
                write!(f, "malformed map line {line}: {reason}")
            }
            MapLoadError::InvalidEdge { line, source } => write!(f, "map line {line}: {source}"),
            MapLoadError::Empty => write!(f, "map contains no edges"),
        }
    }
}

impl std::error::Error for MapLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapLoadError::Io(err) => Some(err),
            MapLoadError::InvalidEdge { source, .. } => Some(source),
            MapLoadError::Malformed { .. } | MapLoadError::Empty => None,
        }
    }
}

impl From<io::Error> for MapLoadError {
    fn from(err: io::Error) -> Self {
        MapLoadError::Io(err)
    }
}

/// Loads a road graph from a map file on disk.
pub fn load_map(path: impl AsRef<Path>) -> Result<RoadGraph, MapLoadError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let graph = read_map(file)?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "loaded road map"
    );
    Ok(graph)
}

/// Parses map rows from any reader, skipping comments and blank lines.
///
/// Every row goes through [`RoadGraph::add_edge`], so a bad weight or
/// coordinate is reported with the line it came from.
pub fn read_map<R: Read>(reader: R) -> Result<RoadGraph, MapLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut graph = RoadGraph::default();
    for record in csv_reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != FIELDS_PER_EDGE {
            return Err(MapLoadError::Malformed {
                line,
                reason: format!("expected {FIELDS_PER_EDGE} fields, found {}", record.len()),
            });
        }
        let edge: Edge = record
            .deserialize(None)
            .map_err(|err| MapLoadError::Malformed {
                line,
                reason: err.to_string(),
            })?;
        graph
            .add_edge(edge)
            .map_err(|source| MapLoadError::InvalidEdge { line, source })?;
    }

    if graph.edge_count() == 0 {
        return Err(MapLoadError::Empty);
    }
    Ok(graph)
}

fn csv_error(err: csv::Error) -> MapLoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        csv::ErrorKind::Io(io_err) => MapLoadError::Io(io_err),
        other => MapLoadError::Malformed {
            line,
            reason: format!("{other:?}"),
        },
    }
}
