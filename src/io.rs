//! Plain-text graph, membership and fractional-solution files.
//!
//! Graph files start with a `n [m]` header followed by one `i j weight` line
//! per edge, whitespace separated. Membership files hold one cluster id per
//! line, starting at 1.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::cutting_plane::SnapshotSink;
use crate::error::{Error, Result};
use crate::formulation::Formulation;
use crate::graph::{EdgeKey, SignedGraph};
use crate::heuristic::FeasibleSolution;
use crate::snapshot::ValueSnapshot;

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, what: &str) -> Result<T> {
    let field = field.ok_or_else(|| Error::Parse {
        line,
        message: format!("missing {what}"),
    })?;
    field.parse().map_err(|_| Error::Parse {
        line,
        message: format!("invalid {what} '{field}'"),
    })
}

/// Parses a graph from `reader`.
///
/// Zero weights mean "no edge". A pair listed twice keeps its last weight.
pub fn parse_graph<R: BufRead>(reader: R) -> Result<SignedGraph> {
    let mut lines = reader.lines().enumerate();
    let n: usize = loop {
        let (number, line) = lines.next().ok_or_else(|| Error::Parse {
            line: 1,
            message: "missing header".to_string(),
        })?;
        let line = line?;
        if !line.trim().is_empty() {
            break parse_field(line.split_whitespace().next(), number + 1, "vertex count")?;
        }
    };

    let mut weights: BTreeMap<EdgeKey, f64> = BTreeMap::new();
    for (number, line) in lines {
        let line = line?;
        let number = number + 1;
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else {
            continue;
        };
        let i: usize = parse_field(Some(first), number, "endpoint")?;
        let j: usize = parse_field(fields.next(), number, "endpoint")?;
        let weight: f64 = parse_field(fields.next(), number, "weight")?;
        if i >= n || j >= n {
            return Err(Error::Parse {
                line: number,
                message: format!("edge ({i}, {j}) out of range for {n} vertices"),
            });
        }
        let key = EdgeKey::try_new(i, j)?;
        if weights.insert(key, weight).is_some() {
            warn!("line {number}: edge {key} listed again, keeping weight {weight}");
        }
    }

    let graph = SignedGraph::new(
        n,
        weights
            .into_iter()
            .map(|(key, weight)| (key.lo(), key.hi(), weight)),
    )?;
    debug!("read graph with {} vertices and {} edges", graph.n(), graph.edge_count());
    Ok(graph)
}

pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<SignedGraph> {
    let file = File::open(path.as_ref())?;
    parse_graph(BufReader::new(file))
}

/// Parses one cluster id per line.
pub fn parse_membership<R: BufRead>(reader: R) -> Result<Vec<usize>> {
    let mut membership = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        membership.push(parse_field(Some(trimmed), number + 1, "cluster id")?);
    }
    Ok(membership)
}

pub fn read_membership<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let file = File::open(path.as_ref())?;
    parse_membership(BufReader::new(file))
}

pub fn write_membership_to<W: Write>(mut writer: W, solution: &FeasibleSolution) -> Result<()> {
    for id in solution.one_indexed() {
        writeln!(writer, "{id}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_membership<P: AsRef<Path>>(path: P, solution: &FeasibleSolution) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_membership_to(BufWriter::new(file), solution)
}

/// Writes the value of every variable in graph-file form: `n m` header, then
/// `i j value` lines.
pub fn write_fractional_graph_to<W: Write>(
    mut writer: W,
    formulation: &Formulation,
    values: &ValueSnapshot,
) -> Result<()> {
    writeln!(writer, "{}\t{}", formulation.n(), values.values().len())?;
    for (key, value) in values.iter() {
        writeln!(writer, "{}\t{}\t{}", key.lo(), key.hi(), value)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fractional_graph<P: AsRef<Path>>(
    path: P,
    formulation: &Formulation,
    values: &ValueSnapshot,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_fractional_graph_to(BufWriter::new(file), formulation, values)
}

/// Writes `fractionalGraph_gap=<g>.G` into a directory at every gap milestone.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    dir: PathBuf,
}

impl FileSnapshotSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, gap: f64) -> PathBuf {
        self.dir.join(format!("fractionalGraph_gap={gap}.G"))
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn write(&mut self, gap: f64, formulation: &Formulation, values: &ValueSnapshot) -> Result<()> {
        write_fractional_graph(self.path_for(gap), formulation, values)
    }
}
