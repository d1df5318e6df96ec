use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use enum_map::{Enum, EnumMap};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::problem::schema::InstanceSchema;

/**
Section-delimited benchmark files, e.g. TSPLIB / CVRPLIB:

----------

NAME : A-n32-k5
COMMENT : (Augerat et al, No of trucks: 5, Optimal value: 784)
TYPE : CVRP
DIMENSION : 32
EDGE_WEIGHT_TYPE : EUC_2D
CAPACITY : 100
NODE_COORD_SECTION
 1 82 76
 2 96 44
 ...
DEMAND_SECTION
1 0
2 19
...
DEPOT_SECTION
 1
 -1
EOF

----------

or Sartori & Buriol PDPTW files, where `NODES` holds composite records
`<id> <lat> <lon> <dem> <etw> <ltw> <dur> <p> <d>` and `EDGES` holds one row
of travel times per node.

Header lines switch the active section; which headers exist and which section
they open is defined by the [InstanceSchema]. `KEY: value` lines are collected
as scalars outside of sections. A line reading `EOF` ends the file.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    NodeCoord,
    Demand,
    Depot,
    Nodes,
    Edges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Seeking,
    Section(SectionKind),
    /// inside a `*_SECTION` block the schema does not know
    Ignoring,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordRecord {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemandRecord {
    pub id: u64,
    pub demand: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// <id>:   the unique node identifier
    pub id: u64,
    pub x: f64,
    pub y: f64,
    /// <dem>:  dem > 0 for pickup, dem < 0 for delivery
    pub demand: i64,
    /// <etw>:  earliest possible time to start service
    pub ready: f64,
    /// <ltw>:  latest possible time to start service
    pub due: f64,
    /// <dur>:  the service duration at this location
    pub service: f64,
    /// <p>:    the pickup pair if <id> is a delivery, and 0 otherwise
    pub pickup: Option<u64>,
    /// <d>:    the delivery pair if <id> is a pickup, and 0 otherwise
    pub delivery: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Coord(CoordRecord),
    Demand(DemandRecord),
    Depot(u64),
    Node(NodeRecord),
    EdgeRow(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub section: Option<SectionKind>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedSource {
    sections: EnumMap<SectionKind, Vec<Record>>,
    seen: EnumMap<SectionKind, bool>,
    scalars: BTreeMap<String, String>,
    skipped: Vec<SkippedLine>,
    ignored_sections: Vec<String>,
    terminated: bool,
}

impl ParsedSource {
    pub fn records(&self, kind: SectionKind) -> &[Record] {
        &self.sections[kind]
    }

    /// Whether the header of `kind` appeared, even if the section was empty.
    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.seen[kind]
    }

    pub fn coords(&self) -> impl Iterator<Item = &CoordRecord> {
        self.sections[SectionKind::NodeCoord]
            .iter()
            .filter_map(|record| match record {
                Record::Coord(coord) => Some(coord),
                _ => None,
            })
    }

    pub fn demands(&self) -> impl Iterator<Item = &DemandRecord> {
        self.sections[SectionKind::Demand]
            .iter()
            .filter_map(|record| match record {
                Record::Demand(demand) => Some(demand),
                _ => None,
            })
    }

    pub fn depot_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.sections[SectionKind::Depot]
            .iter()
            .filter_map(|record| match record {
                Record::Depot(id) => Some(*id),
                _ => None,
            })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.sections[SectionKind::Nodes]
            .iter()
            .filter_map(|record| match record {
                Record::Node(node) => Some(node),
                _ => None,
            })
    }

    pub fn edge_rows(&self) -> impl Iterator<Item = &Vec<f64>> {
        self.sections[SectionKind::Edges]
            .iter()
            .filter_map(|record| match record {
                Record::EdgeRow(row) => Some(row),
                _ => None,
            })
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(|it| it.as_str())
    }

    pub fn scalars(&self) -> &BTreeMap<String, String> {
        &self.scalars
    }

    pub fn skipped_lines(&self) -> &[SkippedLine] {
        &self.skipped
    }

    pub fn ignored_sections(&self) -> &[String] {
        &self.ignored_sections
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

pub struct SectionParser<'a> {
    schema: &'a InstanceSchema,
    state: ParserState,
    parsed: ParsedSource,
}

impl<'a> SectionParser<'a> {
    pub fn new(schema: &'a InstanceSchema) -> Self {
        Self {
            schema,
            state: ParserState::Seeking,
            parsed: ParsedSource::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn feed_line(&mut self, line_number: usize, line: &str) {
        if self.state == ParserState::Terminated {
            return;
        }
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line == "EOF" {
            self.state = ParserState::Terminated;
            self.parsed.terminated = true;
            return;
        }

        let first = line.split_whitespace().next().unwrap_or_default();
        if let Some(kind) = self.schema.section_for_header(first) {
            self.state = ParserState::Section(kind);
            self.parsed.seen[kind] = true;
            return;
        }
        if first.trim_end_matches(':').ends_with("_SECTION") {
            debug!("line {}: ignoring section {}", line_number, first);
            self.state = ParserState::Ignoring;
            self.parsed.ignored_sections.push(first.to_string());
            return;
        }
        // inside a section every line is a record candidate
        let in_section = matches!(self.state, ParserState::Section(_));
        if let Some((key, value)) = split_scalar(line).filter(|_| !in_section) {
            if self.parsed.scalars.contains_key(key) {
                self.skip(line_number, None, format!("duplicate scalar {}", key));
            } else {
                self.parsed.scalars.insert(key.to_string(), value.to_string());
            }
            return;
        }

        match self.state {
            ParserState::Seeking => {
                self.skip(line_number, None, "line outside of any section".to_string())
            }
            ParserState::Ignoring | ParserState::Terminated => {}
            ParserState::Section(SectionKind::Depot) => self.read_depot_line(line_number, line),
            ParserState::Section(kind) => match parse_record(kind, line) {
                Ok(record) => self.parsed.sections[kind].push(record),
                Err(reason) => self.skip(line_number, Some(kind), reason),
            },
        }
    }

    pub fn finish(self) -> ParsedSource {
        self.parsed
    }

    fn read_depot_line(&mut self, line_number: usize, line: &str) {
        // DEPOT_SECTION lists ids terminated by -1
        let mut ids = vec![];
        let mut closed = false;
        for token in line.split_whitespace() {
            match parse_integer(token) {
                Ok(-1) => {
                    closed = true;
                    break;
                }
                Ok(id) if id >= 0 => ids.push(id as u64),
                Ok(id) => {
                    return self.skip(
                        line_number,
                        Some(SectionKind::Depot),
                        format!("invalid depot id {}", id),
                    )
                }
                Err(reason) => return self.skip(line_number, Some(SectionKind::Depot), reason),
            }
        }
        self.parsed.sections[SectionKind::Depot].extend(ids.into_iter().map(Record::Depot));
        if closed {
            self.state = ParserState::Seeking;
        }
    }

    fn skip(&mut self, line_number: usize, section: Option<SectionKind>, reason: String) {
        warn!("skipping line {}: {}", line_number, reason);
        self.parsed.skipped.push(SkippedLine {
            line_number,
            section,
            reason,
        });
    }
}

pub fn parse_str(schema: &InstanceSchema, text: &str) -> ParsedSource {
    let mut parser = SectionParser::new(schema);
    for (idx, line) in text.lines().enumerate() {
        parser.feed_line(idx + 1, line);
        if parser.state() == ParserState::Terminated {
            break;
        }
    }
    parser.finish()
}

pub fn parse_file(schema: &InstanceSchema, path: impl AsRef<Path>) -> Result<ParsedSource, IngestError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let file = BufReader::new(&f);

    let mut parser = SectionParser::new(schema);
    for (idx, line) in file.lines().enumerate() {
        let line = line.map_err(|e| IngestError::io(path, e))?;
        parser.feed_line(idx + 1, &line);
        if parser.state() == ParserState::Terminated {
            break;
        }
    }
    Ok(parser.finish())
}

fn split_scalar(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let mut chars = key.chars();
    let starts_alphabetic = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    if !starts_alphabetic
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
    {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_record(kind: SectionKind, line: &str) -> Result<Record, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match kind {
        SectionKind::NodeCoord => {
            // <id> <x> <y>
            expect_arity(kind, &fields, 3, 3)?;
            Ok(Record::Coord(CoordRecord {
                id: parse_id(fields[0])?,
                x: parse_real(fields[1])?,
                y: parse_real(fields[2])?,
            }))
        }
        SectionKind::Demand => {
            // <id> <demand>
            expect_arity(kind, &fields, 2, 2)?;
            Ok(Record::Demand(DemandRecord {
                id: parse_id(fields[0])?,
                demand: parse_integer(fields[1])?,
            }))
        }
        SectionKind::Nodes => {
            // <id> <x> <y> <dem> <etw> <ltw> <dur> [<p> <d>]
            expect_arity(kind, &fields, 7, 9)?;
            let sibling = |idx: usize| -> Result<Option<u64>, String> {
                match fields.get(idx) {
                    Some(token) => parse_id(token).map(|id| Some(id).filter(|it| *it != 0)),
                    None => Ok(None),
                }
            };
            Ok(Record::Node(NodeRecord {
                id: parse_id(fields[0])?,
                x: parse_real(fields[1])?,
                y: parse_real(fields[2])?,
                demand: parse_integer(fields[3])?,
                ready: parse_real(fields[4])?,
                due: parse_real(fields[5])?,
                service: parse_real(fields[6])?,
                pickup: sibling(7)?,
                delivery: sibling(8)?,
            }))
        }
        SectionKind::Edges => fields
            .iter()
            .map(|token| parse_real(token))
            .collect::<Result<Vec<_>, _>>()
            .map(Record::EdgeRow),
        SectionKind::Depot => parse_id(fields[0]).map(Record::Depot),
    }
}

fn expect_arity(kind: SectionKind, fields: &[&str], min: usize, max: usize) -> Result<(), String> {
    if fields.len() < min || fields.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(format!(
            "{:?} record needs {} fields, found {}",
            kind,
            expected,
            fields.len()
        ));
    }
    Ok(())
}

/// Accepts `5` as well as integral reals like `5.0`.
pub(crate) fn parse_integer(token: &str) -> Result<i64, String> {
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value);
    }
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 => {
            Ok(value as i64)
        }
        Ok(_) => Err(format!("'{}' is not an integer", token)),
        Err(_) => Err(format!("'{}' is not numeric", token)),
    }
}

pub(crate) fn parse_id(token: &str) -> Result<u64, String> {
    let value = parse_integer(token)?;
    u64::try_from(value).map_err(|_| format!("'{}' is not a valid id", token))
}

pub(crate) fn parse_real(token: &str) -> Result<f64, String> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("'{}' is not finite", token)),
        Err(_) => Err(format!("'{}' is not numeric", token)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "NAME : scenario
TYPE : CVRP
DIMENSION : 4
EDGE_WEIGHT_TYPE : EUC_2D
CAPACITY : 10
NODE_COORD_SECTION
 1 0 0
 2 3 0
 3 0 4
 4 3 4
DEMAND_SECTION
1 0
2 1
3 1
4 1
DEPOT_SECTION
 1
 -1
EOF
";

    #[test]
    fn can_read_sections_and_scalars() {
        let parsed = parse_str(&InstanceSchema::cvrp(), SCENARIO);

        assert!(parsed.is_terminated());
        assert_eq!(parsed.coords().count(), 4);
        assert_eq!(parsed.demands().map(|it| it.demand).collect::<Vec<_>>(), vec![0, 1, 1, 1]);
        assert_eq!(parsed.depot_ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(parsed.scalar("CAPACITY"), Some("10"));
        assert_eq!(parsed.scalar("NAME"), Some("scenario"));
        assert!(parsed.skipped_lines().is_empty());
    }

    #[test]
    fn eof_stops_parsing_in_any_state() {
        let text = "NODE_COORD_SECTION\n1 0 0\nEOF\n2 1 1\nCAPACITY : 3\n";
        let parsed = parse_str(&InstanceSchema::cvrp(), text);
        assert_eq!(parsed.coords().count(), 1);
        assert_eq!(parsed.scalar("CAPACITY"), None);

        let schema = InstanceSchema::cvrp();
        let mut parser = SectionParser::new(&schema);
        parser.feed_line(1, "DEMAND_SECTION");
        assert_eq!(parser.state(), ParserState::Section(SectionKind::Demand));
        parser.feed_line(2, "EOF");
        assert_eq!(parser.state(), ParserState::Terminated);
        parser.feed_line(3, "NODE_COORD_SECTION");
        assert_eq!(parser.state(), ParserState::Terminated);
    }

    #[test]
    fn malformed_lines_are_skipped_with_warning() {
        let text = "NODE_COORD_SECTION
1 0 0
2 abc 4
3 1
4 2 2 2
5 1 1
DEMAND_SECTION
1 0
5 1.5
5 2.0
EOF";
        let parsed = parse_str(&InstanceSchema::cvrp(), text);

        assert_eq!(parsed.coords().map(|it| it.id).collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(parsed.demands().map(|it| (it.id, it.demand)).collect::<Vec<_>>(), vec![(1, 0), (5, 2)]);
        let skipped: Vec<_> = parsed.skipped_lines().iter().map(|it| it.line_number).collect();
        assert_eq!(skipped, vec![3, 4, 5, 9]);
        assert_eq!(parsed.skipped_lines()[0].section, Some(SectionKind::NodeCoord));
    }

    #[test]
    fn scalar_shaped_lines_inside_sections_are_skipped() {
        let text = "CAPACITY : 10\nNODE_COORD_SECTION\n1 0 0\nCAPACITY : 20\nNAME : late\n2 3 0\nEOF";
        let parsed = parse_str(&InstanceSchema::cvrp(), text);
        assert_eq!(parsed.scalar("CAPACITY"), Some("10"));
        assert_eq!(parsed.scalar("NAME"), None);
        assert_eq!(parsed.coords().count(), 2);
        let skipped: Vec<_> = parsed.skipped_lines().iter().map(|it| it.line_number).collect();
        assert_eq!(skipped, vec![4, 5]);
    }

    #[test]
    fn depot_sentinel_returns_to_seeking() {
        let schema = InstanceSchema::cvrp();
        let mut parser = SectionParser::new(&schema);
        parser.feed_line(1, "DEPOT_SECTION");
        parser.feed_line(2, "7");
        assert_eq!(parser.state(), ParserState::Section(SectionKind::Depot));
        parser.feed_line(3, "-1");
        assert_eq!(parser.state(), ParserState::Seeking);
        assert_eq!(parser.finish().depot_ids().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let text = "EDGE_WEIGHT_SECTION\n0 1 2\n1 0 3\nNODE_COORD_SECTION\n1 0 0\nEOF";
        let parsed = parse_str(&InstanceSchema::cvrp(), text);
        assert_eq!(parsed.ignored_sections(), &["EDGE_WEIGHT_SECTION".to_string()]);
        assert!(parsed.skipped_lines().is_empty());
        assert_eq!(parsed.coords().count(), 1);
    }

    #[test]
    fn can_read_composite_nodes_and_edges() {
        let text = "NAME: tiny
SIZE: 3
NODES
0 -30.0 -51.2 0 0 100 0 0 0
1 -30.1 -51.1 5 10 40 3 0 2
2 -30.2 -51.0 -5 20 60 3 1 0
EDGES
0 4 7
4 0 2
7 2 0
EOF";
        let parsed = parse_str(&InstanceSchema::pickup_and_delivery(), text);
        let nodes: Vec<_> = parsed.nodes().collect();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].delivery, Some(2));
        assert_eq!(nodes[1].pickup, None);
        assert_eq!(nodes[2].demand, -5);
        assert_eq!(parsed.edge_rows().count(), 3);
        assert_eq!(parsed.scalar("SIZE"), Some("3"));
        assert!(parsed.has_section(SectionKind::Edges));
        assert!(!parsed.has_section(SectionKind::Depot));
    }

    #[test]
    fn lines_outside_sections_are_reported() {
        let parsed = parse_str(&InstanceSchema::cvrp(), "25 200 1\nCAPACITY : 5\nCAPACITY : 6\n");
        assert_eq!(parsed.scalar("CAPACITY"), Some("5"));
        assert_eq!(parsed.skipped_lines().len(), 2);
    }

    #[test]
    fn can_read_file() -> anyhow::Result<()> {
        let parsed = parse_file(&InstanceSchema::cvrp(), "resources/instances/cvrp/scenario.vrp")?;
        assert_eq!(parsed.coords().count(), 4);
        Ok(())
    }

    #[test]
    fn integer_coercion() {
        assert_eq!(parse_integer("12"), Ok(12));
        assert_eq!(parse_integer("12.0"), Ok(12));
        assert!(parse_integer("12.5").is_err());
        assert!(parse_integer("x").is_err());
        assert!(parse_id("-3").is_err());
        assert!(parse_real("NaN").is_err());
    }
}
