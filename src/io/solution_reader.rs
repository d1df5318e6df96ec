use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{FormatError, IngestError, MissingFieldError};
use crate::io::section_parser::{parse_id, parse_real};
use crate::problem::instance::Instance;
use crate::problem::schema::{InstanceSchema, RouteNumbering};
use crate::problem::solution::Solution;

/**
Two families of solution files are accepted.

CVRPLIB (`A-n32-k5.sol`), customers numbered 1..n in canonical order:

----------

Route #1: 21 31 19 17 13 7 26
Route #2: 12 1 16 30
...
Cost 784

----------

SINTEF / Sartori & Buriol (`bar-n100-1.6_733.txt`), nodes given by their
location id, depot not included:

----------

Instance name:    bar-n100-1
Authors:          Carlo Sartori and Luciana Buriol
Date:             2019-2-11
Reference:        A matheuristic approach to the PDPTW (to be submitted).
Solution
Route 1 : 31 44 35 81 16 66 32 82 19 85 94 69
Route 2 : 29 21 71 27 47 79 11 22 97 77 72 6 61 25 56 75 1 51
...

----------
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionFile {
    /// Instance name:    bar-n100-1
    pub instance_name: Option<String>,
    /// Authors:          Carlo Sartori and Luciana Buriol
    pub authors: Option<String>,
    /// Date:             2019-2-11
    pub date_string: Option<String>,
    /// Reference:        A matheuristic approach to the PDPTW (to be submitted).
    pub reference: Option<String>,
    /// node references per route, numbering depends on the file family
    pub routes: Vec<Vec<u64>>,
    /// Cost 784
    pub cost: Option<f64>,
}

pub fn load_solution_file(path: impl AsRef<Path>) -> Result<SolutionFile, IngestError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let file = BufReader::new(&f);

    let mut lines = vec![];
    for line in file.lines() {
        lines.push(line.map_err(|e| IngestError::io(path, e))?);
    }
    Ok(read_solution_lines(lines.iter().map(|it| it.as_str()))?)
}

pub fn parse_solution_str(text: &str) -> Result<SolutionFile, FormatError> {
    read_solution_lines(text.lines())
}

fn read_solution_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<SolutionFile, FormatError> {
    let mut solution = SolutionFile::default();
    for (idx, line) in lines.enumerate() {
        let line_number = idx + 1;
        let line = line.trim();
        if line.is_empty() || line == "Solution" || line.starts_with("Solution:") {
            continue;
        }
        let malformed = |reason: String| FormatError::Malformed {
            line_number,
            section: None,
            reason,
        };

        if let Some(rest) = line.strip_prefix("Cost") {
            let value = rest.trim_start_matches(':').trim();
            solution.cost = Some(parse_real(value).map_err(malformed)?);
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| malformed(format!("unexpected line '{}'", line)))?;
        let value = value.trim();
        match key.trim() {
            "Instance name" => solution.instance_name = Some(value.to_string()),
            "Authors" => solution.authors = Some(value.to_string()),
            "Date" => solution.date_string = Some(value.to_string()),
            "Reference" => solution.reference = Some(value.to_string()),
            route if route.starts_with("Route") => {
                let route = value
                    .split_whitespace()
                    .map(parse_id)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(malformed)?;
                solution.routes.push(route);
            }
            other => return Err(malformed(format!("unknown property '{}'", other))),
        }
    }
    Ok(solution)
}

/// `Instance name:` if present, otherwise the file name up to its first dot.
pub fn solution_instance_uid(
    schema: &InstanceSchema,
    path: impl AsRef<Path>,
    file: &SolutionFile,
) -> String {
    let name = match &file.instance_name {
        Some(name) => name.clone(),
        None => path
            .as_ref()
            .file_name()
            .map(|it| it.to_string_lossy().to_string())
            .unwrap_or_default()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    format!("{}{}", schema.uid_prefix, name)
}

impl SolutionFile {
    /// Maps node references to 0-based customer indices of `instance`. Range
    /// and uniqueness of the indices are left to the validator.
    pub fn into_solution(
        self,
        instance: &Instance,
        numbering: RouteNumbering,
    ) -> Result<Solution, IngestError> {
        let mut tours = Vec::with_capacity(self.routes.len());
        for (route_idx, route) in self.routes.iter().enumerate() {
            let mut tour = Vec::with_capacity(route.len());
            for &node in route {
                let index = match numbering {
                    RouteNumbering::CustomerOrdinal => (node as usize).checked_sub(1),
                    RouteNumbering::LocationId => instance.customer_index_of(node),
                };
                tour.push(index.ok_or_else(|| {
                    MissingFieldError::new(format!(
                        "customer {} referenced by route {}",
                        node,
                        route_idx + 1
                    ))
                })?);
            }
            tours.push(tour);
        }
        Ok(Solution {
            instance_uid: instance.instance_uid().to_string(),
            tours,
            objective: self.cost,
            authors: self.authors,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::instance::tests::scenario_instance;

    use super::*;

    #[test]
    fn can_read_cvrplib_solution() -> anyhow::Result<()> {
        let file = parse_solution_str("Route #1: 1 3\nRoute #2: 2\nCost 16\n")?;
        assert_eq!(file.routes, vec![vec![1, 3], vec![2]]);
        assert_eq!(file.cost, Some(16.0));
        assert_eq!(file.instance_name, None);

        let solution = file.into_solution(&scenario_instance(), RouteNumbering::CustomerOrdinal)?;
        assert_eq!(solution.tours, vec![vec![0, 2], vec![1]]);
        assert_eq!(solution.objective, Some(16.0));
        assert_eq!(solution.instance_uid, "scenario");
        Ok(())
    }

    #[test]
    fn can_read_sintef_solution() -> anyhow::Result<()> {
        let text = "Instance name:    scenario
Authors:          Carlo Sartori and Luciana Buriol
Date:             2019-2-11
Reference:        A matheuristic approach to the PDPTW (to be submitted).
Solution
Route 1 : 4 2
Route 2 : 3
";
        let file = parse_solution_str(text)?;
        assert_eq!(file.instance_name.as_deref(), Some("scenario"));
        assert_eq!(file.date_string.as_deref(), Some("2019-2-11"));

        let solution = file.into_solution(&scenario_instance(), RouteNumbering::LocationId)?;
        assert_eq!(solution.tours, vec![vec![2, 0], vec![1]]);
        assert_eq!(solution.authors.as_deref(), Some("Carlo Sartori and Luciana Buriol"));
        Ok(())
    }

    #[test]
    fn unknown_references_and_lines() -> anyhow::Result<()> {
        let file = parse_solution_str("Route 1 : 1 2\n")?;
        assert!(matches!(
            file.into_solution(&scenario_instance(), RouteNumbering::LocationId),
            Err(IngestError::MissingField(_))
        ));

        assert!(matches!(
            parse_solution_str("Route #1: 1 x\n"),
            Err(FormatError::Malformed { line_number: 1, .. })
        ));
        assert!(parse_solution_str("something else\n").is_err());
        Ok(())
    }

    #[test]
    fn uid_from_header_or_file_name() {
        let schema = InstanceSchema::pickup_and_delivery();
        let file = SolutionFile::default();
        assert_eq!(solution_instance_uid(&schema, "sol/bar-n100-1.6_733.txt", &file), "bar-n100-1");

        let file = SolutionFile {
            instance_name: Some("ber-n100-2".to_string()),
            ..Default::default()
        };
        assert_eq!(solution_instance_uid(&schema, "whatever.txt", &file), "ber-n100-2");
    }

    #[test]
    fn can_load_file() -> anyhow::Result<()> {
        let file = load_solution_file("resources/solutions/cvrp/scenario.sol")?;
        assert_eq!(file.routes.len(), 2);
        Ok(())
    }
}
