use std::fmt;

use fixedbitset::FixedBitSet;
use itertools::Itertools;

use crate::problem::builder::{DraftLocation, InstanceDraft};
use crate::problem::distance_matrix::DistanceMatrix;
use crate::problem::instance::{DomainParameters, Instance, Location, Role, ServiceWindow, Site};
use crate::problem::schema::{DemandPolicy, Domain, InstanceSchema, MatrixPolicy};
use crate::problem::solution::Solution;

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    InvalidInstanceUid { uid: String },
    DomainMismatch { expected: Domain, found: Domain },
    NoLocations,
    DepotCount { found: usize },
    DepotNotFirst { position: usize },
    DuplicateLocationId { location_id: u64 },
    NonFiniteCoordinate { location_id: u64 },
    CustomerOrder { position: usize, location_id: u64 },
    CustomerIndex { position: usize, index: usize },
    DemandCount { customers: usize, demands: usize },
    DemandReference { position: usize, customer_id: u64, demand_id: u64 },
    NegativeDemand { location_id: u64, demand: i64 },
    DepotDemand { location_id: u64, demand: i64 },
    DimensionMismatch { key: String, declared: usize, actual: usize },
    NonPositiveCapacity,
    InvalidHorizon { horizon: f64 },
    InvalidWindow { location_id: u64, window: ServiceWindow },
    MissingMatrix,
    MatrixRowCount { matrix: &'static str, expected: usize, actual: usize },
    MatrixRowLength { matrix: &'static str, row: usize, expected: usize, actual: usize },
    MatrixEntry { matrix: &'static str, row: usize, column: usize, value: f64 },
    MatrixDiagonal { matrix: &'static str, index: usize, value: f64 },
    MatrixAsymmetric { row: usize, column: usize },
    SolutionInstance { expected: String, found: String },
    TourIndex { tour: usize, position: usize, index: usize, num_customers: usize },
    CustomerVisitedTwice { tour: usize, index: usize },
    InvalidObjective { objective: f64 },
    ArtifactUid { expected: String, found: String },
}

/// A failed invariant together with the offending indices or values.
pub type InvariantViolation = Violation;

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Violation::*;
        match self {
            InvalidInstanceUid { uid } => write!(f, "instance uid '{}' is not path safe", uid),
            DomainMismatch { expected, found } => {
                write!(f, "expected a {} instance, found {}", expected.name(), found.name())
            }
            NoLocations => write!(f, "instance has no locations"),
            DepotCount { found } => write!(f, "expected exactly one depot, found {}", found),
            DepotNotFirst { position } => {
                write!(f, "depot at position {}, expected position 0", position)
            }
            DuplicateLocationId { location_id } => {
                write!(f, "location id {} occurs more than once", location_id)
            }
            NonFiniteCoordinate { location_id } => {
                write!(f, "location {} has non-finite coordinates", location_id)
            }
            CustomerOrder {
                position,
                location_id,
            } => write!(
                f,
                "customer {} at position {} breaks ascending id order",
                location_id, position
            ),
            CustomerIndex { position, index } => write!(
                f,
                "customer at position {} has index {}, expected {}",
                position,
                index,
                position.saturating_sub(1)
            ),
            DemandCount { customers, demands } => write!(
                f,
                "{} customers but {} demands",
                customers, demands
            ),
            DemandReference {
                position,
                customer_id,
                demand_id,
            } => write!(
                f,
                "demand {} refers to node {}, expected customer {}",
                position, demand_id, customer_id
            ),
            NegativeDemand {
                location_id,
                demand,
            } => write!(f, "customer {} has negative demand {}", location_id, demand),
            DepotDemand {
                location_id,
                demand,
            } => write!(f, "depot {} has demand {}", location_id, demand),
            DimensionMismatch {
                key,
                declared,
                actual,
            } => write!(f, "{} declares {}, found {}", key, declared, actual),
            NonPositiveCapacity => write!(f, "capacity must be positive"),
            InvalidHorizon { horizon } => write!(f, "invalid horizon {}", horizon),
            InvalidWindow {
                location_id,
                window,
            } => write!(
                f,
                "location {} has invalid service window [{}, {}] with service time {}",
                location_id, window.ready_time, window.due_time, window.service_time
            ),
            MissingMatrix => write!(f, "distance matrix is required but missing"),
            MatrixRowCount {
                matrix,
                expected,
                actual,
            } => write!(f, "{} has {} rows, expected {}", matrix, actual, expected),
            MatrixRowLength {
                matrix,
                row,
                expected,
                actual,
            } => write!(
                f,
                "{} row {} has {} columns, expected {}",
                matrix, row, actual, expected
            ),
            MatrixEntry {
                matrix,
                row,
                column,
                value,
            } => write!(f, "{} entry ({}, {}) is {}", matrix, row, column, value),
            MatrixDiagonal {
                matrix,
                index,
                value,
            } => write!(f, "{} diagonal entry {} is {}, expected 0", matrix, index, value),
            MatrixAsymmetric { row, column } => write!(
                f,
                "distance matrix entries ({}, {}) and ({}, {}) differ",
                row, column, column, row
            ),
            SolutionInstance { expected, found } => write!(
                f,
                "solution refers to instance '{}', expected '{}'",
                found, expected
            ),
            TourIndex {
                tour,
                position,
                index,
                num_customers,
            } => write!(
                f,
                "tour {} position {} references customer {}, instance has {} customers",
                tour, position, index, num_customers
            ),
            CustomerVisitedTwice { tour, index } => {
                write!(f, "customer {} visited again in tour {}", index, tour)
            }
            InvalidObjective { objective } => write!(f, "invalid objective {}", objective),
            ArtifactUid { expected, found } => write!(
                f,
                "artifact stored as '{}' holds instance '{}'",
                expected, found
            ),
        }
    }
}

impl std::error::Error for Violation {}

/// Allowed: ASCII alphanumerics, `-`, `_` and `/`, without a leading or
/// trailing `/`.
pub fn check_instance_uid(uid: &str) -> Result<(), Violation> {
    let valid = !uid.is_empty()
        && !uid.starts_with('/')
        && !uid.ends_with('/')
        && !uid.contains("//")
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/');
    if valid {
        Ok(())
    } else {
        Err(Violation::InvalidInstanceUid {
            uid: uid.to_string(),
        })
    }
}

/// Enforces the structural invariants of instances and solutions. Checks stop
/// at the first violation; nothing is corrected.
pub struct Validator<'a> {
    schema: &'a InstanceSchema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a InstanceSchema) -> Self {
        Self { schema }
    }

    pub fn validate(
        &self,
        draft: InstanceDraft,
        distance_matrix: Option<DistanceMatrix>,
    ) -> Result<Instance, Violation> {
        check_instance_uid(&draft.instance_uid)?;
        check_unique_ids(
            std::iter::once(&draft.depot)
                .chain(draft.customers.iter())
                .map(|it| it.location_id),
        )?;

        if draft.demands.len() != draft.customers.len() {
            return Err(Violation::DemandCount {
                customers: draft.customers.len(),
                demands: draft.demands.len(),
            });
        }
        for (position, (customer, demand)) in draft.customers.iter().zip(&draft.demands).enumerate()
        {
            if customer.location_id != demand.id {
                return Err(Violation::DemandReference {
                    position,
                    customer_id: customer.location_id,
                    demand_id: demand.id,
                });
            }
        }
        if let Some(demand) = draft.depot_demand.filter(|it| *it != 0) {
            return Err(Violation::DepotDemand {
                location_id: draft.depot.location_id,
                demand,
            });
        }
        if let Some((key, declared)) = &draft.declared_dimension {
            if *declared != draft.num_locations() {
                return Err(Violation::DimensionMismatch {
                    key: key.clone(),
                    declared: *declared,
                    actual: draft.num_locations(),
                });
            }
        }

        let site = |location: DraftLocation, role: Role| Site {
            location: Location {
                location_id: location.location_id,
                x: location.x,
                y: location.y,
            },
            role,
        };
        let window = draft.depot.window;
        let mut locations = vec![site(draft.depot, Role::Depot { window })];
        for (index, (customer, demand)) in
            draft.customers.into_iter().zip(draft.demands).enumerate()
        {
            let window = customer.window;
            locations.push(site(
                customer,
                Role::Customer {
                    index,
                    demand: demand.demand,
                    window,
                },
            ));
        }

        let instance = Instance::new_unchecked(
            draft.instance_uid,
            draft.origin,
            draft.parameters,
            locations,
            distance_matrix,
            draft.travel_times,
        );
        self.check_instance(&instance)?;
        Ok(instance)
    }

    pub fn check_instance(&self, instance: &Instance) -> Result<(), Violation> {
        check_instance_uid(instance.instance_uid())?;
        if instance.domain() != self.schema.domain {
            return Err(Violation::DomainMismatch {
                expected: self.schema.domain,
                found: instance.domain(),
            });
        }

        let locations = instance.locations();
        if locations.is_empty() {
            return Err(Violation::NoLocations);
        }
        let depots = locations.iter().positions(|it| it.role.is_depot()).collect::<Vec<_>>();
        if depots.len() != 1 {
            return Err(Violation::DepotCount {
                found: depots.len(),
            });
        }
        if depots[0] != 0 {
            return Err(Violation::DepotNotFirst {
                position: depots[0],
            });
        }
        check_unique_ids(locations.iter().map(|it| it.location.location_id))?;

        for (position, site) in locations.iter().enumerate() {
            let location_id = site.location.location_id;
            if !site.location.x.is_finite() || !site.location.y.is_finite() {
                return Err(Violation::NonFiniteCoordinate { location_id });
            }
            if let Some(window) = site.role.window() {
                check_window(location_id, window)?;
            }
            if let Role::Customer { index, demand, .. } = site.role {
                if index + 1 != position {
                    return Err(Violation::CustomerIndex { position, index });
                }
                if position > 1 && locations[position - 1].location.location_id >= location_id {
                    return Err(Violation::CustomerOrder {
                        position,
                        location_id,
                    });
                }
                if demand < 0 && self.schema.demands == DemandPolicy::NonNegative {
                    return Err(Violation::NegativeDemand {
                        location_id,
                        demand,
                    });
                }
            }
        }

        self.check_parameters(instance)?;

        let n = locations.len();
        match instance.distance_matrix() {
            Some(matrix) => check_matrix("distance matrix", matrix, n, true)?,
            None if self.schema.distance_matrix == MatrixPolicy::Euclidean => {
                return Err(Violation::MissingMatrix)
            }
            None => {}
        }
        if let Some(times) = instance.travel_times() {
            check_matrix("travel times", times, n, false)?;
        }
        Ok(())
    }

    pub fn check_solution(&self, instance: &Instance, solution: &Solution) -> Result<(), Violation> {
        if solution.instance_uid != instance.instance_uid() {
            return Err(Violation::SolutionInstance {
                expected: instance.instance_uid().to_string(),
                found: solution.instance_uid.clone(),
            });
        }
        let num_customers = instance.num_customers();
        let mut visited = FixedBitSet::with_capacity(num_customers);
        for (tour, customers) in solution.tours.iter().enumerate() {
            for (position, &index) in customers.iter().enumerate() {
                if index >= num_customers {
                    return Err(Violation::TourIndex {
                        tour,
                        position,
                        index,
                        num_customers,
                    });
                }
                if visited.put(index) {
                    return Err(Violation::CustomerVisitedTwice { tour, index });
                }
            }
        }
        match solution.objective {
            Some(objective) if !objective.is_finite() || objective < 0.0 => {
                Err(Violation::InvalidObjective { objective })
            }
            _ => Ok(()),
        }
    }

    fn check_parameters(&self, instance: &Instance) -> Result<(), Violation> {
        if instance.parameters().capacity() == 0 {
            return Err(Violation::NonPositiveCapacity);
        }
        if let DomainParameters::PickupAndDelivery(params) = instance.parameters() {
            if !params.horizon.is_finite() || params.horizon < 0.0 {
                return Err(Violation::InvalidHorizon {
                    horizon: params.horizon,
                });
            }
            if params.size != instance.num_customers() {
                return Err(Violation::DimensionMismatch {
                    key: "size".to_string(),
                    declared: params.size,
                    actual: instance.num_customers(),
                });
            }
        }
        Ok(())
    }
}

fn check_unique_ids(ids: impl Iterator<Item = u64>) -> Result<(), Violation> {
    match ids.duplicates().next() {
        Some(location_id) => Err(Violation::DuplicateLocationId { location_id }),
        None => Ok(()),
    }
}

fn check_window(location_id: u64, window: &ServiceWindow) -> Result<(), Violation> {
    let finite = window.ready_time.is_finite()
        && window.due_time.is_finite()
        && window.service_time.is_finite();
    if !finite || window.ready_time > window.due_time || window.service_time < 0.0 {
        return Err(Violation::InvalidWindow {
            location_id,
            window: *window,
        });
    }
    Ok(())
}

fn check_matrix(
    name: &'static str,
    matrix: &DistanceMatrix,
    n: usize,
    symmetric: bool,
) -> Result<(), Violation> {
    if matrix.dimension() != n {
        return Err(Violation::MatrixRowCount {
            matrix: name,
            expected: n,
            actual: matrix.dimension(),
        });
    }
    for (row, values) in matrix.rows().iter().enumerate() {
        if values.len() != n {
            return Err(Violation::MatrixRowLength {
                matrix: name,
                row,
                expected: n,
                actual: values.len(),
            });
        }
    }
    for (row, values) in matrix.rows().iter().enumerate() {
        for (column, &value) in values.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(Violation::MatrixEntry {
                    matrix: name,
                    row,
                    column,
                    value,
                });
            }
        }
        if values[row] != 0.0 {
            return Err(Violation::MatrixDiagonal {
                matrix: name,
                index: row,
                value: values[row],
            });
        }
    }
    if symmetric {
        for row in 0..n {
            for column in (row + 1)..n {
                if matrix.distance(row, column) != matrix.distance(column, row) {
                    return Err(Violation::MatrixAsymmetric { row, column });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::io::section_parser::parse_str;
    use crate::problem::builder::InstanceBuilder;
    use crate::problem::instance::tests::scenario_instance;

    use super::*;

    fn draft(text: &str) -> anyhow::Result<InstanceDraft> {
        let schema = InstanceSchema::cvrp();
        Ok(InstanceBuilder::new(&schema).build("A-n4-k1", &parse_str(&schema, text), None)?)
    }

    const SOURCE: &str = "DIMENSION : 4
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
EOF";

    fn validate(text: &str) -> anyhow::Result<Result<Instance, Violation>> {
        let draft = draft(text)?;
        let matrix = DistanceMatrix::with_euclidean_distances(&draft.coordinates());
        let schema = InstanceSchema::cvrp();
        Ok(Validator::new(&schema).validate(draft, Some(matrix)))
    }

    #[test]
    fn valid_instance_keeps_canonical_shape() -> anyhow::Result<()> {
        let instance = validate(SOURCE)??;
        assert_eq!(instance.locations().len(), 1 + instance.num_customers());
        assert!(instance.locations()[0].role.is_depot());
        let matrix = instance.distance_matrix().expect("matrix");
        assert_eq!(matrix.dimension(), 4);
        assert_eq!(matrix.distance(0, 1), 3.0);
        assert_eq!(matrix.distance(0, 2), 4.0);
        assert_eq!(matrix.distance(1, 2), 5.0);
        for i in 0..4 {
            assert_eq!(matrix.distance(i, i), 0.0);
            for j in 0..4 {
                assert_eq!(matrix.distance(i, j), matrix.distance(j, i));
            }
        }
        Ok(())
    }

    #[test]
    fn repeated_depot_coordinates_are_reported() -> anyhow::Result<()> {
        let text = SOURCE.replace("4 3 4\n", "4 3 4\n1 99 99\n");
        let draft = draft(&text)?;
        assert_eq!(draft.depot.x, 0.0);
        assert_eq!(draft.customers.len(), 4);

        assert_eq!(
            validate(&text)?,
            Err(Violation::DuplicateLocationId { location_id: 1 })
        );
        Ok(())
    }

    #[test]
    fn short_demand_section_fails_validation() -> anyhow::Result<()> {
        let text = SOURCE.replace("4 1\n", "");
        // the parser and the builder accept the source
        let draft = draft(&text)?;
        assert_eq!(draft.customers.len(), 3);

        assert_eq!(
            validate(&text)?,
            Err(Violation::DemandCount {
                customers: 3,
                demands: 2
            })
        );
        Ok(())
    }

    #[test]
    fn wrong_values_are_reported_not_corrected() -> anyhow::Result<()> {
        assert_eq!(
            validate(&SOURCE.replace("3 1\n", "3 -2\n"))?,
            Err(Violation::NegativeDemand {
                location_id: 3,
                demand: -2
            })
        );
        assert_eq!(
            validate(&SOURCE.replace("1 0\n2 1", "1 4\n2 1"))?,
            Err(Violation::DepotDemand {
                location_id: 1,
                demand: 4
            })
        );
        assert_eq!(
            validate(&SOURCE.replace("DIMENSION : 4", "DIMENSION : 5"))?,
            Err(Violation::DimensionMismatch {
                key: "DIMENSION".to_string(),
                declared: 5,
                actual: 4
            })
        );
        assert_eq!(
            validate(&SOURCE.replace("CAPACITY : 10", "CAPACITY : 0"))?,
            Err(Violation::NonPositiveCapacity)
        );
        assert_eq!(
            validate(&SOURCE.replace("4 3 4\n", "4 3 4\n3 5 5\n"))?,
            Err(Violation::DuplicateLocationId { location_id: 3 })
        );
        Ok(())
    }

    #[test]
    fn missing_matrix_is_rejected() -> anyhow::Result<()> {
        let schema = InstanceSchema::cvrp();
        let result = Validator::new(&schema).validate(draft(SOURCE)?, None);
        assert_eq!(result, Err(Violation::MissingMatrix));
        Ok(())
    }

    #[test]
    fn matrix_shape_is_reported_with_indices() -> anyhow::Result<()> {
        let schema = InstanceSchema::cvrp();
        let validator = Validator::new(&schema);

        let mut rows = DistanceMatrix::with_euclidean_distances(&draft(SOURCE)?.coordinates())
            .rows()
            .to_vec();
        rows[2].pop();
        let result = validator.validate(draft(SOURCE)?, Some(DistanceMatrix::from_rows(rows)));
        let violation = result.expect_err("ragged matrix");
        assert_eq!(violation.to_string(), "distance matrix row 2 has 3 columns, expected 4");

        let mut rows = vec![vec![0.0; 4]; 4];
        rows[1][3] = 1.0;
        rows[3][1] = 1.5;
        let result = validator.validate(draft(SOURCE)?, Some(DistanceMatrix::from_rows(rows)));
        assert_eq!(result, Err(Violation::MatrixAsymmetric { row: 1, column: 3 }));

        let mut rows = vec![vec![1.0; 4]; 4];
        rows[0][0] = 0.0;
        let result = validator.validate(draft(SOURCE)?, Some(DistanceMatrix::from_rows(rows)));
        assert_eq!(
            result,
            Err(Violation::MatrixDiagonal {
                matrix: "distance matrix",
                index: 1,
                value: 1.0
            })
        );

        let result = validator.validate(
            draft(SOURCE)?,
            Some(DistanceMatrix::with_euclidean_distances(&[(0.0, 0.0)])),
        );
        assert_eq!(
            result,
            Err(Violation::MatrixRowCount {
                matrix: "distance matrix",
                expected: 4,
                actual: 1
            })
        );
        Ok(())
    }

    #[test]
    fn instance_uid_rules() {
        assert!(check_instance_uid("A-n32-k5").is_ok());
        assert!(check_instance_uid("cvrp/set_a/A-n32-k5").is_ok());
        assert!(check_instance_uid("").is_err());
        assert!(check_instance_uid("/abs").is_err());
        assert!(check_instance_uid("dir/").is_err());
        assert!(check_instance_uid("a//b").is_err());
        assert!(check_instance_uid("a.b").is_err());
        assert!(check_instance_uid("../x").is_err());
    }

    #[test]
    fn invalid_uid_is_rejected() -> anyhow::Result<()> {
        let schema = InstanceSchema::cvrp();
        let mut draft = draft(SOURCE)?;
        draft.instance_uid = "A n4".to_string();
        let matrix = DistanceMatrix::with_euclidean_distances(&draft.coordinates());
        assert!(matches!(
            Validator::new(&schema).validate(draft, Some(matrix)),
            Err(Violation::InvalidInstanceUid { .. })
        ));
        Ok(())
    }

    #[test]
    fn check_instance_accepts_validated_instance() {
        let schema = InstanceSchema::cvrp();
        assert_eq!(Validator::new(&schema).check_instance(&scenario_instance()), Ok(()));

        let schema = InstanceSchema::pickup_and_delivery();
        assert!(matches!(
            Validator::new(&schema).check_instance(&scenario_instance()),
            Err(Violation::DomainMismatch { .. })
        ));
    }

    #[test]
    fn solution_indices() {
        let schema = InstanceSchema::cvrp();
        let validator = Validator::new(&schema);
        let instance = scenario_instance();
        let mut solution = Solution {
            instance_uid: "scenario".to_string(),
            tours: vec![vec![0, 2], vec![1]],
            objective: Some(14.0),
            authors: None,
        };
        assert_eq!(validator.check_solution(&instance, &solution), Ok(()));

        solution.tours = vec![vec![0, 3]];
        assert_eq!(
            validator.check_solution(&instance, &solution),
            Err(Violation::TourIndex {
                tour: 0,
                position: 1,
                index: 3,
                num_customers: 3
            })
        );

        solution.tours = vec![vec![0, 1], vec![1]];
        assert_eq!(
            validator.check_solution(&instance, &solution),
            Err(Violation::CustomerVisitedTwice { tour: 1, index: 1 })
        );

        solution.tours = vec![];
        solution.instance_uid = "other".to_string();
        assert!(matches!(
            validator.check_solution(&instance, &solution),
            Err(Violation::SolutionInstance { .. })
        ));
    }
}
