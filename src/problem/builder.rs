use std::path::Path;

use ahash::AHashMap;
use itertools::Itertools;
use log::warn;

use crate::error::{FormatError, IngestError, MissingFieldError};
use crate::io::section_parser::{parse_integer, parse_real, DemandRecord, ParsedSource};
use crate::io::side_channel::ConfigRow;
use crate::problem::distance_matrix::{DistanceMatrix, DistanceMatrixBuilder};
use crate::problem::instance::{
    CvrpParameters, DomainParameters, PickupAndDeliveryParameters, ServiceWindow,
};
use crate::problem::schema::{DepotConvention, Domain, InstanceSchema, LocationSource};

#[derive(Debug, Clone, PartialEq)]
pub struct DraftLocation {
    pub location_id: u64,
    pub x: f64,
    pub y: f64,
    pub window: Option<ServiceWindow>,
}

/// Assembled but unchecked instance. Only the validator turns a draft into an
/// [crate::problem::instance::Instance].
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDraft {
    pub instance_uid: String,
    pub origin: String,
    pub parameters: DomainParameters,
    pub depot: DraftLocation,
    /// demand recorded for the depot itself, if the source lists one
    pub depot_demand: Option<i64>,
    /// ascending source id
    pub customers: Vec<DraftLocation>,
    /// demand records of customers, ascending source id; parallel to `customers`
    /// when the source is consistent
    pub demands: Vec<DemandRecord>,
    pub declared_dimension: Option<(String, usize)>,
    pub travel_times: Option<DistanceMatrix>,
}

impl InstanceDraft {
    pub fn num_locations(&self) -> usize {
        1 + self.customers.len()
    }

    /// Coordinates in canonical order, depot first.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        std::iter::once(&self.depot)
            .chain(self.customers.iter())
            .map(|it| (it.x, it.y))
            .collect()
    }
}

pub fn derive_instance_uid(schema: &InstanceSchema, path: impl AsRef<Path>) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|it| it.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}{}", schema.uid_prefix, stem)
}

pub struct InstanceBuilder<'a> {
    schema: &'a InstanceSchema,
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(schema: &'a InstanceSchema) -> Self {
        Self { schema }
    }

    pub fn build(
        &self,
        instance_uid: impl Into<String>,
        parsed: &ParsedSource,
        side_channel: Option<&ConfigRow>,
    ) -> Result<InstanceDraft, IngestError> {
        self.check_edge_weight_type(parsed)?;

        let (locations, node_demands) = match self.schema.locations {
            LocationSource::CoordinatesAndDemands => (
                parsed
                    .coords()
                    .map(|it| DraftLocation {
                        location_id: it.id,
                        x: it.x,
                        y: it.y,
                        window: None,
                    })
                    .collect::<Vec<_>>(),
                None,
            ),
            LocationSource::CompositeNodes => {
                let nodes = parsed.nodes().collect::<Vec<_>>();
                (
                    nodes
                        .iter()
                        .map(|it| DraftLocation {
                            location_id: it.id,
                            x: it.x,
                            y: it.y,
                            window: Some(ServiceWindow {
                                ready_time: it.ready,
                                due_time: it.due,
                                service_time: it.service,
                            }),
                        })
                        .collect::<Vec<_>>(),
                    Some(
                        nodes
                            .iter()
                            .map(|it| DemandRecord {
                                id: it.id,
                                demand: it.demand,
                            })
                            .collect::<Vec<_>>(),
                    ),
                )
            }
        };
        if locations.is_empty() {
            return Err(FormatError::NoLocationRecords.into());
        }

        let depot_id = self.depot_id(parsed, &locations)?;
        let depot_position = locations
            .iter()
            .position(|it| it.location_id == depot_id)
            .ok_or_else(|| MissingFieldError::new(format!("coordinates of depot {}", depot_id)))?;
        let depot = locations[depot_position].clone();
        // further records with the depot id stay, the validator rejects them
        let customers = locations
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != depot_position)
            .map(|(_, it)| it)
            .cloned()
            .sorted_by_key(|it| it.location_id)
            .collect::<Vec<_>>();

        let demand_records = match node_demands {
            Some(records) => records,
            None => parsed.demands().cloned().collect(),
        };
        let known_ids = locations
            .iter()
            .map(|it| it.location_id)
            .collect::<ahash::AHashSet<_>>();
        let mut depot_demand = None;
        let mut demands = vec![];
        for record in demand_records {
            if record.id == depot_id {
                depot_demand.get_or_insert(record.demand);
            } else if !known_ids.contains(&record.id) {
                return Err(
                    MissingFieldError::new(format!("coordinates of node {}", record.id)).into(),
                );
            } else {
                demands.push(record);
            }
        }
        demands.sort_by_key(|it| it.id);

        let parameters = match self.schema.domain {
            Domain::Cvrp => DomainParameters::Cvrp(CvrpParameters {
                vehicle_capacity: required(scalar_count(parsed, "CAPACITY")?, "CAPACITY")?,
            }),
            Domain::PickupAndDelivery => DomainParameters::PickupAndDelivery(
                pickup_and_delivery_parameters(parsed, side_channel, customers.len())?,
            ),
        };

        let declared_dimension = match &self.schema.dimension_key {
            Some(key) => scalar_count(parsed, key)?.map(|value| (key.clone(), value as usize)),
            None => None,
        };

        let travel_times = self.travel_times(parsed, &locations, &depot, &customers);

        Ok(InstanceDraft {
            instance_uid: instance_uid.into(),
            origin: self.schema.origin.clone(),
            parameters,
            depot,
            depot_demand,
            customers,
            demands,
            declared_dimension,
            travel_times,
        })
    }

    fn check_edge_weight_type(&self, parsed: &ParsedSource) -> Result<(), FormatError> {
        match parsed.scalar("EDGE_WEIGHT_TYPE") {
            Some(value)
                if !self.schema.edge_weight_types.is_empty()
                    && !self.schema.edge_weight_types.iter().any(|it| it == value) =>
            {
                Err(FormatError::Unsupported {
                    key: "EDGE_WEIGHT_TYPE".to_string(),
                    value: value.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn depot_id(
        &self,
        parsed: &ParsedSource,
        locations: &[DraftLocation],
    ) -> Result<u64, MissingFieldError> {
        let mut depot_ids = parsed.depot_ids().unique();
        if let Some(first) = depot_ids.next() {
            let others = depot_ids.collect::<Vec<_>>();
            if !others.is_empty() {
                warn!("using depot {}, ignoring further depot ids {:?}", first, others);
            }
            return Ok(first);
        }

        match self.schema.depot {
            DepotConvention::ExplicitSection => Err(MissingFieldError::new("DEPOT_SECTION")),
            DepotConvention::FixedId(id) => Ok(id),
            DepotConvention::LowestId => locations
                .iter()
                .map(|it| it.location_id)
                .min()
                .ok_or_else(|| MissingFieldError::new("depot")),
        }
    }

    /// `EDGES` rows follow the file order of the node records; they are moved
    /// into canonical order when the shape allows it and passed through
    /// otherwise, so that the validator can report the shape.
    fn travel_times(
        &self,
        parsed: &ParsedSource,
        locations: &[DraftLocation],
        depot: &DraftLocation,
        customers: &[DraftLocation],
    ) -> Option<DistanceMatrix> {
        let rows = parsed.edge_rows().cloned().collect::<Vec<_>>();
        if rows.is_empty() {
            return None;
        }
        let n = locations.len();
        if rows.len() != n || rows.iter().any(|row| row.len() != n) {
            return Some(DistanceMatrix::from_rows(rows));
        }

        let canonical: AHashMap<u64, usize> = std::iter::once(depot)
            .chain(customers.iter())
            .enumerate()
            .map(|(pos, it)| (it.location_id, pos))
            .collect();
        let mut builder = DistanceMatrixBuilder::with_num_nodes(n);
        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if let (Some(&from_pos), Some(&to_pos)) =
                    (canonical.get(&from.location_id), canonical.get(&to.location_id))
                {
                    builder.set_arc(from_pos, to_pos, rows[i][j]);
                }
            }
        }
        Some(builder.build())
    }
}

fn pickup_and_delivery_parameters(
    parsed: &ParsedSource,
    row: Option<&ConfigRow>,
    num_customers: usize,
) -> Result<PickupAndDeliveryParameters, IngestError> {
    let capacity = match row.and_then(|it| it.capacity) {
        Some(capacity) => Some(capacity),
        None => scalar_count(parsed, "CAPACITY")?,
    };
    let horizon = match row.and_then(|it| it.horizon) {
        Some(horizon) => Some(horizon),
        None => scalar_real(parsed, "ROUTE-TIME")?,
    };
    let time_window = match row.and_then(|it| it.time_window) {
        Some(width) => Some(width),
        None => scalar_real(parsed, "TIME-WINDOW")?,
    };
    let text = |value: Option<&String>, key: &str| {
        value
            .cloned()
            .or_else(|| parsed.scalar(key).map(|it| it.to_string()))
    };

    Ok(PickupAndDeliveryParameters {
        size: row.and_then(|it| it.size).unwrap_or(num_customers),
        capacity: required(capacity, "CAPACITY")?,
        horizon: required(horizon, "ROUTE-TIME")?,
        time_window,
        service_time: row.and_then(|it| it.service_time),
        city: text(row.and_then(|it| it.city.as_ref()), "LOCATION"),
        distribution: text(row.and_then(|it| it.distribution.as_ref()), "DISTRIBUTION"),
        clusters: row.and_then(|it| it.clusters),
        density: row.and_then(|it| it.density),
        depot_type: text(row.and_then(|it| it.depot.as_ref()), "DEPOT"),
    })
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, MissingFieldError> {
    value.ok_or_else(|| MissingFieldError::new(key))
}

fn invalid_scalar(key: &str, value: &str) -> FormatError {
    FormatError::InvalidScalar {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Non-negative integer scalar.
fn scalar_count(parsed: &ParsedSource, key: &str) -> Result<Option<u64>, FormatError> {
    parsed
        .scalar(key)
        .map(|value| {
            parse_integer(value)
                .ok()
                .and_then(|it| u64::try_from(it).ok())
                .ok_or_else(|| invalid_scalar(key, value))
        })
        .transpose()
}

fn scalar_real(parsed: &ParsedSource, key: &str) -> Result<Option<f64>, FormatError> {
    parsed
        .scalar(key)
        .map(|value| parse_real(value).map_err(|_| invalid_scalar(key, value)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use crate::io::section_parser::parse_str;

    use super::*;

    const SCENARIO: &str = "NAME : scenario
DIMENSION : 4
CAPACITY : 10
NODE_COORD_SECTION
4 3 4
2 3 0
1 0 0
3 0 4
DEMAND_SECTION
1 0
2 1
3 1
4 1
DEPOT_SECTION
1
-1
EOF";

    fn build(schema: &InstanceSchema, text: &str) -> Result<InstanceDraft, IngestError> {
        InstanceBuilder::new(schema).build("test", &parse_str(schema, text), None)
    }

    #[test]
    fn depot_first_then_ascending_ids() -> anyhow::Result<()> {
        let draft = build(&InstanceSchema::cvrp(), SCENARIO)?;
        assert_eq!(draft.depot.location_id, 1);
        assert_eq!(
            draft.customers.iter().map(|it| it.location_id).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(draft.coordinates(), vec![(0.0, 0.0), (3.0, 0.0), (0.0, 4.0), (3.0, 4.0)]);
        assert_eq!(draft.demands.iter().map(|it| it.demand).collect::<Vec<_>>(), vec![1, 1, 1]);
        assert_eq!(draft.depot_demand, Some(0));
        assert_eq!(draft.declared_dimension, Some(("DIMENSION".to_string(), 4)));
        assert_eq!(draft.parameters, DomainParameters::Cvrp(CvrpParameters { vehicle_capacity: 10 }));
        Ok(())
    }

    #[test]
    fn missing_depot_without_fallback() {
        let text = SCENARIO.replace("DEPOT_SECTION\n1\n-1\n", "");
        match build(&InstanceSchema::cvrp(), &text) {
            Err(IngestError::MissingField(e)) => assert_eq!(e.field, "DEPOT_SECTION"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn configurable_depot_fallback() -> anyhow::Result<()> {
        let text = SCENARIO.replace("DEPOT_SECTION\n1\n-1\n", "");
        let mut schema = InstanceSchema::cvrp();

        schema.depot = DepotConvention::FixedId(3);
        let draft = build(&schema, &text)?;
        assert_eq!(draft.depot.location_id, 3);
        assert_eq!(draft.customers.iter().map(|it| it.location_id).collect::<Vec<_>>(), vec![1, 2, 4]);

        schema.depot = DepotConvention::LowestId;
        assert_eq!(build(&schema, &text)?.depot.location_id, 1);

        schema.depot = DepotConvention::FixedId(9);
        assert!(matches!(build(&schema, &text), Err(IngestError::MissingField(_))));
        Ok(())
    }

    #[test]
    fn demand_without_coordinates_is_a_build_error() {
        let text = SCENARIO.replace("4 1\n", "4 1\n5 2\n");
        match build(&InstanceSchema::cvrp(), &text) {
            Err(IngestError::MissingField(e)) => assert_eq!(e.field, "coordinates of node 5"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn coordinates_without_demand_leave_demands_short() -> anyhow::Result<()> {
        let text = SCENARIO.replace("3 1\n", "");
        let draft = build(&InstanceSchema::cvrp(), &text)?;
        assert_eq!(draft.customers.len(), 3);
        assert_eq!(draft.demands.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_or_invalid_capacity() {
        let text = SCENARIO.replace("CAPACITY : 10\n", "");
        assert!(matches!(
            build(&InstanceSchema::cvrp(), &text),
            Err(IngestError::MissingField(MissingFieldError { .. }))
        ));
        let text = SCENARIO.replace("CAPACITY : 10", "CAPACITY : ten");
        assert!(matches!(
            build(&InstanceSchema::cvrp(), &text),
            Err(IngestError::Format(FormatError::InvalidScalar { .. }))
        ));
    }

    #[test]
    fn no_locations_is_a_format_error() {
        let text = "CAPACITY : 10\nDEPOT_SECTION\n1\n-1\nEOF";
        assert!(matches!(
            build(&InstanceSchema::cvrp(), text),
            Err(IngestError::Format(FormatError::NoLocationRecords))
        ));
    }

    #[test]
    fn unsupported_edge_weight_type() {
        let text = format!("EDGE_WEIGHT_TYPE : GEO\n{}", SCENARIO);
        assert!(matches!(
            build(&InstanceSchema::cvrp(), &text),
            Err(IngestError::Format(FormatError::Unsupported { .. }))
        ));
    }

    const PDP: &str = "NAME: tiny
CAPACITY: 6
ROUTE-TIME: 100
TIME-WINDOW: 30
LOCATION: porto-alegre
SIZE: 3
NODES
2 2.0 0.0 -5 20 60 3 1 0
0 0.0 0.0 0 0 100 0 0 0
1 1.0 0.0 5 10 40 3 0 2
EDGES
0 7 4
7 0 2
4 2 0
EOF";

    #[test]
    fn composite_nodes_with_edges() -> anyhow::Result<()> {
        let draft = build(&InstanceSchema::pickup_and_delivery(), PDP)?;
        assert_eq!(draft.depot.location_id, 0);
        assert_eq!(draft.customers.iter().map(|it| it.location_id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(draft.demands.iter().map(|it| it.demand).collect::<Vec<_>>(), vec![5, -5]);
        assert_eq!(draft.customers[0].window.map(|it| it.due_time), Some(40.0));

        // file order is 2, 0, 1; canonical order is 0, 1, 2
        let times = draft.travel_times.expect("travel times");
        assert_eq!(times.rows(), &[vec![0.0, 2.0, 7.0], vec![2.0, 0.0, 4.0], vec![7.0, 4.0, 0.0]]);

        match draft.parameters {
            DomainParameters::PickupAndDelivery(params) => {
                assert_eq!(params.size, 2);
                assert_eq!(params.capacity, 6);
                assert_eq!(params.horizon, 100.0);
                assert_eq!(params.city.as_deref(), Some("porto-alegre"));
            }
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn side_channel_takes_precedence() -> anyhow::Result<()> {
        let row = ConfigRow {
            name: "tiny".to_string(),
            capacity: Some(50),
            horizon: Some(480.0),
            clusters: Some(3),
            ..Default::default()
        };
        let schema = InstanceSchema::pickup_and_delivery();
        let draft = InstanceBuilder::new(&schema).build("tiny", &parse_str(&schema, PDP), Some(&row))?;
        match draft.parameters {
            DomainParameters::PickupAndDelivery(params) => {
                assert_eq!(params.capacity, 50);
                assert_eq!(params.horizon, 480.0);
                assert_eq!(params.time_window, Some(30.0));
                assert_eq!(params.clusters, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn uid_from_file_stem() {
        let mut schema = InstanceSchema::cvrp();
        assert_eq!(derive_instance_uid(&schema, "benchmark_src/Set_A/A-n32-k5.vrp"), "A-n32-k5");
        schema.uid_prefix = "cvrp/".to_string();
        assert_eq!(derive_instance_uid(&schema, "A-n32-k5.vrp"), "cvrp/A-n32-k5");
    }
}
