use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::io::section_parser::SectionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Cvrp,
    PickupAndDelivery,
}

impl Domain {
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Cvrp => "cvrp",
            Domain::PickupAndDelivery => "pickup-and-delivery",
        }
    }
}

/// Fallback used when a source carries no `DEPOT_SECTION`. An explicit depot
/// section always takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepotConvention {
    /// no fallback, the depot section is required
    ExplicitSection,
    FixedId(u64),
    LowestId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatrixPolicy {
    Euclidean,
    Omitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemandPolicy {
    NonNegative,
    /// pickups carry positive, deliveries negative demand
    Signed,
}

/// Where the location records of a domain come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationSource {
    /// `NODE_COORD_SECTION` merged with `DEMAND_SECTION` by id
    CoordinatesAndDemands,
    /// one composite record per node (coordinates, demand, time window)
    CompositeNodes,
}

/// How node references in solution files are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteNumbering {
    /// 1-based position of the customer in the canonical ordering (CVRPLIB)
    CustomerOrdinal,
    /// source location ids (SINTEF)
    LocationId,
}

/// Describes how one benchmark family is parsed, assembled and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSchema {
    pub domain: Domain,
    pub origin: String,
    pub headers: BTreeMap<String, SectionKind>,
    pub locations: LocationSource,
    pub depot: DepotConvention,
    pub distance_matrix: MatrixPolicy,
    pub demands: DemandPolicy,
    pub dimension_key: Option<String>,
    pub edge_weight_types: Vec<String>,
    pub uid_prefix: String,
    pub route_numbering: RouteNumbering,
}

impl InstanceSchema {
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Cvrp => Self::cvrp(),
            Domain::PickupAndDelivery => Self::pickup_and_delivery(),
        }
    }

    pub fn cvrp() -> Self {
        Self {
            domain: Domain::Cvrp,
            origin: "cvrp_benchmark".to_string(),
            headers: BTreeMap::from([
                ("NODE_COORD_SECTION".to_string(), SectionKind::NodeCoord),
                ("DEMAND_SECTION".to_string(), SectionKind::Demand),
                ("DEPOT_SECTION".to_string(), SectionKind::Depot),
            ]),
            locations: LocationSource::CoordinatesAndDemands,
            depot: DepotConvention::ExplicitSection,
            distance_matrix: MatrixPolicy::Euclidean,
            demands: DemandPolicy::NonNegative,
            dimension_key: Some("DIMENSION".to_string()),
            edge_weight_types: vec!["EUC_2D".to_string()],
            uid_prefix: String::new(),
            route_numbering: RouteNumbering::CustomerOrdinal,
        }
    }

    pub fn pickup_and_delivery() -> Self {
        Self {
            domain: Domain::PickupAndDelivery,
            origin: "PDPTW Mendeley Dataset".to_string(),
            headers: BTreeMap::from([
                ("NODES".to_string(), SectionKind::Nodes),
                ("NODE_COORD_SECTION".to_string(), SectionKind::Nodes),
                ("PICKUP_SECTION".to_string(), SectionKind::Nodes),
                ("EDGES".to_string(), SectionKind::Edges),
                ("DEPOT_SECTION".to_string(), SectionKind::Depot),
            ]),
            locations: LocationSource::CompositeNodes,
            depot: DepotConvention::FixedId(0),
            distance_matrix: MatrixPolicy::Omitted,
            demands: DemandPolicy::Signed,
            dimension_key: Some("SIZE".to_string()),
            edge_weight_types: vec![],
            uid_prefix: String::new(),
            route_numbering: RouteNumbering::LocationId,
        }
    }

    pub fn section_for_header(&self, token: &str) -> Option<SectionKind> {
        self.headers.get(token.trim_end_matches(':')).copied()
    }

    pub fn with_overrides(mut self, overrides: &SchemaOverrides) -> Self {
        if let Some(origin) = &overrides.origin {
            self.origin = origin.clone();
        }
        for (header, kind) in &overrides.headers {
            self.headers.insert(header.clone(), *kind);
        }
        if let Some(depot) = overrides.depot {
            self.depot = depot;
        }
        if let Some(policy) = overrides.distance_matrix {
            self.distance_matrix = policy;
        }
        if let Some(policy) = overrides.demands {
            self.demands = policy;
        }
        if let Some(key) = &overrides.dimension_key {
            self.dimension_key = Some(key.clone());
        }
        if let Some(types) = &overrides.edge_weight_types {
            self.edge_weight_types = types.clone();
        }
        if let Some(prefix) = &overrides.uid_prefix {
            self.uid_prefix = prefix.clone();
        }
        if let Some(numbering) = overrides.route_numbering {
            self.route_numbering = numbering;
        }
        self
    }
}

/// Optional `[schema]` table of the pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SchemaOverrides {
    pub origin: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, SectionKind>,
    pub depot: Option<DepotConvention>,
    pub distance_matrix: Option<MatrixPolicy>,
    pub demands: Option<DemandPolicy>,
    pub dimension_key: Option<String>,
    pub edge_weight_types: Option<Vec<String>>,
    pub uid_prefix: Option<String>,
    pub route_numbering: Option<RouteNumbering>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_trailing_colon() {
        let schema = InstanceSchema::cvrp();
        assert_eq!(
            schema.section_for_header("NODE_COORD_SECTION:"),
            Some(SectionKind::NodeCoord)
        );
        assert_eq!(schema.section_for_header("NODES"), None);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = SchemaOverrides {
            depot: Some(DepotConvention::FixedId(1)),
            headers: BTreeMap::from([("NODES".to_string(), SectionKind::NodeCoord)]),
            ..Default::default()
        };
        let schema = InstanceSchema::cvrp().with_overrides(&overrides);
        assert_eq!(schema.depot, DepotConvention::FixedId(1));
        assert_eq!(schema.section_for_header("NODES"), Some(SectionKind::NodeCoord));
        assert_eq!(schema.distance_matrix, MatrixPolicy::Euclidean);
        assert_eq!(schema.origin, "cvrp_benchmark");
    }
}
