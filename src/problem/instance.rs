use serde::{Deserialize, Serialize};

use crate::problem::distance_matrix::DistanceMatrix;
use crate::problem::schema::Domain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: u64,
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn coords(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceWindow {
    pub ready_time: f64,
    pub due_time: f64,
    pub service_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Depot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<ServiceWindow>,
    },
    Customer {
        /// 0-based position among the customers, referenced by solution tours
        index: usize,
        demand: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<ServiceWindow>,
    },
}

impl Role {
    pub fn is_depot(&self) -> bool {
        matches!(self, Role::Depot { .. })
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, Role::Customer { .. })
    }

    pub fn window(&self) -> Option<&ServiceWindow> {
        match self {
            Role::Depot { window } | Role::Customer { window, .. } => window.as_ref(),
        }
    }
}

/// A location together with its role in the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(flatten)]
    pub location: Location,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvrpParameters {
    pub vehicle_capacity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupAndDeliveryParameters {
    /// number of pickup and delivery locations, excluding the depot
    pub size: usize,
    pub capacity: u64,
    /// planning horizon
    pub horizon: f64,
    pub time_window: Option<f64>,
    pub service_time: Option<f64>,
    pub city: Option<String>,
    pub distribution: Option<String>,
    pub clusters: Option<u32>,
    pub density: Option<f64>,
    pub depot_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainParameters {
    Cvrp(CvrpParameters),
    PickupAndDelivery(PickupAndDeliveryParameters),
}

impl DomainParameters {
    pub fn domain(&self) -> Domain {
        match self {
            DomainParameters::Cvrp(_) => Domain::Cvrp,
            DomainParameters::PickupAndDelivery(_) => Domain::PickupAndDelivery,
        }
    }

    pub fn capacity(&self) -> u64 {
        match self {
            DomainParameters::Cvrp(params) => params.vehicle_capacity,
            DomainParameters::PickupAndDelivery(params) => params.capacity,
        }
    }
}

/// A validated problem instance. Values of this type are produced by the
/// validator or read back from a checked artifact; they are never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    instance_uid: String,
    origin: String,
    parameters: DomainParameters,
    locations: Vec<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance_matrix: Option<DistanceMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    travel_times: Option<DistanceMatrix>,
}

impl Instance {
    pub(crate) fn new_unchecked(
        instance_uid: String,
        origin: String,
        parameters: DomainParameters,
        locations: Vec<Site>,
        distance_matrix: Option<DistanceMatrix>,
        travel_times: Option<DistanceMatrix>,
    ) -> Self {
        Self {
            instance_uid,
            origin,
            parameters,
            locations,
            distance_matrix,
            travel_times,
        }
    }

    pub fn instance_uid(&self) -> &str {
        &self.instance_uid
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn parameters(&self) -> &DomainParameters {
        &self.parameters
    }

    pub fn domain(&self) -> Domain {
        self.parameters.domain()
    }

    pub fn locations(&self) -> &[Site] {
        &self.locations
    }

    pub fn depot(&self) -> Option<&Site> {
        self.locations.first().filter(|site| site.role.is_depot())
    }

    pub fn customers(&self) -> impl Iterator<Item = &Site> {
        self.locations.iter().filter(|site| site.role.is_customer())
    }

    pub fn num_customers(&self) -> usize {
        self.customers().count()
    }

    pub fn demands(&self) -> Vec<i64> {
        self.customers()
            .filter_map(|site| match site.role {
                Role::Customer { demand, .. } => Some(demand),
                Role::Depot { .. } => None,
            })
            .collect()
    }

    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.locations.iter().map(|site| site.location.coords()).collect()
    }

    pub fn customer_index_of(&self, location_id: u64) -> Option<usize> {
        self.customers()
            .find(|site| site.location.location_id == location_id)
            .and_then(|site| match site.role {
                Role::Customer { index, .. } => Some(index),
                Role::Depot { .. } => None,
            })
    }

    pub fn distance_matrix(&self) -> Option<&DistanceMatrix> {
        self.distance_matrix.as_ref()
    }

    pub fn travel_times(&self) -> Option<&DistanceMatrix> {
        self.travel_times.as_ref()
    }

    pub fn statistics(&self) -> InstanceStatistics {
        let demands = self.demands();
        let num_customers = demands.len();
        let total_demand: i64 = demands.iter().filter(|it| **it > 0).sum();
        let capacity = self.parameters.capacity() as f64;
        let relative_vehicle_capacity = (total_demand > 0).then(|| capacity / total_demand as f64);
        let max_mean_customers_per_tour = (total_demand > 0)
            .then(|| capacity / (total_demand as f64 / num_customers as f64));
        InstanceStatistics {
            num_customers,
            total_demand,
            relative_vehicle_capacity,
            max_mean_customers_per_tour,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceStatistics {
    pub num_customers: usize,
    /// sum of positive demands
    pub total_demand: i64,
    /// capacity / total demand
    pub relative_vehicle_capacity: Option<f64>,
    /// capacity / mean demand
    pub max_mean_customers_per_tour: Option<f64>,
}
