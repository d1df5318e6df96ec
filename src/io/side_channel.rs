use std::path::Path;

use ahash::AHashMap;
use serde::Deserialize;

use crate::error::{FormatError, IngestError};

/// One row of a PDPTW `configurations.txt`:
///
/// ```text
/// Name;Size;City;Distribution;Clusters;Density;Horizon;Time Window;Service Time;Capacity;Depot
/// bar-n100-1;100;Barcelona;cluster;3;0.6;240;60;5;100;central
/// ```
///
/// `-` marks an absent value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRow {
    pub name: String,
    pub size: Option<usize>,
    pub city: Option<String>,
    pub distribution: Option<String>,
    pub clusters: Option<u32>,
    pub density: Option<f64>,
    pub horizon: Option<f64>,
    pub time_window: Option<f64>,
    pub service_time: Option<f64>,
    pub capacity: Option<u64>,
    pub depot: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Size", default)]
    size: Option<String>,
    #[serde(rename = "City", default)]
    city: Option<String>,
    #[serde(rename = "Distribution", default)]
    distribution: Option<String>,
    #[serde(rename = "Clusters", default)]
    clusters: Option<String>,
    #[serde(rename = "Density", default)]
    density: Option<String>,
    #[serde(rename = "Horizon", default)]
    horizon: Option<String>,
    #[serde(rename = "Time Window", default)]
    time_window: Option<String>,
    #[serde(rename = "Service Time", default)]
    service_time: Option<String>,
    #[serde(rename = "Capacity", default)]
    capacity: Option<String>,
    #[serde(rename = "Depot", default)]
    depot: Option<String>,
}

/// Metadata rows keyed by instance name.
#[derive(Debug, Clone, Default)]
pub struct SideChannel {
    rows: AHashMap<String, ConfigRow>,
}

impl SideChannel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;
        Self::from_reader(reader, path)
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        path: &Path,
    ) -> Result<Self, IngestError> {
        let mut rows = AHashMap::new();
        for raw in reader.deserialize::<RawRow>() {
            let row = ConfigRow::try_from(raw.map_err(|e| csv_error(path, e))?)?;
            rows.insert(row.name.clone(), row);
        }
        Ok(Self { rows })
    }

    pub fn row(&self, name: &str) -> Option<&ConfigRow> {
        self.rows.get(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_error(path: &Path, e: csv::Error) -> IngestError {
    let source = match e.into_kind() {
        csv::ErrorKind::Io(e) => e,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{:?}", other)),
    };
    IngestError::io(path, source)
}

impl TryFrom<RawRow> for ConfigRow {
    type Error = FormatError;

    fn try_from(raw: RawRow) -> Result<Self, Self::Error> {
        Ok(ConfigRow {
            size: number(raw.size, "Size")?,
            city: text(raw.city),
            distribution: text(raw.distribution),
            clusters: number(raw.clusters, "Clusters")?,
            density: number(raw.density, "Density")?,
            horizon: number(raw.horizon, "Horizon")?,
            time_window: number(raw.time_window, "Time Window")?,
            service_time: number(raw.service_time, "Service Time")?,
            capacity: number(raw.capacity, "Capacity")?,
            depot: text(raw.depot),
            name: raw.name,
        })
    }
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|it| !it.is_empty() && it != "-")
}

fn number<T: std::str::FromStr>(value: Option<String>, key: &str) -> Result<Option<T>, FormatError> {
    text(value)
        .map(|value| {
            value.parse::<T>().map_err(|_| FormatError::InvalidScalar {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}
