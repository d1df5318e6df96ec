use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::io::artifact::OverwritePolicy;
use crate::problem::schema::{Domain, SchemaOverrides};

/// Pipeline configuration file, e.g.
///
/// ```toml
/// domain = "cvrp"
/// output_dir = "artifacts"
/// sources = ["data/cvrp/**/*.vrp"]
/// threads = 4
/// overwrite = "keep-existing"
///
/// [schema]
/// depot = "lowest-id"
/// uid-prefix = "augerat/"
/// ```
///
/// Every value can be overridden on the command line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub domain: Option<Domain>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<String>,
    pub side_channel: Option<PathBuf>,
    pub threads: Option<usize>,
    pub overwrite: Option<OverwritePolicy>,
    #[serde(default)]
    pub schema: SchemaOverrides,
}

pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<PipelineConfig> {
    let path = path.as_ref();
    let mut s = String::new();
    File::open(path)
        .with_context(|| format!("cannot open config {}", path.display()))?
        .read_to_string(&mut s)?;
    parse_config(&s).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(s: &str) -> anyhow::Result<PipelineConfig> {
    Ok(toml::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use crate::io::section_parser::SectionKind;
    use crate::problem::schema::DepotConvention;

    use super::*;

    #[test]
    fn can_read_config() -> anyhow::Result<()> {
        let config = parse_config(
            r#"
domain = "pickup-and-delivery"
output_dir = "out"
sources = ["a/*.txt", "b/*.txt"]
side_channel = "a/configurations.txt"
overwrite = "keep-existing"

[schema]
depot = { fixed-id = 1 }
headers = { "CUSTOMERS" = "nodes" }
"#,
        )?;
        assert_eq!(config.domain, Some(Domain::PickupAndDelivery));
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.overwrite, Some(OverwritePolicy::KeepExisting));
        assert_eq!(config.threads, None);
        assert_eq!(config.schema.depot, Some(DepotConvention::FixedId(1)));
        assert_eq!(config.schema.headers.get("CUSTOMERS"), Some(&SectionKind::Nodes));
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("domian = \"cvrp\"").is_err());
        assert!(parse_config("[schema]\ndepot_id = 3").is_err());
    }

    #[test]
    fn can_load_file() -> anyhow::Result<()> {
        let config = read_config("resources/pipeline.toml")?;
        assert_eq!(config.domain, Some(Domain::Cvrp));
        Ok(())
    }
}
