use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use bench_ingest::io::artifact::OverwritePolicy;
use bench_ingest::io::config::{read_config, PipelineConfig};
use bench_ingest::problem::schema::{DepotConvention, Domain, InstanceSchema};

#[derive(Parser, Debug)]
#[command(version)]
pub struct ProgramArguments {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, help = "pipeline configuration (toml)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "benchmark family of the sources")]
    pub domain: Option<Domain>,

    #[arg(long, global = true, help = "artifact directory (default: artifacts)")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "origin recorded in every instance")]
    pub origin: Option<String>,

    #[arg(long, global = true, help = "prefix of derived instance uids")]
    pub uid_prefix: Option<String>,

    #[arg(long, global = true, help = "per-instance metadata (configurations.txt)")]
    pub side_channel: Option<PathBuf>,

    #[arg(long, global = true, help = "number of worker threads")]
    pub threads: Option<usize>,

    #[arg(long, global = true, value_enum)]
    pub overwrite: Option<OverwritePolicy>,

    #[arg(
        long,
        global = true,
        help = "depot id used when a source has no DEPOT_SECTION",
        conflicts_with = "lowest_id_depot"
    )]
    pub depot_id: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "use the lowest location id as depot when a source has no DEPOT_SECTION",
        default_value = "false"
    )]
    pub lowest_id_depot: bool,

    #[arg(long, global = true, help = "print summary to stdout", default_value = "false")]
    pub print_summary_to_stdout: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest benchmark instance files
    Instances {
        #[arg(help = "instance files or glob patterns")]
        sources: Vec<String>,
    },
    /// Ingest solution files for already ingested instances
    Solutions {
        #[arg(help = "solution files or glob patterns")]
        sources: Vec<String>,
    },
}

impl Command {
    pub fn sources(&self) -> &[String] {
        match self {
            Command::Instances { sources } | Command::Solutions { sources } => sources,
        }
    }
}

/// Configuration file merged with the command line.
#[derive(Debug)]
pub struct Settings {
    pub schema: InstanceSchema,
    pub output_dir: PathBuf,
    pub sources: Vec<String>,
    pub side_channel: Option<PathBuf>,
    pub threads: Option<usize>,
    pub overwrite: OverwritePolicy,
}

impl ProgramArguments {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let config = match &self.config {
            Some(path) => read_config(path)?,
            None => PipelineConfig::default(),
        };
        self.merge(config)
    }

    fn merge(&self, config: PipelineConfig) -> anyhow::Result<Settings> {
        let domain = match self.domain.or(config.domain) {
            Some(domain) => domain,
            None => bail!("no domain given, use --domain or set `domain` in the config"),
        };

        let mut schema = InstanceSchema::for_domain(domain).with_overrides(&config.schema);
        if let Some(origin) = &self.origin {
            schema.origin = origin.clone();
        }
        if let Some(prefix) = &self.uid_prefix {
            schema.uid_prefix = prefix.clone();
        }
        if let Some(id) = self.depot_id {
            schema.depot = DepotConvention::FixedId(id);
        } else if self.lowest_id_depot {
            schema.depot = DepotConvention::LowestId;
        }

        let sources = if self.command.sources().is_empty() {
            config.sources
        } else {
            self.command.sources().to_vec()
        };
        if sources.is_empty() {
            bail!("no sources given");
        }

        Ok(Settings {
            schema,
            output_dir: self
                .output_dir
                .clone()
                .or(config.output_dir)
                .unwrap_or_else(|| PathBuf::from("artifacts")),
            sources,
            side_channel: self.side_channel.clone().or(config.side_channel),
            threads: self.threads.or(config.threads),
            overwrite: self.overwrite.or(config.overwrite).unwrap_or_default(),
        })
    }
}
