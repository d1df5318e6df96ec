use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;
use log::{debug, info};
use took::Timer;

use crate::error::IngestError;
use crate::io::artifact::{ArtifactWriter, WriteOutcome};
use crate::io::section_parser::{parse_file, ParsedSource};
use crate::io::side_channel::SideChannel;
use crate::io::solution_reader::{load_solution_file, solution_instance_uid};
use crate::problem::builder::{derive_instance_uid, InstanceBuilder};
use crate::problem::distance_matrix::DistanceMatrix;
use crate::problem::instance::{Instance, InstanceStatistics};
use crate::problem::schema::{InstanceSchema, MatrixPolicy};
use crate::upload::{Ack, Uploader};
use crate::utils::logging::format_log_instance;
use crate::utils::validator::Validator;

pub mod batch;

/// Destination of validated instances.
#[derive(Clone)]
pub enum Sink {
    Artifacts(ArtifactWriter),
    Upload(Arc<dyn Uploader>),
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct IngestContext {
    schema: InstanceSchema,
    #[builder(default, setter(strip_option))]
    side_channel: Option<SideChannel>,
    sink: Sink,
}

impl IngestContext {
    pub fn schema(&self) -> &InstanceSchema {
        &self.schema
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    fn deliver(&self, instance: &Instance) -> Result<Delivery, IngestError> {
        match &self.sink {
            Sink::Artifacts(writer) => Ok(match writer.write_instance(instance)? {
                WriteOutcome::Written(path) => Delivery::Written(path),
                WriteOutcome::Kept(path) => Delivery::Kept(path),
            }),
            Sink::Upload(uploader) => Ok(Delivery::Uploaded(uploader.upload_instance(instance)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Written(PathBuf),
    Kept(PathBuf),
    Uploaded(Ack),
}

#[derive(Debug)]
pub struct FileReport {
    pub instance_uid: String,
    pub delivery: Delivery,
    pub statistics: Option<InstanceStatistics>,
}

/// Result of one unit of work. Failures stay scoped to their file.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub skipped_lines: usize,
    pub took: Duration,
    pub result: Result<FileReport, IngestError>,
}

/// Runs parse, build, matrix derivation, validation and delivery for one
/// source file.
pub fn ingest_file(path: impl AsRef<Path>, ctx: &IngestContext) -> FileOutcome {
    let path = path.as_ref();
    let timer = Timer::new();

    let (skipped_lines, result) = match parse_file(&ctx.schema, path) {
        Ok(parsed) => {
            if !parsed.is_terminated() {
                debug!("{}: no EOF marker", path.display());
            }
            (parsed.skipped_lines().len(), ingest_parsed(path, &parsed, ctx))
        }
        Err(e) => (0, Err(e)),
    };

    FileOutcome {
        source: path.to_path_buf(),
        skipped_lines,
        took: timer.took().into_std(),
        result,
    }
}

fn ingest_parsed(
    path: &Path,
    parsed: &ParsedSource,
    ctx: &IngestContext,
) -> Result<FileReport, IngestError> {
    let instance_uid = derive_instance_uid(&ctx.schema, path);
    let row = match (&ctx.side_channel, path.file_stem()) {
        (Some(channel), Some(stem)) => channel.row(&stem.to_string_lossy()),
        _ => None,
    };

    let draft = InstanceBuilder::new(&ctx.schema).build(instance_uid, parsed, row)?;
    let distance_matrix = match ctx.schema.distance_matrix {
        MatrixPolicy::Euclidean => Some(DistanceMatrix::with_euclidean_distances(
            &draft.coordinates(),
        )),
        MatrixPolicy::Omitted => None,
    };
    let instance = Validator::new(&ctx.schema).validate(draft, distance_matrix)?;
    info!("{}", format_log_instance(&instance));

    let delivery = ctx.deliver(&instance)?;
    Ok(FileReport {
        instance_uid: instance.instance_uid().to_string(),
        delivery,
        statistics: Some(instance.statistics()),
    })
}

/// Reads a solution file, resolves it against the stored instance artifact and
/// writes the validated solution artifact.
pub fn ingest_solution_file(path: impl AsRef<Path>, ctx: &IngestContext) -> FileOutcome {
    let path = path.as_ref();
    let timer = Timer::new();
    FileOutcome {
        source: path.to_path_buf(),
        skipped_lines: 0,
        result: ingest_solution(path, ctx),
        took: timer.took().into_std(),
    }
}

fn ingest_solution(path: &Path, ctx: &IngestContext) -> Result<FileReport, IngestError> {
    let writer = match &ctx.sink {
        Sink::Artifacts(writer) => writer,
        Sink::Upload(_) => {
            return Err(IngestError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "solutions need an artifact directory",
                ),
            ))
        }
    };
    let file = load_solution_file(path)?;
    let instance_uid = solution_instance_uid(&ctx.schema, path, &file);
    let validator = Validator::new(&ctx.schema);
    let instance = writer.read_instance(&instance_uid, &validator)?;

    let solution = file.into_solution(&instance, ctx.schema.route_numbering)?;
    validator.check_solution(&instance, &solution)?;
    info!(
        "{}: {} tours, {} visits, objective {:?}",
        instance_uid,
        solution.number_of_tours(),
        solution.number_of_visits(),
        solution.objective
    );

    let delivery = match writer.write_solution(&solution)? {
        WriteOutcome::Written(path) => Delivery::Written(path),
        WriteOutcome::Kept(path) => Delivery::Kept(path),
    };
    Ok(FileReport {
        instance_uid,
        delivery,
        statistics: None,
    })
}
