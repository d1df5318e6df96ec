use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::IngestError;
use crate::problem::instance::Instance;
use crate::problem::solution::Solution;
use crate::utils::validator::{check_instance_uid, Validator, Violation};

pub const ARTIFACT_EXTENSION: &str = ".json.gz";
pub const INSTANCE_DIR: &str = "instances";
pub const SOLUTION_DIR: &str = "solutions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// replace an existing artifact wholesale
    #[default]
    Overwrite,
    /// leave an existing artifact untouched
    KeepExisting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    Kept(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written(path) | WriteOutcome::Kept(path) => path,
        }
    }
}

/// Canonical artifact bytes: compact JSON in declaration order, gzip without
/// file name or timestamp.
pub fn encode<T: Serialize>(value: &T, writer: impl Write) -> std::io::Result<()> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(writer, Compression::default());
    serde_json::to_writer(&mut encoder, value)?;
    encoder.finish()?.flush()
}

pub fn decode<T: DeserializeOwned>(reader: impl Read) -> std::io::Result<T> {
    Ok(serde_json::from_reader(GzDecoder::new(reader))?)
}

/// Stores artifacts below `<root>/instances` and `<root>/solutions`. The path of
/// an artifact depends on nothing but its instance uid.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
    overwrite: OverwritePolicy,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>, overwrite: OverwritePolicy) -> Self {
        Self {
            root: root.into(),
            overwrite,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn instance_path(&self, instance_uid: &str) -> PathBuf {
        self.root
            .join(INSTANCE_DIR)
            .join(format!("{}{}", instance_uid, ARTIFACT_EXTENSION))
    }

    pub fn solution_path(&self, instance_uid: &str) -> PathBuf {
        self.root
            .join(SOLUTION_DIR)
            .join(format!("{}{}", instance_uid, ARTIFACT_EXTENSION))
    }

    pub fn write_instance(&self, instance: &Instance) -> Result<WriteOutcome, IngestError> {
        check_instance_uid(instance.instance_uid())?;
        self.write_artifact(&self.instance_path(instance.instance_uid()), instance)
    }

    pub fn write_solution(&self, solution: &Solution) -> Result<WriteOutcome, IngestError> {
        check_instance_uid(&solution.instance_uid)?;
        self.write_artifact(&self.solution_path(&solution.instance_uid), solution)
    }

    /// Reads an instance artifact back and re-checks it against `validator`.
    pub fn read_instance(
        &self,
        instance_uid: &str,
        validator: &Validator,
    ) -> Result<Instance, IngestError> {
        check_instance_uid(instance_uid)?;
        let instance: Instance = read_artifact(self.instance_path(instance_uid))?;
        if instance.instance_uid() != instance_uid {
            return Err(Violation::ArtifactUid {
                expected: instance_uid.to_string(),
                found: instance.instance_uid().to_string(),
            }
            .into());
        }
        validator.check_instance(&instance)?;
        Ok(instance)
    }

    pub fn read_solution(&self, instance_uid: &str) -> Result<Solution, IngestError> {
        check_instance_uid(instance_uid)?;
        let solution: Solution = read_artifact(self.solution_path(instance_uid))?;
        if solution.instance_uid != instance_uid {
            return Err(Violation::ArtifactUid {
                expected: instance_uid.to_string(),
                found: solution.instance_uid,
            }
            .into());
        }
        Ok(solution)
    }

    /// Uids of all stored instances, sorted.
    pub fn list_instance_uids(&self) -> Result<Vec<String>, IngestError> {
        let dir = self.root.join(INSTANCE_DIR);
        let pattern = format!("{}/**/*{}", dir.display(), ARTIFACT_EXTENSION);
        let paths = glob::glob(&pattern).map_err(|e| {
            IngestError::io(
                &dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
            )
        })?;

        let mut uids = vec![];
        for path in paths {
            let path = path.map_err(|e| {
                let path = e.path().to_path_buf();
                IngestError::io(path, e.into())
            })?;
            let relative = path.strip_prefix(&dir).unwrap_or(&path);
            let relative = relative.to_string_lossy().replace('\\', "/");
            if let Some(uid) = relative.strip_suffix(ARTIFACT_EXTENSION) {
                uids.push(uid.to_string());
            }
        }
        uids.sort();
        Ok(uids)
    }

    fn write_artifact<T: Serialize>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<WriteOutcome, IngestError> {
        if self.overwrite == OverwritePolicy::KeepExisting && path.exists() {
            info!("keeping existing artifact {}", path.display());
            return Ok(WriteOutcome::Kept(path.to_path_buf()));
        }
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;

        // temp file in the destination directory so that the rename stays on
        // one file system
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| IngestError::io(dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            encode(value, &mut writer).map_err(|e| IngestError::io(path, e))?;
            writer.flush().map_err(|e| IngestError::io(path, e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| IngestError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| IngestError::io(path, e.error))?;

        debug!("wrote {}", path.display());
        Ok(WriteOutcome::Written(path.to_path_buf()))
    }
}

pub fn read_artifact<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IngestError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| IngestError::io(path, e))?;
    decode(BufReader::new(f)).map_err(|e| IngestError::io(path, e))
}
