use std::fmt;
use std::path::{Path, PathBuf};

use crate::io::section_parser::SectionKind;
use crate::upload::UploadError;
use crate::utils::validator::InvariantViolation;

/// File-scoped failure of one pipeline run.
#[derive(Debug)]
pub enum IngestError {
    Format(FormatError),
    MissingField(MissingFieldError),
    InvariantViolation(InvariantViolation),
    Io { path: PathBuf, source: std::io::Error },
    Upload(UploadError),
}

impl IngestError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Format(_) => "FormatError",
            IngestError::MissingField(_) => "MissingFieldError",
            IngestError::InvariantViolation(_) => "InvariantViolationError",
            IngestError::Io { .. } => "IOError",
            IngestError::Upload(_) => "UploadError",
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Format(e) => write!(f, "format error: {}", e),
            IngestError::MissingField(e) => write!(f, "missing field: {}", e),
            IngestError::InvariantViolation(e) => write!(f, "invariant violated: {}", e),
            IngestError::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
            IngestError::Upload(e) => write!(f, "upload rejected: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Format(e) => Some(e),
            IngestError::MissingField(e) => Some(e),
            IngestError::InvariantViolation(e) => Some(e),
            IngestError::Io { source, .. } => Some(source),
            IngestError::Upload(e) => Some(e),
        }
    }
}

impl From<FormatError> for IngestError {
    fn from(e: FormatError) -> Self {
        IngestError::Format(e)
    }
}

impl From<MissingFieldError> for IngestError {
    fn from(e: MissingFieldError) -> Self {
        IngestError::MissingField(e)
    }
}

impl From<InvariantViolation> for IngestError {
    fn from(e: InvariantViolation) -> Self {
        IngestError::InvariantViolation(e)
    }
}

impl From<UploadError> for IngestError {
    fn from(e: UploadError) -> Self {
        IngestError::Upload(e)
    }
}

/// The source cannot be turned into an instance because of its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// A line could not be tokenized for the active section. Only fatal when
    /// raised outside of the skip-and-warn path, e.g. for solution files.
    Malformed {
        line_number: usize,
        section: Option<SectionKind>,
        reason: String,
    },
    /// No usable location record was found in the source.
    NoLocationRecords,
    /// A scalar field has a value that cannot be coerced to its target type.
    InvalidScalar { key: String, value: String },
    /// A declared property selects a variant the domain does not support.
    Unsupported { key: String, value: String },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Malformed {
                line_number,
                section,
                reason,
            } => match section {
                Some(section) => write!(f, "line {} in {:?}: {}", line_number, section, reason),
                None => write!(f, "line {}: {}", line_number, reason),
            },
            FormatError::NoLocationRecords => write!(f, "no location records found"),
            FormatError::InvalidScalar { key, value } => {
                write!(f, "cannot interpret {} value '{}'", key, value)
            }
            FormatError::Unsupported { key, value } => {
                write!(f, "{} '{}' is not supported", key, value)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// A required scalar, section or referenced record is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingFieldError {
    pub field: String,
}

impl MissingFieldError {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl fmt::Display for MissingFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)
    }
}

impl std::error::Error for MissingFieldError {}
