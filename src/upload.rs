use std::fmt;

use crate::problem::instance::Instance;

/// Acknowledgement of an accepted instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub instance_uid: String,
    /// where the receiver placed the instance, if it tells
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadError {
    pub instance_uid: String,
    pub reason: String,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instance_uid, self.reason)
    }
}

impl std::error::Error for UploadError {}

/// Receiver of validated instances. Implementations own any retry policy; the
/// pipeline calls `upload_instance` exactly once per instance.
pub trait Uploader: Send + Sync {
    fn upload_instance(&self, instance: &Instance) -> Result<Ack, UploadError>;
}
