use crate::common::error::KoreanLmError;
use crate::resources::ResourceProvider;
use std::path::PathBuf;

/// # Local resource
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LocalResource {
    /// Local path for the resource
    pub local_path: PathBuf,
}

impl ResourceProvider for LocalResource {
    /// Gets the path for a local resource. Fails if the file does not exist.
    ///
    /// # Returns
    ///
    /// * `PathBuf` pointing to the resource file
    fn get_local_path(&self) -> Result<PathBuf, KoreanLmError> {
        if !self.local_path.exists() {
            return Err(KoreanLmError::IOError(format!(
                "resource not found at {}",
                self.local_path.display()
            )));
        }
        Ok(self.local_path.clone())
    }
}

impl From<PathBuf> for LocalResource {
    fn from(local_path: PathBuf) -> Self {
        Self { local_path }
    }
}

impl From<&str> for LocalResource {
    fn from(local_path: &str) -> Self {
        Self {
            local_path: PathBuf::from(local_path),
        }
    }
}
