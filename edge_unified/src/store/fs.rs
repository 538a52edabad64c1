//! Directory-backed persistence store.

use edge_common::driver::EdgeError;
use edge_common::store::{OpenMode, PersistenceStore, StoreStream};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Store mapping stream names onto files below a root directory.
///
/// `/Blink.dat` lives at `<root>/Blink.dat`. Names that would escape the
/// root (`..`) are refused.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    mounted: bool,
    create_missing: bool,
}

impl DirStore {
    /// Create an unmounted store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mounted: false,
            create_missing: false,
        }
    }

    /// Create the root directory on mount instead of failing when it is missing.
    pub fn create_missing(mut self, create: bool) -> Self {
        self.create_missing = create;
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path backing stream `name`.
    fn path_of(&self, name: &str) -> Result<PathBuf, EdgeError> {
        let relative = Path::new(name.trim_start_matches('/'));
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || relative.as_os_str().is_empty() {
            return Err(EdgeError::OpenFailed {
                name: name.to_string(),
                reason: "invalid stream name".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl PersistenceStore for DirStore {
    fn mount(&mut self) -> Result<(), EdgeError> {
        if self.mounted {
            return Ok(());
        }
        if !self.root.is_dir() {
            if !self.create_missing {
                return Err(EdgeError::MountFailed(format!(
                    "{} is not a directory",
                    self.root.display()
                )));
            }
            fs::create_dir_all(&self.root).map_err(|e| {
                EdgeError::MountFailed(format!("Failed to create {}: {}", self.root.display(), e))
            })?;
            info!("Created store root {:?}", self.root);
        }
        self.mounted = true;
        debug!("Mounted store at {:?}", self.root);
        Ok(())
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            debug!("Unmounted store at {:?}", self.root);
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreStream + '_>, EdgeError> {
        if !self.mounted {
            return Err(EdgeError::NotMounted);
        }
        let path = self.path_of(name)?;
        let file = match mode {
            OpenMode::Read => File::open(&path),
            OpenMode::Write => File::create(&path),
        }
        .map_err(|e| EdgeError::OpenFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(file))
    }
}
