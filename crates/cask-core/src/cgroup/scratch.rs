//! Plain-directory stand-in for the cgroup hierarchy used by unit tests.

use std::io;
use std::path::Path;

use super::ControlFs;

/// Writes control files as regular files and can refuse one file name.
#[derive(Debug, Default)]
pub(crate) struct ScratchFs {
    fail_on: Option<&'static str>,
}

impl ScratchFs {
    pub(crate) const fn failing_on(file_name: &'static str) -> Self {
        Self {
            fail_on: Some(file_name),
        }
    }
}

impl ControlFs for ScratchFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn write(&self, file: &Path, value: &str) -> io::Result<()> {
        if self.fail_on.is_some_and(|name| file.file_name().is_some_and(|f| f == name)) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"));
        }
        std::fs::write(file, value)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}
