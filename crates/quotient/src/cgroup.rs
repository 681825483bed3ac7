//! A single resolved cgroup directory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{QuotaError, QuotaResult};

/// A subsystem's cgroup directory for one process, resolved to an absolute
/// on-host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cgroup {
    /// Absolute path to the cgroup directory.
    path: PathBuf,
}

impl Cgroup {
    /// Wrap a resolved cgroup directory path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The resolved cgroup directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a control file inside this cgroup.
    #[must_use]
    pub fn param_path(&self, param: &str) -> PathBuf {
        self.path.join(param)
    }

    /// Read the first line of a control file.
    fn read_first_line(&self, param: &str) -> QuotaResult<String> {
        let file = File::open(self.param_path(param))?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    /// Read a control file holding a single integer.
    ///
    /// # Errors
    ///
    /// I/O failure on the control file, or [`QuotaError::InvalidParam`] when
    /// its first line is not an integer.
    pub fn read_int(&self, param: &str) -> QuotaResult<i64> {
        let value = self.read_first_line(param)?;
        value.parse().map_err(|_| QuotaError::InvalidParam {
            path: self.param_path(param),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_path_joins() {
        let cgroup = Cgroup::new("/sys/fs/cgroup/cpu");
        assert_eq!(
            cgroup.param_path("cpu.cfs_quota_us"),
            PathBuf::from("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        );
    }

    #[test]
    fn read_int_from_control_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.cfs_quota_us"), "600000\n").unwrap();

        let cgroup = Cgroup::new(dir.path());
        assert_eq!(cgroup.read_int("cpu.cfs_quota_us").unwrap(), 600_000);
    }

    #[test]
    fn read_int_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.cfs_quota_us"), "onehundred\n").unwrap();

        let cgroup = Cgroup::new(dir.path());
        let err = cgroup.read_int("cpu.cfs_quota_us").unwrap_err();
        assert!(matches!(err, QuotaError::InvalidParam { .. }));
    }

    #[test]
    fn read_int_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cgroup = Cgroup::new(dir.path());
        let err = cgroup.read_int("cpu.cfs_quota_us").unwrap_err();
        assert!(matches!(err, QuotaError::Io(_)));
    }
}
