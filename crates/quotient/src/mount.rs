//! Mount table parsing.
//!
//! Parses the kernel's per-process mount-info format (`/proc/[pid]/mountinfo`)
//! into [`MountPoint`] records and translates cgroup-relative paths into
//! absolute on-host paths through them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{QuotaError, QuotaResult};

/// Separator terminating the variable-length optional-fields section.
const OPTIONAL_FIELDS_SEP: &str = "-";

const FIELD_MOUNT_ID: usize = 0;
const FIELD_PARENT_ID: usize = 1;
const FIELD_DEVICE_ID: usize = 2;
const FIELD_ROOT: usize = 3;
const FIELD_MOUNT_POINT: usize = 4;
const FIELD_OPTIONS: usize = 5;
const FIELD_OPTIONAL: usize = 6;

/// Fields after the optional-fields separator: fs type, mount source,
/// super options.
const SECOND_HALF_FIELD_COUNT: usize = 3;

/// Shortest valid line: six positional fields, the separator, and the
/// second half.
const FIELD_COUNT_MIN: usize = FIELD_OPTIONAL + 1 + SECOND_HALF_FIELD_COUNT;

/// One mount table entry.
///
/// Field meanings follow `proc(5)`. For cgroup v1 mounts the
/// [`super_options`](Self::super_options) list carries the subsystem names
/// attached to the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Unique mount identifier.
    pub mount_id: u32,
    /// Identifier of the parent mount.
    pub parent_id: u32,
    /// `major:minor` device identifier.
    pub device_id: String,
    /// Path within the filesystem that is mounted at
    /// [`mount_point`](Self::mount_point).
    pub root: PathBuf,
    /// Absolute path where the filesystem is mounted.
    pub mount_point: PathBuf,
    /// Per-mount options.
    pub options: Vec<String>,
    /// Optional fields (`shared:N`, `master:N`, ...), possibly empty.
    pub optional_fields: Vec<String>,
    /// Filesystem type, e.g. `cgroup` or `cgroup2`.
    pub fs_type: String,
    /// Filesystem-specific mount source.
    pub mount_source: String,
    /// Per-superblock options; subsystem names for cgroup v1 mounts.
    pub super_options: Vec<String>,
}

impl MountPoint {
    /// Parse a single mount-info line.
    ///
    /// Returns `None` when the line does not match the positional layout:
    /// too few fields, non-numeric mount ids, a missing optional-fields
    /// separator, or a wrong field count after it.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() < FIELD_COUNT_MIN {
            return None;
        }

        let mount_id = fields[FIELD_MOUNT_ID].parse().ok()?;
        let parent_id = fields[FIELD_PARENT_ID].parse().ok()?;

        let sep_offset = fields[FIELD_OPTIONAL..]
            .iter()
            .position(|field| *field == OPTIONAL_FIELDS_SEP)?;
        let fs_type_start = FIELD_OPTIONAL + sep_offset + 1;
        if fields.len() != fs_type_start + SECOND_HALF_FIELD_COUNT {
            return None;
        }

        Some(Self {
            mount_id,
            parent_id,
            device_id: fields[FIELD_DEVICE_ID].to_string(),
            root: PathBuf::from(fields[FIELD_ROOT]),
            mount_point: PathBuf::from(fields[FIELD_MOUNT_POINT]),
            options: split_comma_list(fields[FIELD_OPTIONS]),
            optional_fields: fields[FIELD_OPTIONAL..FIELD_OPTIONAL + sep_offset]
                .iter()
                .map(ToString::to_string)
                .collect(),
            fs_type: fields[fs_type_start].to_string(),
            mount_source: fields[fs_type_start + 1].to_string(),
            super_options: split_comma_list(fields[fs_type_start + 2]),
        })
    }

    /// Translate a cgroup path (as seen from inside the process's namespace)
    /// into an absolute on-host path.
    ///
    /// The mount exposes the subtree under [`root`](Self::root) at
    /// [`mount_point`](Self::mount_point); the remainder of `path` past that
    /// root is joined onto the mount point.
    ///
    /// # Errors
    ///
    /// [`QuotaError::PathNotExposed`] when `path` lies outside the mount's
    /// root.
    pub fn translate(&self, path: impl AsRef<Path>) -> QuotaResult<PathBuf> {
        let path = path.as_ref();
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| QuotaError::PathNotExposed {
                mount_point: self.mount_point.clone(),
                root: self.root.clone(),
                path: path.to_path_buf(),
            })?;
        if rel.as_os_str().is_empty() {
            return Ok(self.mount_point.clone());
        }
        Ok(self.mount_point.join(rel))
    }
}

/// Parse a mount-info file into an ordered list of [`MountPoint`] records.
///
/// Input order is preserved; it determines precedence when several mounts
/// could satisfy the same subsystem. Empty input yields an empty list.
///
/// # Errors
///
/// I/O failure opening or reading `path`, or
/// [`QuotaError::MalformedMountInfo`] naming the first offending line. A
/// malformed line fails the whole parse; no partial results are returned.
pub fn parse_mount_info(path: impl AsRef<Path>) -> QuotaResult<Vec<MountPoint>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut mounts = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mount = MountPoint::from_line(&line).ok_or_else(|| QuotaError::MalformedMountInfo {
            path: path.to_path_buf(),
            line_no: idx + 1,
            line: line.clone(),
        })?;
        mounts.push(mount);
    }

    tracing::trace!(path = %path.display(), count = mounts.len(), "Parsed mount info");
    Ok(mounts)
}

fn split_comma_list(field: &str) -> Vec<String> {
    field
        .split(',')
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU_LINE: &str = "29 25 0:26 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid,nodev,noexec,relatime shared:10 - cgroup cgroup rw,cpu,cpuacct";

    #[test]
    fn parse_cgroup_mount_line() {
        let mount = MountPoint::from_line(CPU_LINE).unwrap();
        assert_eq!(mount.mount_id, 29);
        assert_eq!(mount.parent_id, 25);
        assert_eq!(mount.device_id, "0:26");
        assert_eq!(mount.root, PathBuf::from("/"));
        assert_eq!(mount.mount_point, PathBuf::from("/sys/fs/cgroup/cpu,cpuacct"));
        assert_eq!(mount.optional_fields, vec!["shared:10"]);
        assert_eq!(mount.fs_type, "cgroup");
        assert_eq!(mount.mount_source, "cgroup");
        assert_eq!(mount.super_options, vec!["rw", "cpu", "cpuacct"]);
    }

    #[test]
    fn parse_multiple_optional_fields() {
        let line = "31 25 0:28 / /sys/fs/cgroup/memory rw shared:12 master:4 - cgroup cgroup rw,memory";
        let mount = MountPoint::from_line(line).unwrap();
        assert_eq!(mount.optional_fields, vec!["shared:12", "master:4"]);
        assert_eq!(mount.super_options, vec!["rw", "memory"]);
    }

    #[test]
    fn parse_no_optional_fields() {
        let line = "1 0 252:0 / / rw,relatime - ext4 /dev/vda1 rw,data=ordered";
        let mount = MountPoint::from_line(line).unwrap();
        assert!(mount.optional_fields.is_empty());
        assert_eq!(mount.fs_type, "ext4");
    }

    #[test]
    fn reject_missing_separator() {
        let line = "29 25 0:26 / /sys/fs/cgroup/cpu rw shared:10 cgroup cgroup rw,cpu";
        assert!(MountPoint::from_line(line).is_none());
    }

    #[test]
    fn reject_trailing_fields() {
        let line = format!("{CPU_LINE} extra");
        assert!(MountPoint::from_line(&line).is_none());
    }

    #[test]
    fn reject_short_line() {
        assert!(MountPoint::from_line("29 25 0:26 / /sys - cgroup").is_none());
    }

    #[test]
    fn reject_non_numeric_mount_id() {
        let line = "x 25 0:26 / /sys/fs/cgroup/cpu rw shared:10 - cgroup cgroup rw,cpu";
        assert!(MountPoint::from_line(line).is_none());
    }

    #[test]
    fn translate_under_root_mount() {
        let mount = MountPoint::from_line(CPU_LINE).unwrap();
        assert_eq!(
            mount.translate("/docker/abc").unwrap(),
            PathBuf::from("/sys/fs/cgroup/cpu,cpuacct/docker/abc")
        );
        assert_eq!(
            mount.translate("/").unwrap(),
            PathBuf::from("/sys/fs/cgroup/cpu,cpuacct")
        );
    }

    #[test]
    fn translate_strips_mount_root() {
        let line = "31 25 0:28 /docker /sys/fs/cgroup/memory rw shared:12 - cgroup cgroup rw,memory";
        let mount = MountPoint::from_line(line).unwrap();
        assert_eq!(
            mount.translate("/docker/large").unwrap(),
            PathBuf::from("/sys/fs/cgroup/memory/large")
        );
    }

    #[test]
    fn translate_outside_root_fails() {
        let line = "31 25 0:28 /docker /sys/fs/cgroup/memory rw shared:12 - cgroup cgroup rw,memory";
        let mount = MountPoint::from_line(line).unwrap();
        let err = mount.translate("/podman/large").unwrap_err();
        assert!(matches!(err, QuotaError::PathNotExposed { .. }));
    }
}
