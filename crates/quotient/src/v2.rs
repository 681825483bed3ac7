//! Unified-hierarchy (cgroup v2) detection and CPU quota.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{QuotaError, QuotaResult};
use crate::mount::parse_mount_info;
use crate::subsys::parse_cgroup_subsystems;

/// Filesystem type of the unified hierarchy mount.
pub const CGROUP_V2_FS_TYPE: &str = "cgroup2";

/// Where the unified hierarchy is mounted when v2 is in effect.
pub const CGROUP_V2_MOUNT_POINT: &str = "/sys/fs/cgroup";

/// v2 combined quota/period control file.
pub const CPU_MAX: &str = "cpu.max";

/// Sentinel first token of `cpu.max` meaning "no limit".
const CPU_MAX_UNLIMITED: &str = "max";

/// Period applied when `cpu.max` carries only a quota token, microseconds.
const CPU_MAX_DEFAULT_PERIOD: u64 = 100_000;

/// Whether the unified (v2) hierarchy is in effect, judged from a mount-info
/// file.
///
/// True iff a `cgroup2` filesystem is mounted at the unified mount point
/// `/sys/fs/cgroup`. A hybrid table with v2 mounted elsewhere (typically
/// `/sys/fs/cgroup/unified`) still runs its CPU controller on v1 and
/// reports false, as does a table with no cgroup mounts at all.
///
/// # Errors
///
/// I/O or parse failure on the mount-info file.
pub fn is_cgroup_v2(mount_info_path: impl AsRef<Path>) -> QuotaResult<bool> {
    let mounts = parse_mount_info(mount_info_path)?;
    let unified = mounts.iter().any(|mount| {
        mount.fs_type == CGROUP_V2_FS_TYPE
            && mount.mount_point == Path::new(CGROUP_V2_MOUNT_POINT)
    });
    tracing::trace!(unified, "Checked for unified cgroup hierarchy");
    Ok(unified)
}

/// Read a v2 CPU quota from the `cpu.max`-format file at `base_path/name`.
///
/// The file holds one or two whitespace-separated tokens: the quota in
/// microseconds (or the literal `max`) and optionally the period in
/// microseconds; a missing period defaults to 100000.
///
/// `Ok(None)` means no limit applies: the file does not exist (v2 is simply
/// not in effect for this path) or the quota is the `max` sentinel.
///
/// # Errors
///
/// [`QuotaError::InvalidParam`] when the quota token is neither `max` nor an
/// integer, or the token count is wrong;
/// [`QuotaError::InconsistentQuota`] when the period is not a positive
/// integer. Other I/O failures propagate as [`QuotaError::Io`].
pub fn cpu_quota_v2(base_path: impl AsRef<Path>, name: &str) -> QuotaResult<Option<f64>> {
    let path = base_path.as_ref().join(name);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let line = contents.lines().next().unwrap_or("");
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() || fields.len() > 2 {
        return Err(QuotaError::InvalidParam {
            path,
            value: line.to_string(),
        });
    }

    if fields[0] == CPU_MAX_UNLIMITED {
        return Ok(None);
    }
    let max: u64 = fields[0].parse().map_err(|_| QuotaError::InvalidParam {
        path: path.clone(),
        value: fields[0].to_string(),
    })?;

    let period: u64 = match fields.get(1) {
        Some(token) => token.parse().map_err(|_| QuotaError::InconsistentQuota {
            path: path.clone(),
            value: (*token).to_string(),
        })?,
        None => CPU_MAX_DEFAULT_PERIOD,
    };
    if period == 0 {
        return Err(QuotaError::InconsistentQuota {
            path,
            value: period.to_string(),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let cores = max as f64 / period as f64;
    tracing::debug!(max, period, cores, "Computed v2 cpu quota");
    Ok(Some(cores))
}

/// The process's cgroup path on the unified hierarchy, if it belongs to one.
///
/// Reads a cgroup membership file and returns the path of the `0::/path`
/// record (hierarchy id 0, empty subsystem list).
///
/// # Errors
///
/// I/O or parse failure on the membership file.
pub fn unified_group_path(cgroup_path: impl AsRef<Path>) -> QuotaResult<Option<PathBuf>> {
    let memberships = parse_cgroup_subsystems(cgroup_path)?;
    Ok(memberships
        .iter()
        .find(|membership| membership.is_unified())
        .map(|membership| PathBuf::from(&membership.path)))
}
