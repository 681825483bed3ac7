//! Resolution of a process's cgroup set and its v1 CPU quota.

use std::collections::HashMap;
use std::path::Path;

use crate::cgroup::Cgroup;
use crate::error::{QuotaError, QuotaResult};
use crate::mount::parse_mount_info;
use crate::subsys::parse_cgroup_subsystems;

/// Filesystem type of cgroup v1 hierarchy mounts.
pub const CGROUP_FS_TYPE: &str = "cgroup";

/// The `cpu` subsystem.
pub const SUBSYS_CPU: &str = "cpu";
/// The `cpuacct` subsystem.
pub const SUBSYS_CPUACCT: &str = "cpuacct";
/// The `cpuset` subsystem.
pub const SUBSYS_CPUSET: &str = "cpuset";
/// The `memory` subsystem.
pub const SUBSYS_MEMORY: &str = "memory";

/// v1 quota control file, microseconds per period; -1 means unlimited.
const CFS_QUOTA_US: &str = "cpu.cfs_quota_us";
/// v1 period control file, microseconds.
const CFS_PERIOD_US: &str = "cpu.cfs_period_us";

/// A process's resolved cgroup set: subsystem name to [`Cgroup`].
///
/// Built once by [`Cgroups::new`] and immutable afterward; concurrent
/// callers may share one instance without locking.
#[derive(Debug, Default)]
pub struct Cgroups {
    groups: HashMap<String, Cgroup>,
}

impl Cgroups {
    /// Resolve a cgroup set from a mount-info file and a cgroup membership
    /// file.
    ///
    /// For every subsystem the membership table declares, the first mount
    /// table entry of type `cgroup` carrying that subsystem in its super
    /// options supplies the on-host location; the membership path is
    /// translated through it. The first successful resolution per subsystem
    /// wins. A membership table with no v1 entries yields an empty set.
    ///
    /// # Errors
    ///
    /// Any parse or I/O failure on either input aborts with that error; a
    /// subsystem with no matching mount or an untranslatable path aborts
    /// with [`QuotaError::UnmatchedSubsystem`] or
    /// [`QuotaError::PathNotExposed`]. No partial set is ever returned.
    pub fn new(
        mount_info_path: impl AsRef<Path>,
        cgroup_path: impl AsRef<Path>,
    ) -> QuotaResult<Self> {
        let mounts = parse_mount_info(mount_info_path)?;
        let memberships = parse_cgroup_subsystems(cgroup_path)?;

        let mut groups = HashMap::new();
        for membership in &memberships {
            for subsystem in &membership.subsystems {
                if groups.contains_key(subsystem) {
                    continue;
                }

                let mount = mounts
                    .iter()
                    .find(|mount| {
                        mount.fs_type == CGROUP_FS_TYPE
                            && mount.super_options.iter().any(|opt| opt == subsystem)
                    })
                    .ok_or_else(|| QuotaError::UnmatchedSubsystem {
                        subsystem: subsystem.clone(),
                    })?;

                let path = mount.translate(&membership.path)?;
                groups.insert(subsystem.clone(), Cgroup::new(path));
            }
        }

        tracing::debug!(count = groups.len(), "Resolved cgroup subsystems");
        Ok(Self { groups })
    }

    /// Resolve the cgroup set of the calling process from
    /// `/proc/self/mountinfo` and `/proc/self/cgroup`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Cgroups::new`].
    pub fn for_current_process() -> QuotaResult<Self> {
        Self::new(crate::PROC_SELF_MOUNTINFO, crate::PROC_SELF_CGROUP)
    }

    /// Look up the resolved cgroup for a subsystem.
    #[must_use]
    pub fn get(&self, subsystem: &str) -> Option<&Cgroup> {
        self.groups.get(subsystem)
    }

    /// Number of resolved subsystems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the set holds no subsystems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The CPU quota in effect for this set, in cores.
    ///
    /// `Ok(None)` means cgroup CPU limiting is not in effect here: the set
    /// has no `cpu` subsystem, or the quota carries the kernel's "no limit"
    /// sentinel. `Ok(Some(cores))` is `cpu.cfs_quota_us` divided by
    /// `cpu.cfs_period_us`, a fractional core count.
    ///
    /// # Errors
    ///
    /// I/O or parse failure on either control file, or
    /// [`QuotaError::InconsistentQuota`] when the quota is set but the
    /// period is not a positive integer.
    pub fn cpu_quota(&self) -> QuotaResult<Option<f64>> {
        let Some(cpu) = self.get(SUBSYS_CPU) else {
            return Ok(None);
        };

        let quota = cpu.read_int(CFS_QUOTA_US)?;
        if quota <= 0 {
            return Ok(None);
        }

        let period = cpu.read_int(CFS_PERIOD_US)?;
        if period <= 0 {
            return Err(QuotaError::InconsistentQuota {
                path: cpu.param_path(CFS_PERIOD_US),
                value: period.to_string(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let cores = quota as f64 / period as f64;
        tracing::debug!(quota, period, cores, "Computed v1 cpu quota");
        Ok(Some(cores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tables(dir: &Path, mount_info: &str, cgroup: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let mount_info_path = dir.join("mountinfo");
        let cgroup_path = dir.join("cgroup");
        fs::write(&mount_info_path, mount_info).unwrap();
        fs::write(&cgroup_path, cgroup).unwrap();
        (mount_info_path, cgroup_path)
    }

    #[test]
    fn first_mount_wins_per_subsystem() {
        let dir = tempfile::tempdir().unwrap();
        let (mounts, membership) = write_tables(
            dir.path(),
            "29 25 0:26 / /sys/fs/cgroup/cpu rw shared:10 - cgroup cgroup rw,cpu\n\
             30 25 0:27 / /sys/fs/cgroup/cpu-shadow rw shared:11 - cgroup cgroup rw,cpu\n",
            "5:cpu:/\n",
        );

        let cgroups = Cgroups::new(&mounts, &membership).unwrap();
        assert_eq!(
            cgroups.get(SUBSYS_CPU).unwrap().path(),
            Path::new("/sys/fs/cgroup/cpu")
        );
    }

    #[test]
    fn first_membership_wins_per_subsystem() {
        let dir = tempfile::tempdir().unwrap();
        let (mounts, membership) = write_tables(
            dir.path(),
            "29 25 0:26 / /sys/fs/cgroup/cpu rw shared:10 - cgroup cgroup rw,cpu\n",
            "5:cpu:/first\n6:cpu:/second\n",
        );

        let cgroups = Cgroups::new(&mounts, &membership).unwrap();
        assert_eq!(
            cgroups.get(SUBSYS_CPU).unwrap().path(),
            Path::new("/sys/fs/cgroup/cpu/first")
        );
    }

    #[test]
    fn named_hierarchies_resolve_like_subsystems() {
        let dir = tempfile::tempdir().unwrap();
        let (mounts, membership) = write_tables(
            dir.path(),
            "26 25 0:23 / /sys/fs/cgroup/systemd rw shared:9 - cgroup cgroup rw,name=systemd\n",
            "1:name=systemd:/init.scope\n",
        );

        let cgroups = Cgroups::new(&mounts, &membership).unwrap();
        assert_eq!(
            cgroups.get("name=systemd").unwrap().path(),
            Path::new("/sys/fs/cgroup/systemd/init.scope")
        );
    }

    #[test]
    fn unified_membership_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let (mounts, membership) = write_tables(
            dir.path(),
            "24 18 0:21 / /sys/fs/cgroup rw shared:8 - cgroup2 cgroup2 rw,nsdelegate\n",
            "0::/user.slice\n",
        );

        let cgroups = Cgroups::new(&mounts, &membership).unwrap();
        assert!(cgroups.is_empty());
    }

    #[test]
    fn period_of_zero_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpu.cfs_quota_us"), "600000\n").unwrap();
        fs::write(dir.path().join("cpu.cfs_period_us"), "0\n").unwrap();

        let mount_info = format!(
            "29 25 0:26 / {} rw shared:10 - cgroup cgroup rw,cpu\n",
            dir.path().display()
        );
        let (mounts, membership) = write_tables(dir.path(), &mount_info, "5:cpu:/\n");

        let cgroups = Cgroups::new(&mounts, &membership).unwrap();
        let err = cgroups.cpu_quota().unwrap_err();
        assert!(matches!(err, QuotaError::InconsistentQuota { .. }));
    }
}
