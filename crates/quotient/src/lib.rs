//! # quotient
//!
//! Resolves a running process's cgroup CPU quota as a fractional core
//! count, for callers that size worker pools to what the kernel will
//! actually schedule.
//!
//! The crate parses two kernel-exposed descriptors, the process's
//! mount-info table and its cgroup membership table, and handles both
//! cgroup v1 (independently mounted subsystem hierarchies) and cgroup v2
//! (single unified hierarchy):
//! - [`Cgroups::new`] resolves the per-subsystem cgroup paths of a process;
//! - [`Cgroups::cpu_quota`] derives the v1 quota from
//!   `cpu.cfs_quota_us` / `cpu.cfs_period_us`;
//! - [`is_cgroup_v2`] and [`cpu_quota_v2`] cover the unified hierarchy and
//!   its combined `cpu.max` control file;
//! - [`cpu_quota`] glues both together for the calling process.
//!
//! Everything is a plain blocking read of small pseudo-files; a resolved
//! [`Cgroups`] set is immutable and can be shared across threads without
//! locking. `Ok(None)` consistently means "no CPU limit is in effect",
//! which is never an error; callers decide what to do about it.

#![warn(missing_docs)]

pub mod cgroup;
pub mod error;
pub mod groups;
pub mod mount;
pub mod subsys;
pub mod v2;

pub use cgroup::Cgroup;
pub use error::{QuotaError, QuotaResult};
pub use groups::{Cgroups, SUBSYS_CPU, SUBSYS_CPUACCT, SUBSYS_CPUSET, SUBSYS_MEMORY};
pub use mount::MountPoint;
pub use subsys::CgroupSubsys;
pub use v2::{cpu_quota_v2, is_cgroup_v2, unified_group_path};

use std::path::Path;

/// Mount table of the calling process.
pub(crate) const PROC_SELF_MOUNTINFO: &str = "/proc/self/mountinfo";
/// Cgroup membership table of the calling process.
pub(crate) const PROC_SELF_CGROUP: &str = "/proc/self/cgroup";

/// The CPU quota in effect for the calling process, in cores.
///
/// Detects the hierarchy model from `/proc/self/mountinfo` and reads the
/// matching control files: `cpu.max` under the unified mount point on v2,
/// `cpu.cfs_quota_us` / `cpu.cfs_period_us` through the resolved `cpu`
/// subsystem path on v1. `Ok(None)` means no cgroup CPU limit applies.
///
/// # Errors
///
/// Any parse or I/O failure surfaced by the underlying resolution; see
/// [`Cgroups::cpu_quota`] and [`cpu_quota_v2`].
pub fn cpu_quota() -> QuotaResult<Option<f64>> {
    if is_cgroup_v2(PROC_SELF_MOUNTINFO)? {
        let Some(group) = unified_group_path(PROC_SELF_CGROUP)? else {
            return Ok(None);
        };
        let group = group.strip_prefix("/").unwrap_or(&group).to_path_buf();
        let base = Path::new(v2::CGROUP_V2_MOUNT_POINT).join(group);
        return cpu_quota_v2(base, v2::CPU_MAX);
    }
    Cgroups::for_current_process()?.cpu_quota()
}
