//! Cgroup membership table parsing.
//!
//! Parses the kernel's per-process cgroup membership format
//! (`/proc/[pid]/cgroup`): one `hierarchy-id:subsystems:path` record per
//! hierarchy the process belongs to.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{QuotaError, QuotaResult};

/// Hierarchy id of the unified (v2) hierarchy.
pub const UNIFIED_HIERARCHY_ID: u32 = 0;

/// One cgroup membership entry for a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupSubsys {
    /// Hierarchy identifier; [`UNIFIED_HIERARCHY_ID`] for the v2 hierarchy.
    pub id: u32,
    /// Subsystems attached to the hierarchy; empty on the unified hierarchy.
    pub subsystems: Vec<String>,
    /// Cgroup path relative to the hierarchy root, as seen from inside the
    /// process's own namespace.
    pub path: String,
}

impl CgroupSubsys {
    /// Parse a single membership line.
    ///
    /// Returns `None` when the line does not have the three colon-separated
    /// fields. The path field may itself contain colons. A non-numeric
    /// hierarchy id maps to the unified hierarchy (id 0).
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, ':');
        let id = fields.next()?;
        let subsystems = fields.next()?;
        let path = fields.next()?;

        Some(Self {
            id: id.parse().unwrap_or(UNIFIED_HIERARCHY_ID),
            subsystems: subsystems
                .split(',')
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect(),
            path: path.to_string(),
        })
    }

    /// Whether this entry belongs to the unified (v2) hierarchy.
    #[must_use]
    pub fn is_unified(&self) -> bool {
        self.id == UNIFIED_HIERARCHY_ID && self.subsystems.is_empty()
    }
}

/// Parse a cgroup membership file into an ordered list of [`CgroupSubsys`]
/// records.
///
/// Leading and trailing whitespace per line is insignificant; empty input
/// yields an empty list.
///
/// # Errors
///
/// I/O failure opening or reading `path`, or
/// [`QuotaError::MalformedCgroup`] naming the first offending line. A
/// malformed line fails the whole parse; no partial results are returned.
pub fn parse_cgroup_subsystems(path: impl AsRef<Path>) -> QuotaResult<Vec<CgroupSubsys>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut subsystems = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let subsys =
            CgroupSubsys::from_line(trimmed).ok_or_else(|| QuotaError::MalformedCgroup {
                path: path.to_path_buf(),
                line_no: idx + 1,
                line: trimmed.to_string(),
            })?;
        subsystems.push(subsys);
    }

    tracing::trace!(path = %path.display(), count = subsystems.len(), "Parsed cgroup membership");
    Ok(subsystems)
}
