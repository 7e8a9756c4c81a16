//! Resource limits loading: descriptor file first, local probe fallback.

use std::path::Path;

use crate::domain::errors::{RigError, RigResult};
use crate::domain::models::ResourceLimits;

/// Memory held back from the per-core budget when probing locally, in MB.
const LOCAL_MEMORY_HEADROOM_MB: u64 = 512;

/// Load the limits for a named resource.
///
/// The descriptor `<resources_dir>/<name>` wins when present: its first
/// line carries two integers, `core_limit` and `memory_per_core_mb`.
/// Otherwise the local machine is probed via `/proc`.
pub fn load(name: &str, resources_dir: &Path) -> RigResult<ResourceLimits> {
    let path = resources_dir.join(name);
    if path.exists() {
        let text = std::fs::read_to_string(&path)?;
        let first = text.lines().next().unwrap_or("");
        let (core_limit, memory_per_core_mb) =
            parse_descriptor(first).ok_or_else(|| RigError::BadDescriptor {
                path: path.clone(),
                reason: format!("expected two integers, got {first:?}"),
            })?;
        Ok(ResourceLimits::new(name, core_limit, memory_per_core_mb))
    } else {
        tracing::info!(
            resource = name,
            path = %path.display(),
            "no resource descriptor, probing local machine"
        );
        probe_local(name)
    }
}

/// Derive limits from the local machine: core count from `/proc/cpuinfo`,
/// per-core memory as (total - headroom) split evenly.
pub fn probe_local(name: &str) -> RigResult<ResourceLimits> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo")?;
    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    let cores = count_processors(&cpuinfo).max(1);
    let total_mb = total_memory_mb(&meminfo).unwrap_or(LOCAL_MEMORY_HEADROOM_MB);
    let per_core = total_mb.saturating_sub(LOCAL_MEMORY_HEADROOM_MB) / u64::from(cores);
    Ok(ResourceLimits::new(name, cores, per_core))
}

/// First line of a resource descriptor: `<core_limit> <memory_per_core>`.
pub(crate) fn parse_descriptor(line: &str) -> Option<(u32, u64)> {
    let mut parts = line.split_whitespace();
    let cores = parts.next()?.parse().ok()?;
    let memory = parts.next()?.parse().ok()?;
    Some((cores, memory))
}

/// Count `processor` entries in cpuinfo text.
pub(crate) fn count_processors(cpuinfo: &str) -> u32 {
    u32::try_from(
        cpuinfo
            .lines()
            .filter(|line| line.starts_with("processor"))
            .count(),
    )
    .unwrap_or(u32::MAX)
}

/// Total memory in MB from the `MemTotal:` line of meminfo text.
pub(crate) fn total_memory_mb(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}
