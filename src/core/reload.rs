//! # Configuration reload: desired cadences applied to the live registry.
//!
//! A [`CadenceTable`] lists `routine name → desired cadence` (`0` = disabled). Applying it
//! diffs each named routine against the registry and records what changed in a
//! [`ReloadReport`]. Routines the table does not name are left alone.
//!
//! ## Diff rules (per named routine)
//! ```text
//! desired == 0, live         ─► unregister                 (disabled)
//! desired == 0, not live     ─► nothing
//! desired == live cadence    ─► nothing
//! desired != live cadence    ─► unregister + re-register   (moved)
//! desired > 0,  not live     ─► recall + register          (enabled)
//!                               └─ never registered         (unknown)
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use super::registry::CadenceRegistry;

/// Desired cadence per routine name.
///
/// ## Example
/// ```
/// use std::time::Duration;
/// use cadencevisor::CadenceTable;
///
/// let table = CadenceTable::new()
///     .with("storage", Duration::from_secs(300))
///     .disable("logs");
///
/// assert_eq!(table.get("logs"), Some(Duration::ZERO));
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CadenceTable {
    entries: BTreeMap<String, Duration>,
}

impl CadenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the desired cadence of `name` (builder style).
    pub fn with(mut self, name: impl Into<String>, cadence: Duration) -> Self {
        self.insert(name, cadence);
        self
    }

    /// Marks `name` as disabled (builder style).
    pub fn disable(self, name: impl Into<String>) -> Self {
        self.with(name, Duration::ZERO)
    }

    /// Sets the desired cadence of `name`; the last value wins.
    pub fn insert(&mut self, name: impl Into<String>, cadence: Duration) {
        self.entries.insert(name.into(), cadence);
    }

    /// Desired cadence of `name`.
    pub fn get(&self, name: &str) -> Option<Duration> {
        self.entries.get(name).copied()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), *d))
    }

    /// Number of named routines in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table names no routine.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Duration)> for CadenceTable {
    fn from_iter<I: IntoIterator<Item = (S, Duration)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, cadence) in iter {
            table.insert(name, cadence);
        }
        table
    }
}

/// Outcome of one reload; every list is in name order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Recalled and registered at their desired cadence.
    pub enabled: Vec<String>,
    /// Moved from one live cadence to another.
    pub moved: Vec<String>,
    /// Unregistered (desired cadence `0`).
    pub disabled: Vec<String>,
    /// Named with a cadence but never registered.
    pub unknown: Vec<String>,
}

impl ReloadReport {
    /// True if the registry was mutated.
    pub fn changed(&self) -> bool {
        !(self.enabled.is_empty() && self.moved.is_empty() && self.disabled.is_empty())
    }

    /// One-line summary used in logs.
    pub fn summary(&self) -> String {
        format!(
            "enabled={} moved={} disabled={} unknown={}",
            self.enabled.len(),
            self.moved.len(),
            self.disabled.len(),
            self.unknown.len()
        )
    }
}

/// Applies `table` to `registry` and reports what changed.
pub(crate) fn apply(table: &CadenceTable, registry: &CadenceRegistry) -> ReloadReport {
    let mut report = ReloadReport::default();

    for (name, desired) in table.iter() {
        let live = registry.cadence_of(name);
        match live {
            Some(_) if desired.is_zero() => {
                registry.unregister(name);
                report.disabled.push(name.to_string());
            }
            None if desired.is_zero() => {}
            Some(current) if current == desired => {}
            Some(_) => {
                if let Some(routine) = registry.unregister(name) {
                    registry.register_with_cadence(name, routine, desired);
                    report.moved.push(name.to_string());
                }
            }
            None => match registry.recall(name) {
                Some(routine) => {
                    registry.register_with_cadence(name, routine, desired);
                    report.enabled.push(name.to_string());
                }
                None => report.unknown.push(name.to_string()),
            },
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::{RoutineContext, RoutineFn, RoutineRef};

    const MIN: Duration = Duration::from_secs(60);

    fn noop() -> RoutineRef {
        RoutineFn::arc(|_ctx: RoutineContext| async { Ok(()) })
    }

    fn seeded() -> CadenceRegistry {
        let registry = CadenceRegistry::default();
        registry.register_with_cadence("storage", noop(), MIN);
        registry.register_with_cadence("batch", noop(), MIN);
        registry.register_with_cadence("logs", noop(), 5 * MIN);
        registry.unregister("logs");
        registry
    }

    #[test]
    fn test_apply_diff() {
        let registry = seeded();
        let table = CadenceTable::new()
            .with("storage", 5 * MIN)
            .with("batch", MIN)
            .with("logs", 10 * MIN)
            .with("ghost", MIN)
            .disable("never_live");

        let report = apply(&table, &registry);
        assert_eq!(report.moved, vec!["storage"]);
        assert_eq!(report.enabled, vec!["logs"]);
        assert_eq!(report.unknown, vec!["ghost"]);
        assert!(report.disabled.is_empty());
        assert!(report.changed());

        assert_eq!(registry.cadence_of("storage"), Some(5 * MIN));
        assert_eq!(registry.cadence_of("batch"), Some(MIN));
        assert_eq!(registry.cadence_of("logs"), Some(10 * MIN));
        assert_eq!(registry.cadence_of("ghost"), None);
    }

    #[test]
    fn test_disable_and_untouched_names() {
        let registry = seeded();
        let report = apply(&CadenceTable::new().disable("batch"), &registry);

        assert_eq!(report.disabled, vec!["batch"]);
        assert_eq!(registry.cadence_of("batch"), None);
        assert_eq!(registry.cadence_of("storage"), Some(MIN));
        assert!(registry.recall("batch").is_some());
    }

    #[test]
    fn test_noop_reload_reports_no_change() {
        let registry = seeded();
        let before = registry.assignments();
        let table: CadenceTable = [("storage", MIN), ("batch", MIN), ("ghost", MIN)]
            .into_iter()
            .collect();

        let report = apply(&table, &registry);
        assert!(!report.changed());
        assert_eq!(report.unknown, vec!["ghost"]);
        assert_eq!(registry.assignments(), before);
        assert_eq!(report.summary(), "enabled=0 moved=0 disabled=0 unknown=1");
    }
}
