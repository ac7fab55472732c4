//! Worst-case status aggregation over watchdog metadata entries.
//!
//! Pure functions; safe to call from any number of tasks.

use warden_core::{Metadata, WATCHDOG_PREFIX, WatchdogLevel};

/// Label returned when no watchdog entries are present.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Reduce a pod's metadata to the most critical watchdog level label.
///
/// Only entries under the watchdog prefix with a `level/...` value are
/// considered. The returned label keeps the casing found in the entry.
pub fn aggregate(metadata: &Metadata) -> String {
    metadata
        .iter()
        .filter(|(key, _)| key.starts_with(WATCHDOG_PREFIX))
        .filter_map(|(_, value)| value.split_once('/').map(|(level, _)| level))
        .fold(UNKNOWN_STATUS, |worst, level| more_critical_status(worst, level))
        .to_string()
}

/// The more severe of two level labels, compared case-insensitively.
///
/// Ties keep `a`, which makes repeated folding left-stable.
pub fn more_critical_status<'a>(a: &'a str, b: &'a str) -> &'a str {
    if WatchdogLevel::parse(b).weight() > WatchdogLevel::parse(a).weight() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(entries: &[(&str, &str)]) -> Metadata {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_is_unknown() {
        assert_eq!(aggregate(&Metadata::new()), "Unknown");
    }

    #[test]
    fn unprefixed_entries_are_ignored() {
        let metadata = md(&[
            ("a", "Error/disk full"),
            ("wd.a", "Info/ok"),
            ("wd.b", "Warning/slow"),
            ("wd.c", "Unknown/?"),
        ]);
        assert_eq!(aggregate(&metadata), "Warning");
    }

    #[test]
    fn malformed_values_are_skipped() {
        let metadata = md(&[("wd.a", "Error"), ("wd.b", "info/fine")]);
        assert_eq!(aggregate(&metadata), "info");
    }

    #[test]
    fn error_dominates_and_keeps_casing() {
        let metadata = md(&[("wd.a", "warning/x"), ("wd.b", "ERROR/y"), ("wd.c", "Info/z")]);
        assert_eq!(aggregate(&metadata), "ERROR");
    }

    #[test]
    fn ties_keep_first_argument() {
        assert_eq!(more_critical_status("Error", "error"), "Error");
        assert_eq!(more_critical_status("bogus", "other"), "bogus");
        assert_eq!(more_critical_status("info", "Warning"), "Warning");
    }

    #[test]
    fn fold_is_left_stable() {
        let labels = ["Error", "ERROR", "Warning", "info", "Info", "nonsense", ""];
        for x in labels {
            for y in labels {
                for z in labels {
                    let wx = WatchdogLevel::parse(x).weight();
                    if wx >= WatchdogLevel::parse(y).weight()
                        && wx >= WatchdogLevel::parse(z).weight()
                    {
                        assert_eq!(more_critical_status(more_critical_status(x, y), z), x);
                    }
                }
            }
        }
    }
}
