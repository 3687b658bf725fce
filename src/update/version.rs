//! Version comparison for update decisions.

use std::cmp::Ordering;

/// Compare two version strings segment-wise.
///
/// Segments are split on `.` and parsed as integers; missing or
/// malformed segments compare as 0, so `"1"` equals `"1.0"` and
/// `"1.x"` equals `"1.0"`.
pub fn compare_versions(current: &str, candidate: &str) -> Ordering {
    let a: Vec<u64> = current.split('.').map(parse_segment).collect();
    let b: Vec<u64> = candidate.split('.').map(parse_segment).collect();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `candidate` is strictly newer than `current`.
///
/// An absent candidate never triggers an update; an absent current
/// version compares as 0.
pub fn needs_update(current: Option<&str>, candidate: Option<&str>) -> bool {
    match candidate {
        Some(candidate) => compare_versions(current.unwrap_or(""), candidate) == Ordering::Less,
        None => false,
    }
}

fn parse_segment(segment: &str) -> u64 {
    segment.trim().parse().unwrap_or(0)
}
