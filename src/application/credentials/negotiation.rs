//! Pure version negotiation

use std::cmp::Ordering;

use crate::shared::errors::{DomainError, DomainResult};

/// Order version strings by their dot-separated segments, numerically
/// where both segments are numbers.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u32>(), r.parse::<u32>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Highest version present in both sets. Membership is exact string
/// equality.
pub fn select_version(local: &[String], remote: &[String]) -> DomainResult<String> {
    local
        .iter()
        .filter(|v| remote.contains(v))
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
        .ok_or_else(|| DomainError::NoCompatibleVersion {
            local: local.to_vec(),
            remote: remote.to_vec(),
        })
}

/// Highest of `versions`, used to format tokens before negotiation
pub fn highest(versions: &[String]) -> Option<&str> {
    versions
        .iter()
        .max_by(|a, b| compare_versions(a, b))
        .map(String::as_str)
}
