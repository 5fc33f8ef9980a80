//! Missing instance calculation
//!
//! Pure set difference between the desired index range `1..=N` and the indices
//! read off the names of existing resources.

use std::collections::BTreeSet;

use super::error::IndexParseError;
use crate::store::ResourceHandle;

/// Result of diffing the desired instances against the existing ones
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissingInstances {
    /// Indices that have to be created, ascending
    pub indices: BTreeSet<u32>,
    /// Existing resources whose name carries no valid index
    pub parse_errors: Vec<IndexParseError>,
}

/// Every index of a fleet of `instance_count` instances
pub fn all_instances(instance_count: u32) -> BTreeSet<u32> {
    (1..=instance_count).collect()
}

/// Compute the indices in `1..=instance_count` not covered by `existing`
///
/// The index of each existing resource is its name with the first
/// `name_prefix_length` characters removed. A name that does not end in a
/// positive integer is recorded in `parse_errors` and removes nothing: a
/// malformed entry is never trusted as present. Indices above
/// `instance_count` are ignored.
pub fn compute_missing(
    existing: &[ResourceHandle],
    instance_count: u32,
    name_prefix_length: usize,
) -> MissingInstances {
    let mut missing = MissingInstances {
        indices: all_instances(instance_count),
        parse_errors: Vec::new(),
    };

    for resource in existing {
        match parse_instance_index(&resource.name, name_prefix_length) {
            Ok(index) => {
                missing.indices.remove(&index);
            }
            Err(e) => missing.parse_errors.push(e),
        }
    }

    missing
}

/// Read the instance index off a resource name
pub fn parse_instance_index(
    name: &str,
    name_prefix_length: usize,
) -> Result<u32, IndexParseError> {
    let suffix = name
        .char_indices()
        .nth(name_prefix_length)
        .map(|(offset, _)| &name[offset..])
        .ok_or_else(|| IndexParseError {
            name: name.to_string(),
            reason: format!("name is not longer than the {name_prefix_length} character prefix"),
        })?;

    let index: u32 = suffix.parse().map_err(|e| IndexParseError {
        name: name.to_string(),
        reason: format!("suffix {suffix:?} is not an integer: {e}"),
    })?;

    if index == 0 {
        return Err(IndexParseError {
            name: name.to_string(),
            reason: "instance indices start at 1".to_string(),
        });
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: usize = "ping-service-".len();

    fn handles(names: &[&str]) -> Vec<ResourceHandle> {
        names
            .iter()
            .map(|name| ResourceHandle::new(*name, Vec::new()))
            .collect()
    }

    fn set(indices: &[u32]) -> BTreeSet<u32> {
        indices.iter().copied().collect()
    }

    #[test]
    fn nothing_existing_means_everything_missing() {
        let missing = compute_missing(&[], 3, PREFIX);
        assert_eq!(missing.indices, set(&[1, 2, 3]));
        assert!(missing.parse_errors.is_empty());
    }

    #[test]
    fn existing_indices_are_removed() {
        let missing = compute_missing(&handles(&["ping-service-1", "ping-service-3"]), 3, PREFIX);
        assert_eq!(missing.indices, set(&[2]));
    }

    #[test]
    fn complete_fleet_has_nothing_missing() {
        let missing = compute_missing(&handles(&["ping-service-2", "ping-service-1"]), 2, PREFIX);
        assert!(missing.indices.is_empty());
    }

    /// Story: a malformed name is logged but never trusted as present
    #[test]
    fn malformed_suffix_is_reported_and_removes_nothing() {
        let missing = compute_missing(&handles(&["ping-service-x"]), 2, PREFIX);
        assert_eq!(missing.indices, set(&[1, 2]));
        assert_eq!(missing.parse_errors.len(), 1);
        assert_eq!(missing.parse_errors[0].name, "ping-service-x");
    }

    #[test]
    fn malformed_entries_do_not_stop_the_scan() {
        let missing = compute_missing(
            &handles(&["ping-service-x", "ping-service-2", "ping-service-"]),
            3,
            PREFIX,
        );
        assert_eq!(missing.indices, set(&[1, 3]));
        assert_eq!(missing.parse_errors.len(), 2);
    }

    #[test]
    fn indices_beyond_the_count_are_ignored() {
        let missing = compute_missing(&handles(&["ping-service-7"]), 2, PREFIX);
        assert_eq!(missing.indices, set(&[1, 2]));
        assert!(missing.parse_errors.is_empty());
    }

    #[test]
    fn zero_instances_means_nothing_missing() {
        let missing = compute_missing(&handles(&["ping-service-1", "ping-service-x"]), 0, PREFIX);
        assert!(missing.indices.is_empty());
    }

    #[test]
    fn short_names_are_parse_errors_not_panics() {
        let err = parse_instance_index("ping", PREFIX).unwrap_err();
        assert!(err.reason.contains("prefix"));
    }

    #[test]
    fn zero_and_negative_suffixes_are_rejected() {
        assert!(parse_instance_index("ping-service-0", PREFIX).is_err());
        assert!(parse_instance_index("ping-service--1", PREFIX).is_err());
    }

    #[test]
    fn prefix_is_stripped_by_length() {
        assert_eq!(parse_instance_index("ping-service-12", PREFIX).unwrap(), 12);
        assert_eq!(parse_instance_index("pong-service-4", PREFIX).unwrap(), 4);
    }

    #[test]
    fn all_instances_is_one_based() {
        assert_eq!(all_instances(3), set(&[1, 2, 3]));
        assert!(all_instances(0).is_empty());
    }
}
