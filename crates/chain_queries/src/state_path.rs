//! Parsing of the `DAPath` recorded with each settled state.
//!
//! The hub stores the DA location of a state as a `|`-delimited string. The
//! first segment names the DA backend and the second is the DA height the
//! state was posted at. For Celestia the full layout is
//! `celestia|height|index|length|commitment|namespace|root`.

use crate::{QueryError, Result};

const SEPARATOR: char = '|';
const NAMESPACE_SEGMENT: usize = 5;

/// DA height encoded in `da_path`.
pub fn extract_height_from_state_path(da_path: &str) -> Result<u64> {
    let height = da_path
        .split(SEPARATOR)
        .nth(1)
        .ok_or_else(|| QueryError::Malformed {
            field: "DAPath",
            reason: format!("{da_path:?} does not have enough parts"),
        })?;

    height.trim().parse().map_err(|e| QueryError::Malformed {
        field: "DAPath",
        reason: format!("height {height:?} is not a number: {e}"),
    })
}

/// Celestia namespace encoded in `da_path`.
pub fn extract_namespace_from_state_path(da_path: &str) -> Result<String> {
    da_path
        .split(SEPARATOR)
        .nth(NAMESPACE_SEGMENT)
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .ok_or_else(|| QueryError::Malformed {
            field: "DAPath",
            reason: format!("{da_path:?} does not carry a namespace"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_height() {
        assert_eq!(extract_height_from_state_path("x|42|y").unwrap(), 42);
        assert_eq!(extract_height_from_state_path("celestia|777|abc").unwrap(), 777);
        assert_eq!(extract_height_from_state_path("celestia|9").unwrap(), 9);
    }

    #[test]
    fn test_single_segment_is_rejected() {
        let err = extract_height_from_state_path("onlyonefield").unwrap_err();
        assert!(matches!(err, QueryError::Malformed { field: "DAPath", .. }));
        assert!(extract_height_from_state_path("").is_err());
    }

    #[test]
    fn test_non_numeric_height_is_rejected() {
        assert!(extract_height_from_state_path("celestia|abc|1").is_err());
        assert!(extract_height_from_state_path("celestia||1").is_err());
    }

    #[test]
    fn test_extract_namespace() {
        let path = "celestia|777|3|12|abcd|0000dead|ff";
        assert_eq!(extract_namespace_from_state_path(path).unwrap(), "0000dead");
        assert!(extract_namespace_from_state_path("celestia|777|3").is_err());
    }
}
