//! Embedded migration steps
//!
//! DDL is embedded at compile time using include_str!; data transforms are
//! plain functions run inside the same transaction as the DDL.

use super::transforms::{self, Transform};

/// Migration metadata
pub struct Migration {
    /// Schema version reached once this step is applied
    pub version: u32,
    pub id: &'static str,
    pub sql: &'static str,
    pub transform: Option<Transform>,
}

/// The base schema; created when missing, recorded as version 0
pub fn base_schema() -> Migration {
    Migration {
        version: 0,
        id: "000_base_schema",
        sql: include_str!("../../migrations/000_base_schema.sql"),
        transform: None,
    }
}

/// All versioned steps in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            id: "001_photo_paths",
            sql: include_str!("../../migrations/001_photo_paths.sql"),
            transform: None,
        },
        Migration {
            version: 2,
            id: "002_error_message_and_status_renames",
            sql: include_str!("../../migrations/002_error_message.sql"),
            transform: Some(transforms::rename_legacy_statuses),
        },
        Migration {
            version: 3,
            id: "003_created_at_index",
            sql: include_str!("../../migrations/003_created_at_index.sql"),
            transform: None,
        },
        Migration {
            version: 4,
            id: "004_failed_flag",
            sql: include_str!("../../migrations/004_failed_flag.sql"),
            transform: Some(transforms::split_legacy_failed_status),
        },
        Migration {
            version: 5,
            id: "005_action_needed_flag",
            sql: include_str!("../../migrations/005_action_needed_flag.sql"),
            transform: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_contiguous() {
        let versions: Vec<u32> = get_migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<&str> = get_migrations().iter().map(|m| m.id).collect();
        ids.push(base_schema().id);
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
