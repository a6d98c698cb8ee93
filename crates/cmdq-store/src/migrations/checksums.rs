//! DDL fingerprints kept in the `schema_version` ledger
//!
//! A step whose SQL was edited after it ran no longer matches its ledger row,
//! and the store refuses to open rather than guess which schema it has.

use crate::errors::{checksum_mismatch, Result};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a step's DDL
pub fn ddl_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Compare a ledger row against the step shipped in this build
pub fn verify_recorded(migration_id: &str, recorded: &str, sql: &str) -> Result<()> {
    let shipped = ddl_checksum(sql);
    if recorded == shipped {
        Ok(())
    } else {
        Err(checksum_mismatch(migration_id, recorded, &shipped))
    }
}
