//! Construction-time tuning knobs for each table variant (§6).
//!
//! The teacher crate's `config` module held a single `IndexConfig` for a
//! persistence-related write mode that this crate has no use for (tables
//! here are pure in-memory structures — see DESIGN.md). What survives is
//! the module's role: a dedicated home for small, validated knob structs
//! separate from the tables themselves.

use crate::error::{Result, TableError};

/// Initial slot count for [`crate::table::lp::LinearProbingTable`].
#[derive(Debug, Clone, Copy)]
pub struct LpConfig {
    pub initial_capacity: usize,
}

impl Default for LpConfig {
    fn default() -> Self {
        Self { initial_capacity: 8 }
    }
}

/// Bucket count for [`crate::table::chain::ChainingTable`].
#[derive(Debug, Clone, Copy)]
pub struct ChainConfig {
    pub buckets: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { buckets: 17 }
    }
}

/// Per-table slot count for [`crate::table::cuckoo::CuckooTable`].
#[derive(Debug, Clone, Copy)]
pub struct CuckooConfig {
    pub initial_capacity: usize,
}

impl Default for CuckooConfig {
    fn default() -> Self {
        Self { initial_capacity: 16 }
    }
}

/// Top-level bucket count for [`crate::table::perfect::PerfectHashTable`].
#[derive(Debug, Clone, Copy)]
pub struct PerfectConfig {
    pub buckets: usize,
}

impl Default for PerfectConfig {
    fn default() -> Self {
        Self { buckets: 16 }
    }
}

/// Initial block count for [`crate::table::iceberg::IcebergTable`].
#[derive(Debug, Clone, Copy)]
pub struct IcebergConfig {
    pub blocks: usize,
}

impl Default for IcebergConfig {
    fn default() -> Self {
        Self { blocks: 64 }
    }
}

/// Capacity budget and free-fraction for
/// [`crate::table::funnel::FunnelTable`].
#[derive(Debug, Clone, Copy)]
pub struct FunnelConfig {
    pub capacity: usize,
    pub delta: f64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            delta: 0.1,
        }
    }
}

impl FunnelConfig {
    pub fn validate(&self) -> Result<()> {
        validate_delta(self.delta)?;
        validate_nonzero_capacity(self.capacity)
    }
}

/// Capacity budget and free-fraction for
/// [`crate::table::elastic::ElasticTable`].
#[derive(Debug, Clone, Copy)]
pub struct ElasticConfig {
    pub capacity: usize,
    pub delta: f64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            delta: 0.1,
        }
    }
}

impl ElasticConfig {
    /// Implementation-defined minimum `N` (§4.8's "Configuration" clause).
    pub const MIN_CAPACITY: usize = 4;

    pub fn validate(&self) -> Result<()> {
        validate_delta(self.delta)?;
        if self.capacity < Self::MIN_CAPACITY {
            return Err(TableError::InvalidParameter {
                name: "capacity",
                value: self.capacity.to_string(),
                reason: format!("must be at least {}", Self::MIN_CAPACITY),
            });
        }
        Ok(())
    }
}

/// Capacity budget and fingerprint-size shape constant for
/// [`crate::table::ipbt::PartitionedFingerprintTable`].
#[derive(Debug, Clone, Copy)]
pub struct IpbtConfig {
    pub capacity: usize,
    pub shape_constant: f64,
}

impl Default for IpbtConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            shape_constant: 2.0,
        }
    }
}

impl IpbtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            return Err(TableError::InvalidParameter {
                name: "capacity",
                value: self.capacity.to_string(),
                reason: "must be at least 2 so that ln(N) is well-defined and positive".into(),
            });
        }
        if self.shape_constant < 0.0 {
            return Err(TableError::InvalidParameter {
                name: "shape_constant",
                value: self.shape_constant.to_string(),
                reason: "must be non-negative".into(),
            });
        }
        Ok(())
    }
}

fn validate_delta(delta: f64) -> Result<()> {
    if delta > 0.0 && delta < 1.0 {
        Ok(())
    } else {
        Err(TableError::InvalidParameter {
            name: "delta",
            value: delta.to_string(),
            reason: "must lie strictly between 0 and 1".into(),
        })
    }
}

fn validate_nonzero_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        Err(TableError::InvalidParameter {
            name: "capacity",
            value: capacity.to_string(),
            reason: "must be greater than zero".into(),
        })
    } else {
        Ok(())
    }
}
