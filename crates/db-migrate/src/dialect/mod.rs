//! Canonical type system.
//!
//! - [`canonical`]: the fixed engine-neutral vocabulary
//! - [`native`]: per-source-engine native → canonical tables
//! - [`typemap`]: per-target-engine canonical → native templates
//!
//! # Usage
//!
//! ```rust
//! use db_migrate::dialect::resolve_target_type;
//!
//! let native = resolve_target_type("DECIMAL", "mysql", None, Some(18), Some(4)).unwrap();
//! assert_eq!(native, "DECIMAL(18,4)");
//! ```

pub mod canonical;
pub mod native;
pub mod typemap;

pub use canonical::CanonicalType;
pub use native::{mssql_to_canonical, postgres_to_canonical};
pub use typemap::{resolve_target_type, template, TARGET_ENGINES};
