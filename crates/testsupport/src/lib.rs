//! Test support utilities for the workspace.
//!
//! Provides isolated database contexts over temporary storage, SQL script
//! execution with pretty-printed output, reusable fixtures including the
//! canonical join corpus, property-based generators for core types, and
//! assertion helpers.
//!
//! # Example
//!
//! ```no_run
//! use testsupport::prelude::*;
//!
//! let output = run_sql_script(
//!     "CREATE TABLE users (id INT, name TEXT);
//!      INSERT INTO users VALUES (1, 'Alice');
//!      SELECT * FROM users;",
//! )
//! .unwrap();
//! assert!(output.contains("Alice"));
//! ```

pub mod assertions;
pub mod context;
pub mod fixtures;
pub mod macros;
pub mod proptest_generators;
pub mod runner;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::context::*;
    pub use crate::fixtures::*;
    pub use crate::runner::*;
}
