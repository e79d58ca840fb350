//! Helpers for testing sketches and the engine that runs them.
//!
//! - **Assertions**: monoid laws, progress monotonicity, approximate equality
//! - **Fixtures**: synthetic tables and pre-split datasets
//! - [`init_tracing`]: opt-in log output for tests, filtered by `RUST_LOG`
//!
//! ```
//! use ironsketch::sketches::CountMonoid;
//! use ironsketch::testing::assert_monoid_laws;
//!
//! assert_monoid_laws(&CountMonoid, &[0, 1, 7, 42]);
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber once; later calls are no-ops.
pub fn init_tracing() {
    // Another test may have installed the global subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
