//! Infrastructure layer
//!
//! Process-level concerns that sit outside the pipeline domain.

mod logging;

pub use logging::init_logging;
