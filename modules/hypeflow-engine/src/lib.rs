pub mod aggregate;
pub mod backend;
pub mod confidence;
pub mod extractor;
pub mod hype;
pub mod inheritance;
pub mod parse;
pub mod pipeline;
pub mod span;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
