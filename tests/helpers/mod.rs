// Test helper modules
pub mod fakes;
pub mod test_harness;

pub use fakes::{FailingEmbedder, RefusingExtractor, TrippingSnapshot};
pub use test_harness::TestHarness;
