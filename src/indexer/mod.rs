pub mod chunker;
pub mod extractors;
pub mod parser_pool;
pub mod references;
pub mod walker;

pub use chunker::{estimate_tokens, split_on_lines};
pub use extractors::{detect_language, DraftSymbol, ExtractionError, ExtractorRegistry};
pub use parser_pool::ParserPool;
pub use references::{find_usages, self_references, UsageSite};
pub use walker::Walker;
