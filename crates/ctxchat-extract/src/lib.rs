pub mod extractor;
pub mod http;

pub mod mock;

pub use extractor::{ExtractError, SourceExtractor};
pub use http::HttpExtractor;
pub use mock::MockExtractor;
