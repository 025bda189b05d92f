pub mod line;
pub mod split;
pub mod tokenize;
pub mod types;

pub use line::{logical_lines, parse};
pub use split::{find_unquoted_char, split_by_unquoted_char};
pub use tokenize::tokenize;
pub use types::{ParseResult, PipelineStage};
