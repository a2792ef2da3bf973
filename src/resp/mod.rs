pub mod parser;
pub mod types;
pub mod writer;

pub use parser::{parse, parse_slice};
pub use types::RespValue;
pub use writer::{encode_command, encode_pipeline, encode_transaction};
