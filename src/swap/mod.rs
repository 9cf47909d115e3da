pub mod classifier;
pub mod confidence;
pub mod core_assets;
pub mod deltas;
pub mod models;
pub mod parser;
pub mod usd_filter;
pub mod validator;

pub use models::{EraseReason, EraseRecord, ParsedSwap, ParserResult, SwapOutcome};
pub use parser::{parse_swap, ParserConfig};
