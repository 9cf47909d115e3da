pub mod adapter;
pub mod amount;
pub mod helius;
pub mod models;
pub mod program_ids;
