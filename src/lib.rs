//! Streams transactions touching monitored whale and KOL wallets, classifies
//! each wallet's asset movement into BUY/SELL swaps (or a two-leg split for
//! token-to-token trades), and persists each swap once.

pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod grpc;
pub mod matcher;
pub mod metrics;
pub mod metrics_server;
pub mod pricing;
pub mod solana;
pub mod swap;
pub mod telemetry;
