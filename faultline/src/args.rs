use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Faultline demo shop
#[derive(Debug, Parser)]
#[command(name = "faultline", about = "Place an order against an in-process charge service")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "faultline.toml", env = "FAULTLINE_CONFIG")]
    pub config: PathBuf,

    /// Failure to provoke
    #[arg(short, long, value_enum, default_value_t = Scenario::Ok)]
    pub scenario: Scenario,

    /// Log recovered panics with a backtrace
    #[arg(long, env = "FAULTLINE_DEBUG")]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Order goes through
    Ok,
    /// Order names a product that does not exist
    NotFound,
    /// Order quantity is invalid
    Validation,
    /// Charge service rejects the payment
    InsufficientCredit,
    /// Charge service cannot reach its gateway
    Gateway,
    /// Charge service panics
    Panic,
    /// Charge service fails with an error outside the taxonomy
    Opaque,
}
