//! Error categories, one per spec.md §7 policy row.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VecgymError {
    #[error("{0}")]
    Config(String),

    #[error("tensor file '{file}' has size {actual} bytes, expected {expected}")]
    Layout { file: String, expected: u64, actual: u64 },

    #[error("tensor file '{file}' length not divisible by LUMP*NCPU*BUNCH*steps")]
    NonDivisible { file: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("protocol desync: expected {expected:?}, got {got:?}")]
    Protocol { expected: String, got: u8 },

    #[error("emulator contract violation: {0}")]
    EmulatorContract(String),
}
