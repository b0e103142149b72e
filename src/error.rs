//! Error types for wbalance

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no available backend")]
    NoAvailableBackend,

    #[error("sticky selection requires a non-empty key")]
    EmptyHashKey,

    #[error("unknown balance algorithm: {0}")]
    UnknownAlgorithm(u16),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
