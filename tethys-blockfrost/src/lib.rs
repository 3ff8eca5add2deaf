//! Parsers for the json contracts a Blockfrost-style provider speaks:
//! the utxo listing for an address and the script-evaluation request and
//! response. Network transport, retries and authentication belong to the
//! provider driving these parsers, not to this crate.

use thiserror::Error;

pub mod eval;
pub mod utxo;

pub use eval::{apply_evaluation, eval_request};
pub use utxo::{parse_utxos, Utxo};

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("response is missing the {0} field")]
    MissingField(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("script evaluation failed: {0}")]
    ScriptEvaluationFailure(String),

    #[error(transparent)]
    Domain(#[from] tethys_primitives::Error),
}
