use thiserror::Error;

use crate::api_connection::connection::ApiConnectionError;
use crate::plate::ItemId;

/// Rejected user action. The plate is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlateError {
    #[error("grams must be a number between 0 and 100000, got {0}")]
    InvalidGrams(f64),

    #[error("grams value '{0}' is not a number")]
    UnparsableGrams(String),

    #[error("unknown reference key '{0}'")]
    UnknownKey(String),

    #[error("no line item with id {0}")]
    UnknownItem(ItemId),

    #[error("{0} item(s) still need a reference food before the plate can be finalized")]
    UnresolvedItems(usize),

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("unsupported image type '{0}' (expected png, jpg, jpeg or gif)")]
    UnsupportedImage(String),

    #[error("image is {size} bytes, limit is {limit} bytes")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("recognition request failed: {0}")]
    Api(#[from] ApiConnectionError),

    #[error("recognition service returned no answer")]
    EmptyResponse,

    #[error("could not parse recognition response: {0}")]
    Parse(String),
}
