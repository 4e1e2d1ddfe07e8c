use thiserror::Error;

/// Failures talking to the Flume API itself.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("flume api returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("flume api rejected request: {0}")]
    Rejected(String),
    #[error("flume api returned an empty {0} payload")]
    EmptyPayload(&'static str),
}

/// Errors reported through the accumulator while polling.
///
/// None of these fail a poll; they are handed to the sink and the poll keeps going
/// with whatever data it still has.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("unable to resolve device: {0}")]
    Directory(#[source] ApiError),
    #[error("account has no devices")]
    NoDevices,
    #[error("usage query for device {device_id} failed: {source}")]
    Query {
        device_id: String,
        #[source]
        source: ApiError,
    },
    #[error("unknown location timezone {0:?}")]
    Timezone(String),
    #[error("invalid bucket datetime {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("bucket datetime {value:?} does not exist in {timezone}")]
    NonexistentLocalTime { value: String, timezone: String },
}

/// A poll that could not run at all.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("collector has been stopped")]
    Stopped,
}
