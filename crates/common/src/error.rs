use thiserror::Error;

/// Slot range validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// A bound falls outside the fixed keyspace.
    #[error("Slot {slot} outside keyspace 0..={max}")]
    OutOfKeyspace { slot: u32, max: u16 },

    /// Left bound is greater than the right bound.
    #[error("Reversed slot range {left}-{right}")]
    Reversed { left: u16, right: u16 },

    /// Operator text could not be parsed as `a-b` or `a`.
    #[error("Invalid slot range `{input}`")]
    Malformed { input: String },
}

impl RangeError {
    pub fn malformed(input: impl Into<String>) -> Self {
        RangeError::Malformed {
            input: input.into(),
        }
    }
}

/// Failures raised while decoding a message from one of the inbound feeds.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Payload was not a JSON object of the expected shape.
    #[error("Malformed {feed} message: {source}")]
    Json {
        feed: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Payload was blank.
    #[error("Empty {feed} message")]
    Empty { feed: &'static str },

    /// Payload parsed but carries no identifier to key it by.
    #[error("{feed} message has an empty `{field}`")]
    MissingId {
        feed: &'static str,
        field: &'static str,
    },
}

impl FeedError {
    pub fn json(feed: &'static str, source: serde_json::Error) -> Self {
        FeedError::Json { feed, source }
    }

    /// Feed name the failure originated from.
    pub fn feed(&self) -> &'static str {
        match self {
            FeedError::Json { feed, .. }
            | FeedError::Empty { feed }
            | FeedError::MissingId { feed, .. } => feed,
        }
    }
}

/// Dashboard configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config lists no regions")]
    NoRegions,

    #[error("Region `{region}` listed more than once")]
    DuplicateRegion { region: String },

    #[error("Master region `{region}` is not one of the configured regions")]
    UnknownMasterRegion { region: String },

    #[error("`{field}` must be greater than zero")]
    InvalidInterval { field: &'static str },
}
