use thiserror::Error;

/// Coarse classification used for diagnostics when a tick is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    SensorFault,
    Output,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::Parse => "PARSE",
            Self::SensorFault => "SENSOR_FAULT",
            Self::Output => "OUTPUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("expected HH:MM:SS (8 bytes), got {0} bytes")]
    Length(usize),
    #[error("expected ':' separators at positions 2 and 5")]
    Separator,
    #[error("{field} is not an unsigned integer")]
    NonNumeric { field: &'static str },
    #[error("timestamp `{0}` has no HH:MM:SS suffix")]
    Timestamp(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("non-positive response code {0}")]
    Status(i32),
    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode telemetry payload: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("settings endpoint answered HTTP {0}")]
    UnexpectedStatus(i32),
    #[error("settings body is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("settings document is malformed: {0}")]
    MalformedSettings(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to drive {output} output: {message}")]
pub struct OutputError {
    pub output: &'static str,
    pub message: String,
}

impl OutputError {
    pub fn new(output: &'static str, message: impl Into<String>) -> Self {
        Self {
            output,
            message: message.into(),
        }
    }
}

/// Anything that ends a tick early. The loop logs it and retries on the next tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("sensor fault: temperature reading {0} is a driver sentinel")]
    SensorFault(f32),
    #[error("telemetry report failed: {0}")]
    Report(#[from] ReportError),
    #[error("settings fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("invalid time of day: {0}")]
    Time(#[from] TimeParseError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl TickError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SensorFault(_) => ErrorKind::SensorFault,
            Self::Report(ReportError::Transport(_)) => ErrorKind::Transport,
            Self::Report(ReportError::Encode(_)) => ErrorKind::Parse,
            Self::Fetch(FetchError::Transport(_) | FetchError::UnexpectedStatus(_)) => {
                ErrorKind::Transport
            }
            Self::Fetch(FetchError::Json(_) | FetchError::MalformedSettings(_)) => {
                ErrorKind::Parse
            }
            Self::Time(_) => ErrorKind::Parse,
            Self::Output(_) => ErrorKind::Output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_tick_errors() {
        let transport = TickError::Report(ReportError::Transport(TransportError::Status(-1)));
        assert_eq!(transport.kind(), ErrorKind::Transport);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(TickError::Fetch(FetchError::Json(json)).kind(), ErrorKind::Parse);

        assert_eq!(TickError::SensorFault(-127.0).kind(), ErrorKind::SensorFault);
        assert_eq!(
            TickError::Fetch(FetchError::UnexpectedStatus(404)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn transport_error_message_names_the_code() {
        assert_eq!(
            TransportError::Status(-11).to_string(),
            "non-positive response code -11"
        );
    }
}
