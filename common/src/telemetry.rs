use log::{debug, warn};

use crate::{
    error::{ReportError, TransportError},
    ports::HttpTransport,
    types::{Reading, TelemetryPayload},
};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Posts each reading to the collector. One attempt per tick, no retry.
pub struct TelemetryReporter<H> {
    transport: H,
    endpoint: String,
}

impl<H: HttpTransport> TelemetryReporter<H> {
    pub fn new(transport: H, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the response status. Only a non-positive status is an error.
    pub fn report(&mut self, reading: &Reading) -> Result<i32, ReportError> {
        let body =
            serde_json::to_vec(&TelemetryPayload::from(reading)).map_err(ReportError::Encode)?;
        debug!("telemetry body: {}", String::from_utf8_lossy(&body));

        let response = self
            .transport
            .post(&self.endpoint, CONTENT_TYPE_JSON, &body)?;
        if response.status <= 0 {
            return Err(TransportError::Status(response.status).into());
        }
        if !(200..300).contains(&response.status) {
            warn!(
                "telemetry endpoint {} answered HTTP {}",
                self.endpoint, response.status
            );
        }
        Ok(response.status)
    }
}
