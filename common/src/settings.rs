use crate::{
    error::{FetchError, TransportError},
    ports::HttpTransport,
    types::UserSettings,
};

/// Pulls the current user thresholds. Nothing is cached between ticks.
pub struct SettingsFetcher<H> {
    transport: H,
    endpoint: String,
}

impl<H: HttpTransport> SettingsFetcher<H> {
    pub fn new(transport: H, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn fetch(&mut self) -> Result<UserSettings, FetchError> {
        let response = self.transport.get(&self.endpoint)?;
        if response.status <= 0 {
            return Err(TransportError::Status(response.status).into());
        }
        if !(200..300).contains(&response.status) {
            return Err(FetchError::UnexpectedStatus(response.status));
        }
        parse_settings(&response.body)
    }
}

/// Syntax errors are [`FetchError::Json`]; a well-formed document with missing,
/// mistyped or unparseable fields is [`FetchError::MalformedSettings`].
pub fn parse_settings(body: &[u8]) -> Result<UserSettings, FetchError> {
    let document: serde_json::Value = serde_json::from_slice(body).map_err(FetchError::Json)?;
    serde_json::from_value(document).map_err(FetchError::MalformedSettings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::HttpResponse;
    use crate::testing::{Request, ScriptedTransport};
    use crate::time::TimeOfDay;
    use pretty_assertions::assert_eq;

    const URL: &str = "http://collector.local/api/settings";

    fn ok(body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn fetches_and_parses_settings() {
        let transport = ScriptedTransport::new([ok(
            r#"{"user_temp": 25, "light_time_off": "18:00:00", "user_light": "17:00:00"}"#,
        )]);
        let requests = transport.requests();
        let mut fetcher = SettingsFetcher::new(transport, URL);

        let settings = fetcher.fetch().unwrap();

        assert_eq!(
            settings,
            UserSettings {
                user_temp: 25.0,
                light_time_off: TimeOfDay::new(18, 0, 0),
                user_light: TimeOfDay::new(17, 0, 0),
            }
        );
        assert_eq!(
            requests.borrow().as_slice(),
            &[Request::Get {
                url: URL.to_string()
            }]
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_settings(b"{\"user_temp\": 25,").unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = parse_settings(br#"{"user_temp": 25, "light_time_off": "18:00:00"}"#)
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedSettings(_)));
    }

    #[test]
    fn wrong_type_is_malformed() {
        let err = parse_settings(
            br#"{"user_temp": "warm", "light_time_off": "18:00:00", "user_light": "17:00:00"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MalformedSettings(_)));
    }

    #[test]
    fn bad_time_string_is_malformed() {
        let err = parse_settings(
            br#"{"user_temp": 25, "light_time_off": "6pm", "user_light": "17:00:00"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MalformedSettings(_)));
    }

    #[test]
    fn non_positive_status_short_circuits() {
        let transport = ScriptedTransport::new([Ok(HttpResponse {
            status: 0,
            body: Vec::new(),
        })]);
        let mut fetcher = SettingsFetcher::new(transport, URL);

        assert!(matches!(
            fetcher.fetch().unwrap_err(),
            FetchError::Transport(TransportError::Status(0))
        ));
    }

    #[test]
    fn http_error_status_is_reported() {
        let transport = ScriptedTransport::new([Ok(HttpResponse {
            status: 404,
            body: b"not found".to_vec(),
        })]);
        let mut fetcher = SettingsFetcher::new(transport, URL);

        assert!(matches!(
            fetcher.fetch().unwrap_err(),
            FetchError::UnexpectedStatus(404)
        ));
    }
}
