use reqwest::{Client, Response, StatusCode};

const USER_AGENT: &str = "pocket-org/0.1.0";

pub(crate) fn client() -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).build()
}

/// Failure details of a non-success response.
///
/// Pocket reports errors in the `X-Error-Code` and `X-Error` headers; the
/// body is used when `X-Error` is missing.
pub(crate) struct ErrorDetails {
    pub(crate) status: StatusCode,
    pub(crate) code: String,
    pub(crate) message: String,
}

impl ErrorDetails {
    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        let (code, message) = {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_owned()
            };
            (header("X-Error-Code"), header("X-Error"))
        };
        let message = if message.is_empty() {
            response.text().await.unwrap_or_default()
        } else {
            message
        };
        Self {
            status,
            code,
            message,
        }
    }
}
