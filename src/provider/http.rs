use reqwest::RequestBuilder;

use crate::error::{PilotError, PilotResult};

/// Map a non-success HTTP status to the error taxonomy.
///
/// 429 is a rate limit, 502/503/504 are transient gateway failures, other
/// 5xx are non-transient gateway failures.
pub fn status_error(provider: &str, status: u16, message: String) -> PilotError {
    match status {
        429 => PilotError::RateLimited {
            provider: provider.to_string(),
            message,
        },
        502 | 503 | 504 => PilotError::Gateway {
            provider: provider.to_string(),
            status,
            transient: true,
            message,
        },
        500..=599 => PilotError::Gateway {
            provider: provider.to_string(),
            status,
            transient: false,
            message,
        },
        401 | 403 => PilotError::Auth(format!("{provider} {status}: {message}")),
        400 | 422 => PilotError::BadRequest(format!("{provider} {status}: {message}")),
        404 => PilotError::ModelNotFound(format!("{provider}: {message}")),
        _ => PilotError::Provider(format!("{provider} API error {status}: {message}")),
    }
}

/// POST a JSON body and return the decoded JSON response
pub(crate) async fn send_json(
    request: RequestBuilder,
    provider: &str,
    body: &serde_json::Value,
) -> PilotResult<serde_json::Value> {
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(provider, status.as_u16(), text));
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let err = status_error("openai", 429, "slow down".into());
        assert!(matches!(err, PilotError::RateLimited { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn gateway_classification() {
        for status in [502, 503, 504] {
            let err = status_error("openai", status, String::new());
            assert!(err.is_transient(), "{status} should be transient");
        }
        let err = status_error("openai", 500, String::new());
        assert!(matches!(err, PilotError::Gateway { status: 500, transient: false, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn client_errors() {
        assert!(matches!(status_error("anthropic", 401, String::new()), PilotError::Auth(_)));
        assert!(matches!(status_error("anthropic", 403, String::new()), PilotError::Auth(_)));
        assert!(matches!(
            status_error("anthropic", 400, "bad".into()),
            PilotError::BadRequest(_)
        ));
        assert!(matches!(
            status_error("ollama", 404, "model 'x' not found".into()),
            PilotError::ModelNotFound(_)
        ));
        assert!(matches!(status_error("ollama", 418, String::new()), PilotError::Provider(_)));
    }
}
