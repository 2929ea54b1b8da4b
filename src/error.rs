use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider rate limited: {provider}, {message}")]
    RateLimited { provider: String, message: String },

    #[error("Gateway error from {provider}: status={status}, transient={transient}, {message}")]
    Gateway {
        provider: String,
        status: u16,
        transient: bool,
        message: String,
    },

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Context overflow: {used_tokens} tokens used, {max_tokens} max")]
    ContextOverflow {
        used_tokens: usize,
        max_tokens: usize,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Ability not found: {name}")]
    AbilityNotFound { name: String },

    #[error("No factory registered for ability kind: {kind}")]
    AbilityFactoryMissing { kind: String },

    #[error("Resource unavailable for ability {ability}: {resource}")]
    ResourceUnavailable { ability: String, resource: String },

    #[error("Ability execution error: ability={ability}, {message}")]
    AbilityExecution { ability: String, message: String },

    #[error("Invalid arguments for {ability}: {message}")]
    InvalidArguments { ability: String, message: String },

    #[error("Task {task_id} is already done and cannot be re-enqueued")]
    TaskAlreadyDone { task_id: String },

    #[error("Workspace path rejected: {0}")]
    WorkspacePath(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Run aborted: {0}")]
    Aborted(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PilotError {
    /// Whether the retry handler may try the call again.
    pub fn is_transient(&self) -> bool {
        match self {
            PilotError::RateLimited { .. } => true,
            PilotError::Gateway { transient, .. } => *transient,
            _ => false,
        }
    }
}

pub type PilotResult<T> = Result<T, PilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = PilotError::Provider("connection refused".into());
        assert_eq!(err.to_string(), "Provider error: connection refused");

        let err = PilotError::AbilityNotFound {
            name: "web_search".into(),
        };
        assert_eq!(err.to_string(), "Ability not found: web_search");

        let err = PilotError::ContextOverflow {
            used_tokens: 9_000,
            max_tokens: 8_192,
        };
        assert!(err.to_string().contains("9000"));

        let err = PilotError::Gateway {
            provider: "openai".into(),
            status: 502,
            transient: true,
            message: "bad gateway".into(),
        };
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn transient_classification() {
        assert!(PilotError::RateLimited {
            provider: "openai".into(),
            message: "slow down".into(),
        }
        .is_transient());
        assert!(PilotError::Gateway {
            provider: "openai".into(),
            status: 502,
            transient: true,
            message: String::new(),
        }
        .is_transient());
        assert!(!PilotError::Gateway {
            provider: "openai".into(),
            status: 500,
            transient: false,
            message: String::new(),
        }
        .is_transient());
        assert!(!PilotError::Auth("bad key".into()).is_transient());
        assert!(!PilotError::BadRequest("missing field".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PilotError>();
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PilotError = io_err.into();
        assert!(matches!(err, PilotError::Io(_)));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: PilotError = json_err.into();
        assert!(matches!(err, PilotError::Serialization(_)));
    }
}
