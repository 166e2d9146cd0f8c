#[derive(Clone, Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("network error: {0}")]
    Network(String),

    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl TelegramError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Api { .. } => "api",
            Self::Decode(_) => "decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: message to edit not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "telegram api error 400: Bad Request: message to edit not found"
        );
        assert_eq!(err.error_kind(), "api");
    }
}
