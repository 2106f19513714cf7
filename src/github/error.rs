//! Error types for the repository API client

use thiserror::Error;

/// Errors from the remote repository object-store API
#[derive(Debug, Error)]
pub enum RepoError {
    /// Server returned a non-success status
    #[error("API error {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// Network-level failure (timeout, connection refused, TLS, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not parse as expected
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blob content could not be decoded
    #[error("Blob encoding error: {0}")]
    Encoding(String),

    /// Client could not be constructed from the given settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepoError {
    /// HTTP status of the error, when it came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            RepoError::Api { status, .. } => Some(*status),
            RepoError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the server reported the object or ref as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = RepoError::Api {
            status: 422,
            url: "https://api.example.com/repos/a/b/git/trees".to_string(),
            message: "Validation Failed".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("422"));
        assert!(display.contains("Validation Failed"));
    }

    #[test]
    fn test_not_found_detection() {
        let missing = RepoError::Api {
            status: 404,
            url: "https://api.example.com/repos/a/b/commits/main".to_string(),
            message: "Not Found".to_string(),
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.status(), Some(404));

        let encoding = RepoError::Encoding("bad base64".to_string());
        assert!(!encoding.is_not_found());
        assert_eq!(encoding.status(), None);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: RepoError = json_err.into();
        assert!(matches!(err, RepoError::Json(_)));
    }
}
