use aivis_common::types::Platform;

/// Classified failure kinds for provider calls. The scheduler keys its
/// retry policy off these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Auth,
    RateLimited,
    QuotaExceeded,
    Timeout,
    MalformedResponse,
    UpstreamError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when querying an answer engine.
///
/// # Examples
///
/// ```rust
/// use aivis_common::types::Platform;
/// use aivis_provider::error::ProviderError;
///
/// let err = ProviderError::RateLimited { platform: Platform::Gemini };
/// assert!(err.retriable());
/// assert_eq!(err.kind().as_str(), "rate_limited");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connection-level failure before a response was received.
    #[error("{platform} transport error: {message}")]
    Transport { platform: Platform, message: String },

    /// Credentials were rejected. Retrying without operator action is futile.
    #[error("{platform} authentication rejected: {message}")]
    Auth { platform: Platform, message: String },

    /// Throttled by the provider; safe to retry after backoff.
    #[error("{platform} rate limited")]
    RateLimited { platform: Platform },

    /// Billing or usage quota exhausted; triggers a process-local cooldown.
    #[error("{platform} quota exhausted: {message}")]
    QuotaExceeded { platform: Platform, message: String },

    /// The call exceeded its deadline.
    #[error("{platform} timed out after {timeout_ms} ms")]
    Timeout { platform: Platform, timeout_ms: u64 },

    /// A 2xx response whose payload could not be interpreted.
    #[error("{platform} returned a malformed response: {message}")]
    MalformedResponse { platform: Platform, message: String },

    /// Non-2xx status from the provider itself.
    #[error("{platform} upstream error {status}: {body}")]
    UpstreamError {
        platform: Platform,
        status: u16,
        body: String,
    },
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Transport { .. } => ErrorKind::Transport,
            ProviderError::Auth { .. } => ErrorKind::Auth,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            ProviderError::Timeout { .. } => ErrorKind::Timeout,
            ProviderError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ProviderError::UpstreamError { .. } => ErrorKind::UpstreamError,
        }
    }

    /// Whether the scheduler may retry the job after backoff.
    pub fn retriable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::RateLimited | ErrorKind::Timeout
        )
    }

    pub fn platform(&self) -> Platform {
        match self {
            ProviderError::Transport { platform, .. }
            | ProviderError::Auth { platform, .. }
            | ProviderError::RateLimited { platform }
            | ProviderError::QuotaExceeded { platform, .. }
            | ProviderError::Timeout { platform, .. }
            | ProviderError::MalformedResponse { platform, .. }
            | ProviderError::UpstreamError { platform, .. } => *platform,
        }
    }

    /// Map a transport-layer error from `reqwest`.
    pub fn from_reqwest(platform: Platform, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                platform,
                timeout_ms: 0,
            }
        } else {
            ProviderError::Transport {
                platform,
                message: err.to_string(),
            }
        }
    }

    /// Classify a non-2xx HTTP status. A 429 whose body mentions quota or
    /// billing is treated as exhausted quota rather than a transient
    /// throttle.
    pub fn from_status(platform: Platform, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth {
                platform,
                message: body,
            },
            429 => {
                let lower = body.to_lowercase();
                if lower.contains("quota") || lower.contains("billing") {
                    ProviderError::QuotaExceeded {
                        platform,
                        message: body,
                    }
                } else {
                    ProviderError::RateLimited { platform }
                }
            }
            _ => ProviderError::UpstreamError {
                platform,
                status,
                body,
            },
        }
    }
}

/// Convenience alias so adapters can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriability_follows_kind() {
        let retriable = ProviderError::Transport {
            platform: Platform::Chatgpt,
            message: "connection reset".into(),
        };
        assert!(retriable.retriable());

        let terminal = ProviderError::Auth {
            platform: Platform::Chatgpt,
            message: "bad key".into(),
        };
        assert!(!terminal.retriable());
    }

    #[test]
    fn status_classification() {
        let auth = ProviderError::from_status(Platform::Grok, 401, "invalid key".into());
        assert_eq!(auth.kind(), ErrorKind::Auth);

        let throttled = ProviderError::from_status(Platform::Grok, 429, "slow down".into());
        assert_eq!(throttled.kind(), ErrorKind::RateLimited);

        let quota = ProviderError::from_status(Platform::Grok, 429, "monthly quota exceeded".into());
        assert_eq!(quota.kind(), ErrorKind::QuotaExceeded);

        let upstream = ProviderError::from_status(Platform::Grok, 502, "bad gateway".into());
        assert_eq!(upstream.kind(), ErrorKind::UpstreamError);
        assert!(!upstream.retriable());
    }
}
