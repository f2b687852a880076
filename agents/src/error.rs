use thiserror::Error;

/// Failures of the HTTP model and service clients.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP error calling {service}: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error
    },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String
    },

    #[error("{service} returned an unusable response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String
    },

    #[error("Configuration error: {0}")]
    Configuration(String)
}

impl AgentError {
    pub fn http(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| AgentError::Http { service, source }
    }

    pub fn invalid(service: &'static str, reason: impl ToString) -> Self {
        AgentError::InvalidResponse {
            service,
            reason: reason.to_string()
        }
    }

    /// Reads the body of a non-success response into a [`AgentError::Status`].
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        AgentError::Status {
            service,
            status,
            body
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
