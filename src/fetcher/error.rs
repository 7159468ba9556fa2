use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid provider endpoint '{0}'")]
    InvalidEndpoint(String, #[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    Upstream(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    UpstreamStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Window of {0} hours is outside the supported range 1..={max}", max = crate::fetcher::MAX_WINDOW_HOURS)]
    WindowOutOfRange(usize),

    #[error("Response from {url} does not have the expected hourly shape")]
    DataShape {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// True for failures to reach the provider or non-success responses.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FetchError::Upstream(..) | FetchError::UpstreamStatus { .. }
        )
    }

    pub fn is_data_shape(&self) -> bool {
        matches!(self, FetchError::DataShape { .. })
    }
}
