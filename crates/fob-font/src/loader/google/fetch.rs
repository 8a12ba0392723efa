//! Transport for Google Fonts requests.

use async_trait::async_trait;

use crate::error::LoaderError;

/// Fetches stylesheets and font files from Google Fonts.
#[async_trait]
pub trait GoogleFontsApi: Send + Sync {
    async fn fetch_css(&self, url: &str, font_family: &str, is_dev: bool)
    -> Result<String, LoaderError>;

    async fn fetch_font_file(&self, url: &str, is_dev: bool) -> Result<Vec<u8>, LoaderError>;
}

/// A transport with no network access; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGoogleFontsApi;

#[async_trait]
impl GoogleFontsApi for OfflineGoogleFontsApi {
    async fn fetch_css(
        &self,
        url: &str,
        font_family: &str,
        _is_dev: bool,
    ) -> Result<String, LoaderError> {
        Err(LoaderError::fetch_failed(format!(
            "Failed to fetch font `{}`: {}\nNetwork access is disabled.",
            font_family, url
        )))
    }

    async fn fetch_font_file(&self, url: &str, _is_dev: bool) -> Result<Vec<u8>, LoaderError> {
        Err(LoaderError::fetch_failed(format!(
            "Failed to fetch font file {}\nNetwork access is disabled.",
            url
        )))
    }
}

#[cfg(feature = "google-fetch")]
pub use http::HttpGoogleFontsApi;

#[cfg(feature = "google-fetch")]
mod http {
    use super::*;
    use std::time::Duration;

    /// Google serves woff2 only to user agents it knows support it.
    const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/104.0.0.0 Safari/537.36";

    const ATTEMPTS: usize = 3;

    /// Requests in dev give up early so a slow network falls back quickly.
    const DEV_TIMEOUT: Duration = Duration::from_secs(3);

    /// [`GoogleFontsApi`] over HTTPS with `reqwest`.
    #[derive(Debug, Clone, Default)]
    pub struct HttpGoogleFontsApi {
        client: reqwest::Client,
    }

    impl HttpGoogleFontsApi {
        pub fn new() -> Self {
            Self::default()
        }

        async fn get(&self, url: &str, is_dev: bool) -> Result<reqwest::Response, String> {
            let mut last_error = String::new();
            for attempt in 1..=ATTEMPTS {
                let mut request = self.client.get(url).header("user-agent", USER_AGENT);
                if is_dev {
                    request = request.timeout(DEV_TIMEOUT);
                }
                match request.send().await {
                    Ok(response) if response.status().is_success() => return Ok(response),
                    Ok(response) => last_error = format!("HTTP {}", response.status().as_u16()),
                    Err(e) => last_error = e.to_string(),
                }
                tracing::debug!(url, attempt, error = %last_error, "Google Fonts request failed");
            }
            Err(last_error)
        }
    }

    #[async_trait]
    impl GoogleFontsApi for HttpGoogleFontsApi {
        async fn fetch_css(
            &self,
            url: &str,
            font_family: &str,
            is_dev: bool,
        ) -> Result<String, LoaderError> {
            let failed = |reason: String| {
                LoaderError::fetch_failed(format!(
                    "Failed to fetch font `{}`: {}\nPlease check if the network is available. ({})",
                    font_family, url, reason
                ))
            };
            let response = self.get(url, is_dev).await.map_err(failed)?;
            response.text().await.map_err(|e| failed(e.to_string()))
        }

        async fn fetch_font_file(&self, url: &str, is_dev: bool) -> Result<Vec<u8>, LoaderError> {
            let failed = |reason: String| {
                LoaderError::fetch_failed(format!("Failed to fetch font file {}: {}", url, reason))
            };
            let response = self.get(url, is_dev).await.map_err(failed)?;
            let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
            Ok(bytes.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_api_fails() {
        let api = OfflineGoogleFontsApi;
        let err = api
            .fetch_css("https://fonts.googleapis.com/css2?family=Inter", "Inter", true)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to fetch font `Inter`"));
        assert!(api.fetch_font_file("https://x/a.woff2", false).await.is_err());
    }
}
