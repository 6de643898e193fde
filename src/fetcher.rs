use crate::extractor::ResumeExtractor;
use crate::{user_agent, ResumeRecord, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tracing::{debug, error, instrument};

/// The `DetailFetcher` downloads single résumé pages and turns them into records.
pub struct DetailFetcher {
    /// The HTTP client used for making requests.
    client: Client,
    /// Maps a page to a `ResumeRecord`.
    extractor: ResumeExtractor,
}

impl DetailFetcher {
    /// Creates a new `DetailFetcher`.
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client shared with the search requests.
    /// * `extractor` - The rule table applied to every fetched page.
    pub fn new(client: Client, extractor: ResumeExtractor) -> Self {
        Self { client, extractor }
    }

    /// Fetches and extracts one résumé page.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL of the résumé page.
    ///
    /// # Returns
    ///
    /// The extracted record, or `None` if the page could not be fetched or read.
    /// The failure is logged; there is no retry.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Option<ResumeRecord> {
        match self.try_fetch(url).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!("Failed to parse resume page {}: {}", url, e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<ResumeRecord> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent::random())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "ru-RU,ru;q=0.9,en;q=0.5")
            .send()
            .await?
            .error_for_status()?;

        let html = response.text().await?;
        debug!("Fetched {} bytes", html.len());

        Ok(self.extractor.extract(&html, url))
    }
}
