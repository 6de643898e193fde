use crate::{user_agent, AppError, HarvestConfig, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, error};

/// Results requested per search page.
const ITEMS_ON_PAGE: u32 = 50;

/// Builds the HTTP client shared by the search and detail requests.
pub fn http_client(config: &HarvestConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.timeout())
        .gzip(true)
        .build()?;
    Ok(client)
}

/// The `SearchClient` struct queries the résumé search and collects links to the detail pages.
pub struct SearchClient {
    /// The HTTP client used for making requests.
    client: Client,
    /// The site root, without a trailing slash.
    base_url: String,
    /// Matches the title link of every search result.
    result_link: Selector,
}

impl SearchClient {
    /// Creates a new `SearchClient`.
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to send requests with.
    /// * `base_url` - The site root, e.g. `https://hh.ru`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SearchClient`, or an error if the result selector is invalid.
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        let result_link = Selector::parse(r#"a[data-qa="serp-item__title"]"#)
            .map_err(|e| AppError::ExtractionError(format!("invalid result selector: {e:?}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            result_link,
        })
    }

    /// Builds the search URL for one page of results.
    ///
    /// # Arguments
    ///
    /// * `query` - The search text.
    /// * `area` - The region code.
    /// * `page` - The zero-based page index.
    ///
    /// # Returns
    ///
    /// The full URL of the search page.
    pub fn search_url(&self, query: &str, area: u32, page: u32) -> String {
        format!(
            "{}/search/resume?text={}&area={}&exp_period=all_time&logic=normal&pos=full_text&search_period=0&items_on_page={}&page={}",
            self.base_url,
            urlencoding::encode(query),
            area,
            ITEMS_ON_PAGE,
            page
        )
    }

    /// Fetches one page of search results and returns the detail page URLs on it.
    ///
    /// Failures are logged and reported as an empty list, which callers treat as
    /// the end of the results.
    pub async fn search_page(&self, query: &str, area: u32, page: u32) -> Vec<String> {
        match self.try_search_page(query, area, page).await {
            Ok(urls) => urls,
            Err(e) => {
                error!("Search page {} request failed: {}", page, e);
                Vec::new()
            }
        }
    }

    async fn try_search_page(&self, query: &str, area: u32, page: u32) -> Result<Vec<String>> {
        let url = self.search_url(query, area, page);
        debug!("Search URL: {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, user_agent::random())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "ru-RU,ru;q=0.9,en;q=0.5")
            .send()
            .await?
            .error_for_status()?;

        debug!("Response status: {}", response.status());
        let html = response.text().await?;

        Ok(self.extract_urls(&html))
    }

    /// Extracts the result links from a search page, in page order.
    ///
    /// # Arguments
    ///
    /// * `html` - The HTML of the search page.
    ///
    /// # Returns
    ///
    /// Absolute URLs with their query strings removed.
    pub fn extract_urls(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        document
            .select(&self.result_link)
            .filter_map(|link| link.value().attr("href"))
            .map(|href| self.clean_url(href))
            .collect()
    }

    /// Drops the query string and makes relative links absolute.
    fn clean_url(&self, href: &str) -> String {
        let path = href.split('?').next().unwrap_or(href);

        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with("//") {
            let scheme = self.base_url.split_once("://").map_or("https", |(scheme, _)| scheme);
            format!("{scheme}:{path}")
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
