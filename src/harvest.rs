use crate::dataset::DatasetWriter;
use crate::extractor::ResumeExtractor;
use crate::fetcher::DetailFetcher;
use crate::search::{http_client, SearchClient};
use crate::{HarvestConfig, ResumeRecord, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

/// The `Harvester` runs a whole harvest: search pages, résumé pages, dataset.
///
/// Requests are made one at a time, in page order.
pub struct Harvester {
    /// The settings of the run.
    config: HarvestConfig,
    search: SearchClient,
    fetcher: DetailFetcher,
    writer: DatasetWriter,
    /// The progress display of the run.
    progress: MultiProgress,
}

impl Harvester {
    /// Creates a new `Harvester` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The settings of the run.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Harvester`, or an error if the HTTP client or the
    /// selectors could not be built.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let client = http_client(&config)?;
        let search = SearchClient::new(client.clone(), &config.base_url)?;
        let fetcher = DetailFetcher::new(client, ResumeExtractor::new()?);
        let writer = DatasetWriter::new(config.output_dir.clone());

        Ok(Self {
            config,
            search,
            fetcher,
            writer,
            progress: MultiProgress::new(),
        })
    }

    /// Collects the records of every résumé found on the configured search pages.
    ///
    /// Stops early at the first search page without results. Résumé pages that fail
    /// are skipped.
    pub async fn collect(&self) -> Vec<ResumeRecord> {
        let HarvestConfig {
            query, area, pages, ..
        } = &self.config;
        info!("Harvesting resumes for '{}' in area {}", query, area);

        let mut records = Vec::new();

        for page in 0..*pages {
            let search_pb = self.progress.add(ProgressBar::new_spinner());
            search_pb.set_style(spinner_style());
            search_pb.set_message(format!("Searching page {}...", page + 1));

            let urls = self.search.search_page(query, *area, page).await;
            search_pb.finish_and_clear();

            if urls.is_empty() {
                info!("No resume links found on page {}", page + 1);
                break;
            }
            info!("Found {} resumes on page {}", urls.len(), page + 1);

            let fetch_pb = self.progress.add(ProgressBar::new(urls.len() as u64));
            fetch_pb.set_style(bar_style());

            for url in &urls {
                fetch_pb.set_message(url.clone());
                if let Some(record) = self.fetcher.fetch(url).await {
                    info!("+ processed: {} | {}", record.full_name, record.desired_position);
                    records.push(record);
                }
                fetch_pb.inc(1);
            }

            fetch_pb.finish_with_message(format!("Page {} done", page + 1));
        }

        info!("Harvest finished with {} resumes", records.len());
        records
    }

    /// Runs the harvest and saves the dataset.
    ///
    /// # Returns
    ///
    /// The path of the written dataset, or `None` when nothing was harvested.
    pub async fn run(&self) -> Result<Option<PathBuf>> {
        let records = self.collect().await;
        self.writer.save(&records, &self.config.query, self.config.area)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
