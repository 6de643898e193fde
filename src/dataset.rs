use crate::slug::dataset_file_name;
use crate::{ResumeRecord, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// The `DatasetWriter` saves harvested records as one CSV file per query and region.
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The path the dataset for `query` and `area` is written to.
    pub fn file_path(&self, query: &str, area: u32) -> PathBuf {
        self.output_dir.join(dataset_file_name(query, area))
    }

    /// Writes the records, in order, replacing any previous file for the same query and region.
    ///
    /// The header row comes from the first record; every row has the same columns.
    ///
    /// # Arguments
    ///
    /// * `records` - The harvested records.
    /// * `query` - The search query the records were harvested for.
    /// * `area` - The region code of the search.
    ///
    /// # Returns
    ///
    /// `Ok(None)` without touching the filesystem when there is nothing to save,
    /// otherwise the path of the written file.
    pub fn save(&self, records: &[ResumeRecord], query: &str, area: u32) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            info!("Nothing to save");
            return Ok(None);
        }

        self.ensure_output_dir()?;

        let path = self.file_path(query, area);
        if let Err(e) = write_records(&path, records) {
            error!("Failed to write {}: {}", path.display(), e);
            return Err(e);
        }

        info!("Saved {} records to {}", records.len(), path.display());
        Ok(Some(path))
    }

    fn ensure_output_dir(&self) -> Result<()> {
        if self.output_dir.is_dir() {
            return Ok(());
        }

        match fs::create_dir_all(&self.output_dir) {
            Ok(()) => {
                info!("Created directory {}", self.output_dir.display());
                Ok(())
            }
            Err(e) => {
                error!("Failed to create directory {}: {}", self.output_dir.display(), e);
                Err(e.into())
            }
        }
    }
}

fn write_records(path: &Path, records: &[ResumeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
