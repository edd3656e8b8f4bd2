//! Run configuration declared in the query header.
//!
//! ```text
//! SET OUTPUT FOLDER "./out";
//! SET CONNECTION "ws://localhost:8546";
//! SET EMISSION MODE BATCH;
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ast::{Document, Setting};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionMode {
    /// Flush every sink after each written record.
    #[default]
    Streaming,
    /// Buffer records and flush once the run ends.
    Batch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub output_folder: Option<PathBuf>,
    pub connection: Option<String>,
    pub emission_mode: EmissionMode,
}

impl QueryConfig {
    /// Later settings override earlier ones.
    pub fn from_document(document: &Document) -> Self {
        let mut config = QueryConfig::default();
        for setting in &document.settings {
            match setting {
                Setting::OutputFolder { path, .. } => {
                    config.output_folder = Some(PathBuf::from(path));
                }
                Setting::Connection { url, .. } => config.connection = Some(url.clone()),
                Setting::EmissionMode { mode, .. } => config.emission_mode = *mode,
            }
        }
        config
    }

    pub fn with_output_folder(mut self, folder: Option<PathBuf>) -> Self {
        if folder.is_some() {
            self.output_folder = folder;
        }
        self
    }
}
