// ==========================================
// Delivery Window Planner - order importer
// ==========================================
// Flow: parse file -> detect scheme -> map rows -> normalize
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{ColumnScheme, FieldMapper};
use crate::importer::file_parser::{CsvParser, FileParser, ParsedSheet};
use crate::importer::order_normalizer::{NormalizedBatch, OrderNormalizer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub scheme: ColumnScheme,
    pub total_rows: usize,
    #[serde(flatten)]
    pub batch: NormalizedBatch,
}

pub struct OrderImporter {
    parser: CsvParser,
    mapper: FieldMapper,
    normalizer: OrderNormalizer,
}

impl OrderImporter {
    pub fn new(default_capacity: u32) -> Self {
        Self {
            parser: CsvParser,
            mapper: FieldMapper,
            normalizer: OrderNormalizer::new(default_capacity),
        }
    }

    #[instrument(skip(self, file_path), fields(file = %file_path.as_ref().display()))]
    pub fn import_file(&self, file_path: impl AsRef<Path>) -> ImportResult<ImportOutcome> {
        let sheet = self.parser.parse_to_raw_records(file_path.as_ref())?;
        self.import_sheet(sheet)
    }

    pub fn import_str(&self, csv_text: &str) -> ImportResult<ImportOutcome> {
        let sheet = self.parser.parse_reader(csv_text.as_bytes())?;
        self.import_sheet(sheet)
    }

    fn import_sheet(&self, sheet: ParsedSheet) -> ImportResult<ImportOutcome> {
        let scheme = self.mapper.detect_scheme(&sheet.headers)?;
        let total_rows = sheet.rows.len();
        info!(scheme = %scheme, total_rows, "order file parsed");

        let mut records = Vec::with_capacity(total_rows);
        for (idx, row) in sheet.rows.iter().enumerate() {
            records.push(self.mapper.map_to_raw_order(scheme, row, idx + 1)?);
        }

        let batch = self.normalizer.normalize(records);
        info!(
            accepted = batch.orders.len(),
            rejected = batch.issues.len(),
            windows = batch.windows.len(),
            "order intake complete"
        );

        Ok(ImportOutcome {
            scheme,
            total_rows,
            batch,
        })
    }
}
