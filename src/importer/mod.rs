// ==========================================
// Delivery Window Planner - import layer
// ==========================================
// Responsibility: order CSV -> canonical Orders and Windows
// ==========================================

pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod order_importer;
pub mod order_normalizer;

pub use error::{ImportError, ImportResult};
pub use field_mapper::{ColumnScheme, FieldMapper};
pub use file_parser::{CsvParser, FileParser, ParsedSheet};
pub use order_importer::{ImportOutcome, OrderImporter};
pub use order_normalizer::{NormalizedBatch, OrderNormalizer, ValidationIssue};
