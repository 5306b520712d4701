// ==========================================
// Shared integration-test helpers
// ==========================================
#![allow(dead_code)]

pub mod mock_router;
pub mod test_data_builder;
