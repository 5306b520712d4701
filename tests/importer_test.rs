// ==========================================
// Order intake tests (CSV -> orders + windows)
// ==========================================

use delivery_window_planner::importer::{ColumnScheme, ImportError, OrderImporter};
use std::io::Write;

const CURRENT_CSV: &str = "\
externalOrderId,customerID,address,numberOfUnits,earlyEligible,deliveryWindow,priorRescheduleCount,customerTag
EXT-1,C-1,\"12 Elm St, Springfield\",14,Yes,09:00 AM 11:00 AM,0,vip
EXT-2,C-2,4 Oak Ave,6,no,11:00 AM 01:00 PM,1,
EXT-3,C-3,9 Pine Rd,20,TRUE,09:00 AM 11:00 AM,,
";

const LEGACY_CSV: &str = "\
orderID,customer_name,delivery_address,number_of_units,early_ok,delivery_window_start,delivery_window_end
L-1,Ada,1 Loop Rd,8,y,01:00 PM,03:00 PM
L-2,Grace,2 Loop Rd,12.0,0,09:00 AM,11:00 AM
";

#[test]
fn test_current_scheme_import() {
    let outcome = OrderImporter::new(80).import_str(CURRENT_CSV).unwrap();

    assert_eq!(outcome.scheme, ColumnScheme::Current);
    assert_eq!(outcome.total_rows, 3);
    assert!(outcome.batch.issues.is_empty());

    let orders = &outcome.batch.orders;
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].order_id, "EXT-1");
    assert_eq!(orders[0].address, "12 Elm St, Springfield");
    assert_eq!(orders[0].units, 14);
    assert!(orders[0].early_eligible);
    assert_eq!(orders[0].customer_tag.as_deref(), Some("vip"));
    assert_eq!(orders[0].requested_window, "09:00 AM - 11:00 AM");
    assert_eq!(orders[1].prior_reschedule_count, 1);
    assert_eq!(orders[1].customer_tag, None);
    assert!(orders[2].early_eligible);
    assert!(orders.iter().all(|o| o.final_state.is_none() && o.assigned_window.is_none()));

    let labels: Vec<&str> = outcome.batch.windows.iter().map(|w| w.window_id.as_str()).collect();
    assert_eq!(labels, vec!["09:00 AM - 11:00 AM", "11:00 AM - 01:00 PM"]);
    assert!(outcome.batch.windows.iter().all(|w| w.capacity_units == 80));
    assert!(outcome.batch.windows.iter().all(|w| w.duration_minutes() == 120));
}

#[test]
fn test_legacy_scheme_import() {
    let outcome = OrderImporter::new(60).import_str(LEGACY_CSV).unwrap();

    assert_eq!(outcome.scheme, ColumnScheme::Legacy);
    let orders = &outcome.batch.orders;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].customer_id, "Ada");
    assert!(orders[0].early_eligible);
    assert_eq!(orders[0].requested_window, "01:00 PM - 03:00 PM");
    assert_eq!(orders[1].units, 12);
    assert!(!orders[1].early_eligible);

    // windows come back chronologically regardless of row order
    let labels: Vec<&str> = outcome.batch.windows.iter().map(|w| w.window_id.as_str()).collect();
    assert_eq!(labels, vec!["09:00 AM - 11:00 AM", "01:00 PM - 03:00 PM"]);
    assert!(outcome.batch.windows.iter().all(|w| w.capacity_units == 60));
}

#[test]
fn test_import_file_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(LEGACY_CSV.as_bytes()).unwrap();

    let outcome = OrderImporter::new(80).import_file(file.path()).unwrap();
    assert_eq!(outcome.batch.orders.len(), 2);
}

#[test]
fn test_import_file_rejects_other_formats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.txt");
    std::fs::write(&path, LEGACY_CSV).unwrap();

    let err = OrderImporter::new(80).import_file(&path).unwrap_err();
    assert!(matches!(err, ImportError::UnsupportedFormat(_)));
}

#[test]
fn test_unknown_scheme_rejected() {
    let err = OrderImporter::new(80)
        .import_str("id,units\n1,5\n")
        .unwrap_err();
    assert!(matches!(err, ImportError::UnknownScheme));
}

#[test]
fn test_missing_columns_listed() {
    let err = OrderImporter::new(80)
        .import_str("externalOrderId,customerID,address\nE1,C1,1 St\n")
        .unwrap_err();
    match err {
        ImportError::MissingColumns { scheme, columns } => {
            assert_eq!(scheme, "CURRENT");
            assert!(columns.contains("numberOfUnits"));
            assert!(columns.contains("deliveryWindow"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_malformed_window_fails_with_row() {
    let csv = "\
externalOrderId,customerID,address,numberOfUnits,earlyEligible,deliveryWindow
E1,C1,1 St,5,no,09:00 AM 11:00 AM
E2,C2,2 St,5,no,morning
";
    let err = OrderImporter::new(80).import_str(csv).unwrap_err();
    assert!(matches!(err, ImportError::WindowFormatError { row: 2, .. }));
}

#[test]
fn test_invalid_rows_reported_not_dropped() {
    let csv = "\
externalOrderId,customerID,address,numberOfUnits,earlyEligible,deliveryWindow
E1,C1,1 St,5,no,09:00 AM 11:00 AM
E2,C2,,5,no,09:00 AM 11:00 AM
E3,C3,3 St,-2,no,09:00 AM 11:00 AM
E1,C4,4 St,5,no,09:00 AM 11:00 AM
E5,C5,5 St,5,no,11:00 AM 09:00 AM
";
    let outcome = OrderImporter::new(80).import_str(csv).unwrap();

    assert_eq!(outcome.total_rows, 5);
    assert_eq!(outcome.batch.orders.len(), 1);
    assert_eq!(outcome.batch.orders.len() + outcome.batch.issues.len(), outcome.total_rows);

    let rows: Vec<usize> = outcome.batch.issues.iter().map(|i| i.row_number).collect();
    assert_eq!(rows, vec![2, 3, 4, 5]);
    assert!(outcome.batch.issues[0].message.contains("address"));
    assert!(outcome.batch.issues[1].message.contains("positive integer"));
    assert!(outcome.batch.issues[2].message.contains("duplicate order id E1"));
    assert!(outcome.batch.issues[3].message.contains("not after start"));
    assert_eq!(outcome.batch.issues[3].order_id.as_deref(), Some("E5"));
}

#[test]
fn test_outcome_serializes_flat() {
    let outcome = OrderImporter::new(80).import_str(LEGACY_CSV).unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["scheme"], "LEGACY");
    assert_eq!(json["orders"].as_array().unwrap().len(), 2);
    assert_eq!(json["windows"].as_array().unwrap().len(), 2);
    assert!(json["orders"][0]["final_state"].is_null());
}
