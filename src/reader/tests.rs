use super::*;
use crate::fits::{BinTableWriter, ColumnData};
use crate::models::MetaValue;
use crate::simulate::{SyntheticObject, write_survey};
use tempfile::TempDir;

fn survey(temp_dir: &TempDir) -> ArchivePair {
    write_survey(
        temp_dir.path(),
        "TEST_FITS",
        &[
            SyntheticObject::bright("1001", 0.12),
            SyntheticObject::faint("1002", 0.3),
            SyntheticObject::bright("1003", 0.45).with_bands(&["r ", "z "]),
        ],
    )
    .unwrap()
}

#[test]
fn test_reads_every_record_in_file_order() {
    let temp_dir = TempDir::new().unwrap();
    survey(&temp_dir);

    let records = read_data(temp_dir.path(), Some("TEST_FITS".to_string()), 0).unwrap();
    let snids: Vec<String> = records.iter().map(|r| r.meta.snid()).collect();
    assert_eq!(snids, vec!["1001", "1002", "1003"]);

    assert_eq!(records[0].observations.len(), 27);
    assert_eq!(records[2].observations.len(), 18);
    assert_eq!(records[2].observations[1].band, "z ");
    assert!((records[0].meta.redshift() - 0.12).abs() < 1e-6);
}

#[test]
fn test_max_sn_limits_records() {
    let temp_dir = TempDir::new().unwrap();
    survey(&temp_dir);

    let records = read_data(temp_dir.path(), None, 2).unwrap();
    assert_eq!(records.len(), 2);

    let records = read_data(temp_dir.path(), None, 100).unwrap();
    assert_eq!(records.len(), 3);
}

#[test]
fn test_metadata_keeps_raw_bytes_and_skips_pointers() {
    let temp_dir = TempDir::new().unwrap();
    survey(&temp_dir);

    let records = read_data(temp_dir.path(), None, 1).unwrap();
    let meta = &records[0].meta;

    match meta.get(columns::SNID) {
        Some(MetaValue::Bytes(bytes)) => assert_eq!(bytes.len(), 16),
        other => panic!("expected padded bytes, got {other:?}"),
    }
    assert_eq!(
        meta.get(columns::SUBSURVEY).map(MetaValue::to_text).as_deref(),
        Some("WFD")
    );
    assert!(meta.get(columns::PTROBS_MIN).is_none());
    assert!(meta.get(columns::PTROBS_MAX).is_none());
}

#[test]
fn test_missing_photometry_archive() {
    let temp_dir = TempDir::new().unwrap();
    let pair = survey(&temp_dir);
    std::fs::remove_file(&pair.phot).unwrap();

    let err = read_data(temp_dir.path(), Some("TEST_FITS".to_string()), 0).unwrap_err();
    assert!(matches!(err, LcError::FileNotFound { .. }));
}

#[test]
fn test_missing_required_column() {
    let temp_dir = TempDir::new().unwrap();
    let pair = survey(&temp_dir);

    // Header without REDSHIFT_FINAL
    BinTableWriter::new()
        .column(
            columns::SNID,
            ColumnData::Text {
                width: 8,
                values: vec!["1".to_string()],
            },
        )
        .column(columns::PTROBS_MIN, ColumnData::Int(vec![1]))
        .column(columns::PTROBS_MAX, ColumnData::Int(vec![1]))
        .write(&pair.head)
        .unwrap();

    let err = SnanaReader::from_pair(pair).read(0).unwrap_err();
    match err {
        LcError::MissingColumn { column, .. } => assert_eq!(column, columns::REDSHIFT_FINAL),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_pointer_past_end_of_photometry() {
    let temp_dir = TempDir::new().unwrap();
    let pair = survey(&temp_dir);

    BinTableWriter::new()
        .column(
            columns::SNID,
            ColumnData::Text {
                width: 8,
                values: vec!["1".to_string()],
            },
        )
        .column(columns::REDSHIFT_FINAL, ColumnData::Float(vec![0.1]))
        .column(columns::PTROBS_MIN, ColumnData::Int(vec![1]))
        .column(columns::PTROBS_MAX, ColumnData::Int(vec![10_000]))
        .write(&pair.head)
        .unwrap();

    let err = SnanaReader::from_pair(pair).read(0).unwrap_err();
    assert!(matches!(err, LcError::InvalidFormat { .. }));
}

#[test]
fn test_empty_pointer_range_gives_no_observations() {
    let temp_dir = TempDir::new().unwrap();
    let pair = survey(&temp_dir);

    BinTableWriter::new()
        .column(
            columns::SNID,
            ColumnData::Text {
                width: 8,
                values: vec!["1".to_string()],
            },
        )
        .column(columns::REDSHIFT_FINAL, ColumnData::Float(vec![0.1]))
        .column(columns::PTROBS_MIN, ColumnData::Int(vec![5]))
        .column(columns::PTROBS_MAX, ColumnData::Int(vec![4]))
        .write(&pair.head)
        .unwrap();

    let records = SnanaReader::from_pair(pair).read(0).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].observations.is_empty());
}
