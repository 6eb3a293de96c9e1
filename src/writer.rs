//! Output tables for fit results.
//!
//! Writes the tidy table as a SNANA-style FITRES file and/or a CSV file,
//! both with floats in `%.6G` form and a one-line provenance comment, and
//! reads either format back into a DataFrame.

use crate::config::OutputFormat;
use crate::constants::{
    FITRES_ROW_MARKER, FITRES_VARNAMES, OUTPUT_SIG_FIGS, TOOL_NAME, TOOL_VERSION,
};
use crate::error::{LcError, Result};
use crate::format::format_g;
use polars::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FITRES_EXTENSION: &str = ".FITRES";
const CSV_EXTENSION: &str = ".csv";

/// Writes one tidy table to `<stem>.FITRES` and/or `<stem>.csv`
#[derive(Debug)]
pub struct TableWriter {
    stem: PathBuf,
    format: OutputFormat,
}

impl TableWriter {
    pub fn new(stem: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            stem: stem.into(),
            format,
        }
    }

    /// Path written for `extension`, e.g. `out/bazin` + `.csv`
    fn path_with(&self, extension: &str) -> PathBuf {
        let mut name: OsString = self.stem.clone().into_os_string();
        name.push(extension);
        PathBuf::from(name)
    }

    /// Write every requested format and return the paths written
    pub fn write(&self, df: &DataFrame) -> Result<Vec<PathBuf>> {
        // Render everything first so a bad column type leaves no partial files
        let mut outputs = Vec::new();
        if self.format.writes_fitres() {
            outputs.push((self.path_with(FITRES_EXTENSION), render_fitres(df)?));
        }
        if self.format.writes_csv() {
            outputs.push((self.path_with(CSV_EXTENSION), render_csv(df)?));
        }

        if let Some(parent) = self.stem.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut written = Vec::with_capacity(outputs.len());
        for (path, content) in outputs {
            std::fs::write(&path, content)?;
            info!("Wrote {} rows to {}", df.height(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Write `df` next to `stem` in `format`
pub fn save_fits(df: &DataFrame, stem: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    TableWriter::new(stem, format).write(df)
}

fn provenance() -> String {
    format!("# Made with {TOOL_NAME} {TOOL_VERSION}")
}

/// Field delimiter and line markers of one table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Fitres,
    Csv,
}

impl Layout {
    /// FITRES headers open with `VARNAMES:`; anything else is read as CSV
    fn of_header(line: &str) -> Self {
        if line.starts_with(FITRES_VARNAMES) {
            Layout::Fitres
        } else {
            Layout::Csv
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            Layout::Fitres => b' ',
            Layout::Csv => b',',
        }
    }

    fn header_marker(self) -> Option<&'static str> {
        match self {
            Layout::Fitres => Some(FITRES_VARNAMES),
            Layout::Csv => None,
        }
    }

    fn row_marker(self) -> Option<&'static str> {
        match self {
            Layout::Fitres => Some(FITRES_ROW_MARKER),
            Layout::Csv => None,
        }
    }

    /// Leading marker fields on every line
    fn marker_fields(self) -> usize {
        usize::from(self.row_marker().is_some())
    }
}

fn render_fitres(df: &DataFrame) -> Result<Vec<u8>> {
    render(df, Layout::Fitres)
}

fn render_csv(df: &DataFrame) -> Result<Vec<u8>> {
    render(df, Layout::Csv)
}

/// Provenance line, then header and rows quoted only where a field needs it
fn render(df: &DataFrame, layout: Layout) -> Result<Vec<u8>> {
    let cells = render_cells(df)?;

    let mut buffer = provenance().into_bytes();
    buffer.push(b'\n');

    let mut writer = csv::WriterBuilder::new()
        .delimiter(layout.delimiter())
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buffer);

    let names = df.get_column_names().into_iter().map(|n| n.as_str());
    writer.write_record(layout.header_marker().into_iter().chain(names))?;
    for row in &cells {
        let fields = row.iter().map(String::as_str);
        writer.write_record(layout.row_marker().into_iter().chain(fields))?;
    }

    writer.into_inner().map_err(|e| LcError::Io(e.into_error()))
}

/// Row-major text of every cell; nulls are empty
fn render_cells(df: &DataFrame) -> Result<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = (0..df.height())
        .map(|_| Vec::with_capacity(df.width()))
        .collect();

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        match series.dtype() {
            DataType::Float64 => {
                for (row, value) in rows.iter_mut().zip(series.f64()?) {
                    row.push(value.map_or_else(String::new, |v| format_g(v, OUTPUT_SIG_FIGS)));
                }
            }
            DataType::Int64 => {
                for (row, value) in rows.iter_mut().zip(series.i64()?) {
                    row.push(value.map_or_else(String::new, |v| v.to_string()));
                }
            }
            DataType::Boolean => {
                for (row, value) in rows.iter_mut().zip(series.bool()?) {
                    row.push(value.map_or_else(String::new, |v| v.to_string()));
                }
            }
            DataType::String => {
                for (row, value) in rows.iter_mut().zip(series.str()?) {
                    row.push(value.unwrap_or_default().to_string());
                }
            }
            other => {
                return Err(LcError::data_validation(format!(
                    "column {} has unsupported type {other} for table output",
                    column.name()
                )));
            }
        }
    }
    Ok(rows)
}

/// Read a FITRES or CSV table written by [`save_fits`].
///
/// Lines starting with `#` are skipped. Columns whose values all parse as
/// integers become Int64, then Float64, otherwise String; empty cells are
/// null.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LcError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => LcError::Io(e),
    })?;

    let layout = text
        .lines()
        .find(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(Layout::of_header)
        .ok_or_else(|| LcError::invalid_format(path, "table has no header line"))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter())
        .comment(Some(b'#'))
        .has_headers(true)
        .from_reader(text.as_bytes());

    let names: Vec<String> = reader
        .headers()
        .map_err(|e| LcError::invalid_format(path, format!("failed to read header: {e}")))?
        .iter()
        .skip(layout.marker_fields())
        .map(str::to_string)
        .collect();

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    for (number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            LcError::invalid_format(path, format!("data line {}: {e}", number + 1))
        })?;
        if let Some(marker) = layout.row_marker() {
            if record.get(0) != Some(marker) {
                return Err(LcError::invalid_format(
                    path,
                    format!("data line {} does not start with {marker}", number + 1),
                ));
            }
        }
        let fields = record.iter().skip(layout.marker_fields());
        for (column, field) in values.iter_mut().zip(fields) {
            column.push((!field.is_empty()).then(|| field.to_string()));
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(values)
        .map(|(name, cells)| typed_column(name, cells))
        .collect();

    debug!("Read {} columns from {}", columns.len(), path.display());
    Ok(DataFrame::new(columns)?)
}

fn typed_column(name: &str, cells: Vec<Option<String>>) -> Column {
    let present = || cells.iter().flatten();

    if present().next().is_some() && present().all(|v| v.parse::<i64>().is_ok()) {
        let parsed: Vec<Option<i64>> = cells
            .iter()
            .map(|c| c.as_ref().and_then(|v| v.parse().ok()))
            .collect();
        return Column::new(name.into(), parsed);
    }
    if present().next().is_some() && present().all(|v| v.parse::<f64>().is_ok()) {
        let parsed: Vec<Option<f64>> = cells
            .iter()
            .map(|c| c.as_ref().and_then(|v| v.parse().ok()))
            .collect();
        return Column::new(name.into(), parsed);
    }
    Column::new(name.into(), cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Column::new("SNID".into(), vec![Some("1001"), Some("1003")]),
            Column::new("IAUC".into(), vec![Some("SN 2023abc"), None]),
            Column::new("NOTE".into(), vec![Some("a,\"b\""), Some("plain")]),
            Column::new("BAZIN_z".into(), vec![Some(0.1234567), Some(f64::NAN)]),
            Column::new("BAZIN_t0".into(), vec![60100.123456, 1.0e-7]),
            Column::new("BAZIN_NOBS".into(), vec![14i64, 9]),
        ])
        .unwrap()
    }

    fn cell_text(df: &DataFrame) -> Vec<Vec<String>> {
        render_cells(df).unwrap()
    }

    fn text_lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_fitres_layout() {
        let lines = text_lines(&render_fitres(&sample()).unwrap());

        assert_eq!(lines[0], format!("# Made with {TOOL_NAME} {TOOL_VERSION}"));
        assert_eq!(lines[1], "VARNAMES: SNID IAUC NOTE BAZIN_z BAZIN_t0 BAZIN_NOBS");
        assert_eq!(
            lines[2],
            "SN: 1001 \"SN 2023abc\" \"a,\"\"b\"\"\" 0.123457 60100.1 14"
        );
        assert_eq!(lines[3], "SN: 1003  plain NAN 1E-07 9");
    }

    #[test]
    fn test_csv_layout() {
        let lines = text_lines(&render_csv(&sample()).unwrap());

        assert_eq!(lines[1], "SNID,IAUC,NOTE,BAZIN_z,BAZIN_t0,BAZIN_NOBS");
        assert_eq!(lines[2], "1001,SN 2023abc,\"a,\"\"b\"\"\",0.123457,60100.1,14");
        assert_eq!(lines[3], "1003,,plain,NAN,1E-07,9");
    }

    #[test]
    fn test_embedded_quotes_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let iauc = ["SN \"A\" 1", "\"B\""];
        let df = DataFrame::new(vec![
            Column::new("SNID".into(), vec!["1", "2"]),
            Column::new("IAUC".into(), iauc.to_vec()),
        ])
        .unwrap();

        let paths = save_fits(&df, &temp_dir.path().join("bazin"), OutputFormat::Both).unwrap();

        let fitres = std::fs::read_to_string(&paths[0]).unwrap();
        let rows: Vec<&str> = fitres.lines().skip(2).collect();
        assert_eq!(rows, vec!["SN: 1 \"SN \"\"A\"\" 1\"", "SN: 2 \"\"\"B\"\"\""]);

        for path in &paths {
            let back = read_table(path).unwrap();
            let column = back.column("IAUC").unwrap();
            let values: Vec<Option<&str>> = column.str().unwrap().iter().collect();
            assert_eq!(values, vec![Some(iauc[0]), Some(iauc[1])], "{}", path.display());
        }
    }

    #[test]
    fn test_ragged_row_is_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bazin.FITRES");
        std::fs::write(&path, "# Made with LCFIT\nVARNAMES: SNID BAZIN_z\nSN: 1\n").unwrap();

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, LcError::InvalidFormat { .. }), "{err:?}");
    }

    #[test]
    fn test_fitres_row_without_marker_is_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bazin.FITRES");
        std::fs::write(&path, "VARNAMES: SNID BAZIN_z\nROW: 1 0.5\n").unwrap();

        match read_table(&path) {
            Err(LcError::InvalidFormat { reason, .. }) => assert!(reason.contains("SN:")),
            other => panic!("Expected invalid format, got {other:?}"),
        }
    }

    #[test]
    fn test_both_formats_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let stem = temp_dir.path().join("nested").join("bazin");
        let df = sample();

        let paths = save_fits(&df, &stem, OutputFormat::Both).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].to_string_lossy().ends_with("bazin.FITRES"));
        assert!(paths[1].to_string_lossy().ends_with("bazin.csv"));

        for path in &paths {
            let back = read_table(path).unwrap();
            assert_eq!(back.get_column_names(), df.get_column_names());
            assert_eq!(cell_text(&back), cell_text(&df), "{}", path.display());
        }
    }

    #[test]
    fn test_single_format() {
        let temp_dir = TempDir::new().unwrap();
        let stem = temp_dir.path().join("salt");

        let paths = save_fits(&sample(), &stem, OutputFormat::Csv).unwrap();
        assert_eq!(paths, vec![temp_dir.path().join("salt.csv")]);
        assert!(!temp_dir.path().join("salt.FITRES").exists());
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let temp_dir = TempDir::new().unwrap();
        let df = DataFrame::new(vec![Column::new("SNID".into(), Vec::<Option<String>>::new())])
            .unwrap();

        let paths = save_fits(&df, &temp_dir.path().join("bazin"), OutputFormat::Fitres).unwrap();
        let text = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(text.lines().count(), 2);

        let back = read_table(&paths[0]).unwrap();
        assert_eq!(back.height(), 0);
        assert_eq!(back.width(), 1);
    }

    #[test]
    fn test_read_missing_table() {
        let err = read_table(Path::new("/nonexistent/bazin.FITRES")).unwrap_err();
        assert!(matches!(err, LcError::FileNotFound { .. }));
    }
}
