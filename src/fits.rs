//! FITS binary-table codec.
//!
//! SNANA survey archives are FITS files holding an empty primary HDU followed
//! by one `BINTABLE` extension, usually gzip-compressed. This module reads the
//! first binary table of such a file into memory and can write the same
//! layout back out. Only the fixed-width column types found in survey
//! archives are supported (`L`, `B`, `I`, `J`, `K`, `E`, `D`, `A`); heap
//! (variable-length) columns are rejected.

use crate::error::{LcError, Result};
use crate::models::MetaValue;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// FITS logical record size
pub const BLOCK_SIZE: usize = 2880;

/// Header card size
pub const CARD_SIZE: usize = 80;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A single decoded table cell
#[derive(Debug, Clone, PartialEq)]
pub enum FitsValue {
    Text(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FitsValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FitsValue::Int(v) => Some(*v as f64),
            FitsValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FitsValue::Int(v) => Some(*v),
            FitsValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Character data with NUL padding removed; trailing spaces are kept
    pub fn as_text(&self) -> Option<String> {
        match self {
            FitsValue::Text(bytes) => {
                Some(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string())
            }
            _ => None,
        }
    }
}

impl From<FitsValue> for MetaValue {
    fn from(value: FitsValue) -> Self {
        match value {
            FitsValue::Text(bytes) => MetaValue::Bytes(bytes),
            FitsValue::Int(v) => MetaValue::Int(v),
            FitsValue::Float(v) => MetaValue::Float(v),
            FitsValue::Bool(v) => MetaValue::Bool(v),
        }
    }
}

/// Binary-table column storage types (`TFORMn` letter codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Logical,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
}

impl ColumnKind {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'L' => Some(ColumnKind::Logical),
            'B' => Some(ColumnKind::Byte),
            'I' => Some(ColumnKind::Short),
            'J' => Some(ColumnKind::Int),
            'K' => Some(ColumnKind::Long),
            'E' => Some(ColumnKind::Float),
            'D' => Some(ColumnKind::Double),
            'A' => Some(ColumnKind::Text),
            _ => None,
        }
    }

    fn code(&self) -> char {
        match self {
            ColumnKind::Logical => 'L',
            ColumnKind::Byte => 'B',
            ColumnKind::Short => 'I',
            ColumnKind::Int => 'J',
            ColumnKind::Long => 'K',
            ColumnKind::Float => 'E',
            ColumnKind::Double => 'D',
            ColumnKind::Text => 'A',
        }
    }

    fn element_size(&self) -> usize {
        match self {
            ColumnKind::Logical | ColumnKind::Byte | ColumnKind::Text => 1,
            ColumnKind::Short => 2,
            ColumnKind::Int | ColumnKind::Float => 4,
            ColumnKind::Long | ColumnKind::Double => 8,
        }
    }
}

/// Layout of one table column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub repeat: usize,
    /// Byte offset inside a row
    pub offset: usize,
    pub scale: f64,
    pub zero: f64,
}

impl ColumnDef {
    pub fn width(&self) -> usize {
        self.kind.element_size() * self.repeat
    }

    /// Text columns are always scalar; numeric ones only with repeat 1
    pub fn is_scalar(&self) -> bool {
        self.kind == ColumnKind::Text || self.repeat == 1
    }

    fn is_scaled(&self) -> bool {
        self.scale != 1.0 || self.zero != 0.0
    }
}

/// Parsed header keywords of one HDU, in file order
#[derive(Debug, Clone, Default)]
struct Header {
    cards: Vec<(String, String)>,
}

impl Header {
    fn get(&self, key: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_int(&self, key: &str, path: &Path) -> Result<i64> {
        let raw = self
            .get(key)
            .ok_or_else(|| LcError::invalid_format(path, format!("missing {key} keyword")))?;
        raw.parse::<i64>().map_err(|_| {
            LcError::invalid_format(path, format!("{key} is not an integer: '{raw}'"))
        })
    }

    fn get_float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.replace('D', "E").parse::<f64>().ok())
            .unwrap_or(default)
    }
}

/// An in-memory FITS binary table
#[derive(Debug, Clone)]
pub struct BinTable {
    path: PathBuf,
    columns: Vec<ColumnDef>,
    row_len: usize,
    nrows: usize,
    data: Vec<u8>,
}

impl BinTable {
    /// Read the first binary table of a (possibly gzip-compressed) FITS file
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LcError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut raw = Vec::new();
        File::open(path)?.read_to_end(&mut raw)?;

        let bytes = if raw.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut inflated)?;
            inflated
        } else {
            raw
        };

        Self::parse(&bytes, path)
    }

    /// Parse an uncompressed FITS byte stream
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let mut position = 0;
        let mut hdu_index = 0;

        while position < bytes.len() {
            let (header, header_len) = parse_header(&bytes[position..], path)?;
            position += header_len;

            let is_bintable = hdu_index > 0 && header.get("XTENSION") == Some("BINTABLE");
            let data_len = data_size(&header, path)?;

            if is_bintable {
                let end = position + data_len;
                if end > bytes.len() {
                    return Err(LcError::invalid_format(path, "binary table data is truncated"));
                }
                let table = Self::from_header(&header, &bytes[position..end], path)?;
                debug!(
                    "Read binary table from {}: {} rows, {} columns",
                    path.display(),
                    table.nrows,
                    table.columns.len()
                );
                return Ok(table);
            }

            position += padded(data_len);
            hdu_index += 1;
        }

        Err(LcError::invalid_format(path, "no BINTABLE extension found"))
    }

    fn from_header(header: &Header, data: &[u8], path: &Path) -> Result<Self> {
        let row_len = header.get_int("NAXIS1", path)? as usize;
        let nrows = header.get_int("NAXIS2", path)? as usize;
        let tfields = header.get_int("TFIELDS", path)? as usize;

        let mut columns = Vec::with_capacity(tfields);
        let mut offset = 0;
        for n in 1..=tfields {
            let name = header
                .get(&format!("TTYPE{n}"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| format!("COL{n}"));
            let tform = header
                .get(&format!("TFORM{n}"))
                .ok_or_else(|| LcError::invalid_format(path, format!("missing TFORM{n}")))?;
            let (repeat, kind) = parse_tform(tform).ok_or_else(|| {
                LcError::invalid_format(
                    path,
                    format!("unsupported column format '{tform}' for column {name}"),
                )
            })?;

            let column = ColumnDef {
                name,
                kind,
                repeat,
                offset,
                scale: header.get_float_or(&format!("TSCAL{n}"), 1.0),
                zero: header.get_float_or(&format!("TZERO{n}"), 0.0),
            };
            offset += column.width();
            columns.push(column);
        }

        if offset != row_len {
            return Err(LcError::invalid_format(
                path,
                format!("column widths sum to {offset} bytes but NAXIS1 is {row_len}"),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            row_len,
            nrows,
            data: data[..row_len * nrows].to_vec(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of a column that must exist
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| LcError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
        })
    }

    /// Decode one scalar cell
    pub fn value(&self, row: usize, column: usize) -> Result<FitsValue> {
        if row >= self.nrows {
            return Err(LcError::invalid_format(
                &self.path,
                format!("row {row} out of range ({} rows)", self.nrows),
            ));
        }
        let def = &self.columns[column];
        if !def.is_scalar() {
            return Err(LcError::invalid_format(
                &self.path,
                format!("vector column {} is not supported", def.name),
            ));
        }

        let start = row * self.row_len + def.offset;
        let cell = &self.data[start..start + def.width()];

        let value = match def.kind {
            ColumnKind::Text => FitsValue::Text(cell.to_vec()),
            ColumnKind::Logical => FitsValue::Bool(cell[0] == b'T'),
            ColumnKind::Byte => FitsValue::Int(cell[0] as i64),
            ColumnKind::Short => FitsValue::Int(i16::from_be_bytes([cell[0], cell[1]]) as i64),
            ColumnKind::Int => FitsValue::Int(i32::from_be_bytes(array(cell)) as i64),
            ColumnKind::Long => FitsValue::Int(i64::from_be_bytes(array(cell))),
            ColumnKind::Float => FitsValue::Float(f32::from_be_bytes(array(cell)) as f64),
            ColumnKind::Double => FitsValue::Float(f64::from_be_bytes(array(cell))),
        };

        Ok(apply_scaling(def, value))
    }

    /// Decode one scalar cell by column name
    pub fn value_by_name(&self, row: usize, name: &str) -> Result<FitsValue> {
        let column = self.require_column(name)?;
        self.value(row, column)
    }
}

fn apply_scaling(def: &ColumnDef, value: FitsValue) -> FitsValue {
    if !def.is_scaled() {
        return value;
    }
    match value {
        FitsValue::Int(v) if def.scale == 1.0 && def.zero.fract() == 0.0 => {
            FitsValue::Int(v + def.zero as i64)
        }
        FitsValue::Int(v) => FitsValue::Float(v as f64 * def.scale + def.zero),
        FitsValue::Float(v) => FitsValue::Float(v * def.scale + def.zero),
        other => other,
    }
}

fn array<const N: usize>(cell: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&cell[..N]);
    out
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Parse header cards up to END; returns the header and its padded length
fn parse_header(bytes: &[u8], path: &Path) -> Result<(Header, usize)> {
    let mut header = Header::default();

    for (index, card) in bytes.chunks(CARD_SIZE).enumerate() {
        if card.len() < CARD_SIZE {
            break;
        }
        let keyword = String::from_utf8_lossy(&card[..8]).trim().to_string();

        if keyword == "END" {
            let used = (index + 1) * CARD_SIZE;
            return Ok((header, padded(used)));
        }

        if &card[8..10] == b"= " {
            let value = String::from_utf8_lossy(&card[10..]);
            header.cards.push((keyword, parse_card_value(&value)));
        }
    }

    Err(LcError::invalid_format(path, "header has no END card"))
}

fn parse_card_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        // Quoted string: '' is an escaped quote, the first lone quote ends it
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        return value.trim_end().to_string();
    }

    raw.split('/').next().unwrap_or_default().trim().to_string()
}

fn parse_tform(tform: &str) -> Option<(usize, ColumnKind)> {
    let tform = tform.trim();
    let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
    let code = tform[digits.len()..].chars().next()?;
    let repeat = if digits.is_empty() {
        1
    } else {
        digits.parse().ok()?
    };
    Some((repeat, ColumnKind::from_code(code)?))
}

fn data_size(header: &Header, path: &Path) -> Result<usize> {
    let bitpix = header.get_int("BITPIX", path)?.unsigned_abs() as usize;
    let naxis = header.get_int("NAXIS", path)? as usize;
    if naxis == 0 {
        return Ok(0);
    }

    let mut elements = 1usize;
    for n in 1..=naxis {
        elements *= header.get_int(&format!("NAXIS{n}"), path)? as usize;
    }
    let pcount = header.get_int("PCOUNT", path).unwrap_or(0) as usize;
    let gcount = header.get_int("GCOUNT", path).unwrap_or(1) as usize;

    Ok(bitpix / 8 * gcount * (pcount + elements))
}

/// Column contents for [`BinTableWriter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text { width: usize, values: Vec<String> },
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Text { values, .. } => values.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Long(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    fn tform(&self) -> String {
        match self {
            ColumnData::Text { width, .. } => format!("{width}{}", ColumnKind::Text.code()),
            ColumnData::Int(_) => format!("1{}", ColumnKind::Int.code()),
            ColumnData::Long(_) => format!("1{}", ColumnKind::Long.code()),
            ColumnData::Float(_) => format!("1{}", ColumnKind::Float.code()),
            ColumnData::Double(_) => format!("1{}", ColumnKind::Double.code()),
            ColumnData::Bool(_) => format!("1{}", ColumnKind::Logical.code()),
        }
    }

    fn width(&self) -> usize {
        match self {
            ColumnData::Text { width, .. } => *width,
            ColumnData::Int(_) | ColumnData::Float(_) => 4,
            ColumnData::Long(_) | ColumnData::Double(_) => 8,
            ColumnData::Bool(_) => 1,
        }
    }

    fn write_cell(&self, row: usize, out: &mut Vec<u8>) {
        match self {
            ColumnData::Text { width, values } => {
                let mut cell = values[row].as_bytes().to_vec();
                cell.resize(*width, b' ');
                out.extend_from_slice(&cell[..*width]);
            }
            ColumnData::Int(v) => out.extend_from_slice(&v[row].to_be_bytes()),
            ColumnData::Long(v) => out.extend_from_slice(&v[row].to_be_bytes()),
            ColumnData::Float(v) => out.extend_from_slice(&v[row].to_be_bytes()),
            ColumnData::Double(v) => out.extend_from_slice(&v[row].to_be_bytes()),
            ColumnData::Bool(v) => out.push(if v[row] { b'T' } else { b'F' }),
        }
    }
}

/// Builds a FITS file with an empty primary HDU and one binary table
#[derive(Debug, Clone, Default)]
pub struct BinTableWriter {
    columns: Vec<(String, ColumnData)>,
}

impl BinTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push((name.into(), data));
        self
    }

    /// Serialize to uncompressed FITS bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let nrows = self.columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((name, _)) = self.columns.iter().find(|(_, c)| c.len() != nrows) {
            return Err(LcError::data_validation(format!(
                "column {name} has a different length than the first column"
            )));
        }
        let row_len: usize = self.columns.iter().map(|(_, c)| c.width()).sum();

        let mut out = Vec::new();

        let primary = [
            card_logical("SIMPLE", true),
            card_int("BITPIX", 8),
            card_int("NAXIS", 0),
            card_logical("EXTEND", true),
        ];
        write_header(&mut out, &primary);

        let mut cards = vec![
            card_string("XTENSION", "BINTABLE"),
            card_int("BITPIX", 8),
            card_int("NAXIS", 2),
            card_int("NAXIS1", row_len as i64),
            card_int("NAXIS2", nrows as i64),
            card_int("PCOUNT", 0),
            card_int("GCOUNT", 1),
            card_int("TFIELDS", self.columns.len() as i64),
        ];
        for (index, (name, data)) in self.columns.iter().enumerate() {
            let n = index + 1;
            cards.push(card_string(&format!("TTYPE{n}"), name));
            cards.push(card_string(&format!("TFORM{n}"), &data.tform()));
        }
        write_header(&mut out, &cards);

        let data_start = out.len();
        for row in 0..nrows {
            for (_, data) in &self.columns {
                data.write_cell(row, &mut out);
            }
        }
        let data_len = out.len() - data_start;
        out.resize(data_start + padded(data_len), 0);

        Ok(out)
    }

    /// Write to `path`, gzip-compressed when the name ends in `.gz`
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let file = File::create(path)?;

        if path.extension().is_some_and(|ext| ext == "gz") {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?;
        } else {
            let mut file = file;
            file.write_all(&bytes)?;
        }
        Ok(())
    }
}

fn write_header(out: &mut Vec<u8>, cards: &[String]) {
    let start = out.len();
    for card in cards {
        out.extend_from_slice(card.as_bytes());
    }
    out.extend_from_slice(format!("{:<80}", "END").as_bytes());
    let used = out.len() - start;
    out.resize(start + padded(used), b' ');
}

fn card_int(key: &str, value: i64) -> String {
    format!("{:<80}", format!("{key:<8}= {value:>20}"))
}

fn card_logical(key: &str, value: bool) -> String {
    let flag = if value { "T" } else { "F" };
    format!("{:<80}", format!("{key:<8}= {flag:>20}"))
}

fn card_string(key: &str, value: &str) -> String {
    let quoted = format!("'{:<8}'", value.replace('\'', "''"));
    let card = format!("{key:<8}= {quoted}");
    format!("{:<80}", &card[..card.len().min(CARD_SIZE)])
}
