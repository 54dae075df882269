//! Stata `.dta` reader.
//!
//! Supported releases:
//!
//! - 113, 114, 115: fixed binary header (Stata 8 to 12)
//! - 117, 118, 119: tagged header with a section map (Stata 13 and later)
//!
//! Only the pieces needed for regression are decoded: variable types, names
//! and the data block. Numeric variables become nullable `f64` columns; the
//! Stata missing codes (`.`, `.a` to `.z`) map to `None`. String variables are
//! skipped with a warning.

use log::{debug, warn};

use crate::data::dataset::{Column, Dataset};
use crate::error::AppError;

/// Fixed header length of releases 113 to 115.
const LEGACY_HEADER_LEN: usize = 109;
const TAGGED_MAGIC: &[u8] = b"<stata_dta>";

// Largest non-missing integer values; anything above is a missing code.
const BYTE_MAX: i8 = 100;
const INT_MAX: i16 = 32_740;
const LONG_MAX: i32 = 2_147_483_620;
// Missing floating point codes start at 2^127 (float) and 2^1023 (double).
const FLOAT_MISSING_BITS: u32 = 0x7f00_0000;
const DOUBLE_MISSING_BITS: u64 = 0x7fe0_0000_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarType {
    Byte,
    Int,
    Long,
    Float,
    Double,
    Str(usize),
    StrL,
}

impl VarType {
    fn from_legacy_code(code: u8) -> Option<Self> {
        match code {
            1..=244 => Some(VarType::Str(code as usize)),
            251 => Some(VarType::Byte),
            252 => Some(VarType::Int),
            253 => Some(VarType::Long),
            254 => Some(VarType::Float),
            255 => Some(VarType::Double),
            _ => None,
        }
    }

    fn from_tagged_code(code: u16) -> Option<Self> {
        match code {
            1..=2045 => Some(VarType::Str(code as usize)),
            32768 => Some(VarType::StrL),
            65526 => Some(VarType::Double),
            65527 => Some(VarType::Float),
            65528 => Some(VarType::Long),
            65529 => Some(VarType::Int),
            65530 => Some(VarType::Byte),
            _ => None,
        }
    }

    fn width(self) -> usize {
        match self {
            VarType::Byte => 1,
            VarType::Int => 2,
            VarType::Long | VarType::Float => 4,
            VarType::Double | VarType::StrL => 8,
            VarType::Str(n) => n,
        }
    }

    fn is_numeric(self) -> bool {
        !matches!(self, VarType::Str(_) | VarType::StrL)
    }
}

/// True if `bytes` starts like a `.dta` file of a supported release.
pub fn looks_like_dta(bytes: &[u8]) -> bool {
    bytes.starts_with(TAGGED_MAGIC)
        || (bytes.len() >= 2 && (113..=115).contains(&bytes[0]) && matches!(bytes[1], 1 | 2))
}

/// Parse a complete `.dta` file held in memory.
pub fn parse_dta(bytes: &[u8]) -> Result<Dataset, AppError> {
    if bytes.starts_with(TAGGED_MAGIC) {
        parse_tagged(bytes)
    } else {
        parse_legacy(bytes)
    }
}

fn parse_legacy(bytes: &[u8]) -> Result<Dataset, AppError> {
    if bytes.len() < LEGACY_HEADER_LEN {
        return Err(malformed("file shorter than the fixed header"));
    }
    let release = bytes[0];
    if !(113..=115).contains(&release) {
        return Err(malformed(format!("unsupported release {release}")));
    }
    let big_endian = match bytes[1] {
        1 => true,
        2 => false,
        other => return Err(malformed(format!("unknown byte order flag {other}"))),
    };

    let mut r = Reader::new(bytes, big_endian);
    r.seek(4)?;
    let nvar = r.u16()? as usize;
    let nobs = r.u32()? as usize;
    // data label (81) + time stamp (18)
    r.skip(81 + 18)?;

    let mut types = Vec::with_capacity(nvar);
    for _ in 0..nvar {
        let code = r.u8()?;
        types.push(
            VarType::from_legacy_code(code)
                .ok_or_else(|| malformed(format!("unknown variable type code {code}")))?,
        );
    }
    let names = (0..nvar)
        .map(|_| r.fixed_str(33))
        .collect::<Result<Vec<_>, _>>()?;

    let fmt_len = if release == 113 { 12 } else { 49 };
    // sort list, formats, value-label names, variable labels
    r.skip(2 * (nvar + 1))?;
    r.skip(nvar * fmt_len)?;
    r.skip(nvar * 33)?;
    r.skip(nvar * 81)?;

    // Expansion fields: (type, length, payload) until a zero terminator.
    loop {
        let data_type = r.u8()?;
        let len = r.u32()? as usize;
        if data_type == 0 && len == 0 {
            break;
        }
        r.skip(len)?;
    }

    debug!("dta release {release}: {nvar} variables, {nobs} observations");
    read_records(&mut r, &types, &names, nobs)
}

fn parse_tagged(bytes: &[u8]) -> Result<Dataset, AppError> {
    let mut r = Reader::new(bytes, false);
    r.expect("<stata_dta>")?;
    r.expect("<header>")?;
    r.expect("<release>")?;
    let release_raw = r.take(3)?;
    let release: u16 = std::str::from_utf8(release_raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed("unreadable release tag"))?;
    if !(117..=119).contains(&release) {
        return Err(malformed(format!("unsupported release {release}")));
    }
    r.expect("</release>")?;

    r.expect("<byteorder>")?;
    r.big_endian = match r.take(3)? {
        b"MSF" => true,
        b"LSF" => false,
        _ => return Err(malformed("unknown byte order tag")),
    };
    r.expect("</byteorder>")?;

    r.expect("<K>")?;
    let nvar = if release == 119 { r.u32()? as usize } else { r.u16()? as usize };
    r.expect("</K>")?;

    r.expect("<N>")?;
    let nobs = if release == 117 { r.u32()? as u64 } else { r.u64()? };
    let nobs = usize::try_from(nobs).map_err(|_| malformed("observation count overflows"))?;
    r.expect("</N>")?;

    r.expect("<label>")?;
    let label_len = if release == 117 { r.u8()? as usize } else { r.u16()? as usize };
    r.skip(label_len)?;
    r.expect("</label>")?;

    r.expect("<timestamp>")?;
    let ts_len = r.u8()? as usize;
    r.skip(ts_len)?;
    r.expect("</timestamp>")?;
    r.expect("</header>")?;

    r.expect("<map>")?;
    let mut map = [0u64; 14];
    for slot in map.iter_mut() {
        *slot = r.u64()?;
    }
    r.expect("</map>")?;

    r.seek_u64(map[2])?;
    r.expect("<variable_types>")?;
    let mut types = Vec::with_capacity(nvar);
    for _ in 0..nvar {
        let code = r.u16()?;
        types.push(
            VarType::from_tagged_code(code)
                .ok_or_else(|| malformed(format!("unknown variable type code {code}")))?,
        );
    }

    r.seek_u64(map[3])?;
    r.expect("<varnames>")?;
    let name_len = if release == 117 { 33 } else { 129 };
    let names = (0..nvar)
        .map(|_| r.fixed_str(name_len))
        .collect::<Result<Vec<_>, _>>()?;

    r.seek_u64(map[9])?;
    r.expect("<data>")?;

    debug!("dta release {release}: {nvar} variables, {nobs} observations");
    read_records(&mut r, &types, &names, nobs)
}

fn read_records(
    r: &mut Reader<'_>,
    types: &[VarType],
    names: &[String],
    nobs: usize,
) -> Result<Dataset, AppError> {
    let row_width: usize = types.iter().map(|t| t.width()).sum();
    let needed = nobs
        .checked_mul(row_width)
        .ok_or_else(|| malformed("data block size overflows"))?;
    if needed > r.remaining() {
        return Err(malformed(format!(
            "data block truncated: need {needed} bytes, have {}",
            r.remaining()
        )));
    }

    for (name, ty) in names.iter().zip(types) {
        if !ty.is_numeric() {
            warn!("Skipping non-numeric variable '{name}'.");
        }
    }

    let mut columns: Vec<Column> = names
        .iter()
        .zip(types)
        .filter(|(_, ty)| ty.is_numeric())
        .map(|(name, _)| Column::new(name.clone(), Vec::with_capacity(nobs)))
        .collect();

    for _ in 0..nobs {
        let record = r.take(row_width)?;
        let mut offset = 0;
        let mut slot = 0;
        for &ty in types {
            let w = ty.width();
            if ty.is_numeric() {
                columns[slot]
                    .values
                    .push(decode(ty, &record[offset..offset + w], r.big_endian));
                slot += 1;
            }
            offset += w;
        }
    }

    Dataset::new(columns)
}

fn decode(ty: VarType, raw: &[u8], big_endian: bool) -> Option<f64> {
    match ty {
        VarType::Byte => {
            let v = raw[0] as i8;
            (v <= BYTE_MAX).then_some(v as f64)
        }
        VarType::Int => {
            let b = [raw[0], raw[1]];
            let v = if big_endian { i16::from_be_bytes(b) } else { i16::from_le_bytes(b) };
            (v <= INT_MAX).then_some(v as f64)
        }
        VarType::Long => {
            let b = [raw[0], raw[1], raw[2], raw[3]];
            let v = if big_endian { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) };
            (v <= LONG_MAX).then_some(v as f64)
        }
        VarType::Float => {
            let b = [raw[0], raw[1], raw[2], raw[3]];
            let bits = if big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) };
            if bits & 0x8000_0000 == 0 && bits >= FLOAT_MISSING_BITS {
                return None;
            }
            let v = f32::from_bits(bits) as f64;
            v.is_finite().then_some(v)
        }
        VarType::Double => {
            let b = [
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ];
            let bits = if big_endian { u64::from_be_bytes(b) } else { u64::from_le_bytes(b) };
            if bits & 0x8000_0000_0000_0000 == 0 && bits >= DOUBLE_MISSING_BITS {
                return None;
            }
            let v = f64::from_bits(bits);
            v.is_finite().then_some(v)
        }
        VarType::Str(_) | VarType::StrL => None,
    }
}

fn malformed(msg: impl std::fmt::Display) -> AppError {
    AppError::DataUnavailable(format!("Malformed .dta file: {msg}."))
}

/// Bounds-checked cursor over the file bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], big_endian: bool) -> Self {
        Self {
            bytes,
            pos: 0,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], AppError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| malformed(format!("unexpected end of file at byte {}", self.pos)))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), AppError> {
        self.take(n).map(|_| ())
    }

    fn seek(&mut self, pos: usize) -> Result<(), AppError> {
        if pos > self.bytes.len() {
            return Err(malformed(format!("offset {pos} beyond end of file")));
        }
        self.pos = pos;
        Ok(())
    }

    fn seek_u64(&mut self, pos: u64) -> Result<(), AppError> {
        let pos = usize::try_from(pos).map_err(|_| malformed("section offset overflows"))?;
        self.seek(pos)
    }

    fn expect(&mut self, tag: &str) -> Result<(), AppError> {
        let at = self.pos;
        let got = self.take(tag.len())?;
        if got != tag.as_bytes() {
            return Err(malformed(format!("expected '{tag}' at byte {at}")));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, AppError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, AppError> {
        let b = self.take(2)?;
        let b = [b[0], b[1]];
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn u32(&mut self) -> Result<u32, AppError> {
        let b = self.take(4)?;
        let b = [b[0], b[1], b[2], b[3]];
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn u64(&mut self) -> Result<u64, AppError> {
        let b = self.take(8)?;
        let b = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(if self.big_endian { u64::from_be_bytes(b) } else { u64::from_le_bytes(b) })
    }

    /// NUL-terminated string in a fixed-width field.
    fn fixed_str(&mut self, n: usize) -> Result<String, AppError> {
        let raw = self.take(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(name: &str, width: usize) -> Vec<u8> {
        let mut out = name.as_bytes().to_vec();
        out.resize(width, 0);
        out
    }

    /// Release 114, little endian: double `y`, byte `x`, str3 `s`.
    fn legacy_fixture() -> Vec<u8> {
        let mut b = vec![114u8, 2, 1, 0];
        b.extend(3u16.to_le_bytes());
        b.extend(3u32.to_le_bytes());
        b.extend([0u8; 81]);
        b.extend([0u8; 18]);
        b.extend([255u8, 251, 3]);
        for name in ["y", "x", "s"] {
            b.extend(padded(name, 33));
        }
        b.extend(vec![0u8; 2 * 4]);
        b.extend(vec![0u8; 3 * 49]);
        b.extend(vec![0u8; 3 * 33]);
        b.extend(vec![0u8; 3 * 81]);
        // one expansion field, then the terminator
        b.push(1);
        b.extend(4u32.to_le_bytes());
        b.extend(b"abcd");
        b.push(0);
        b.extend(0u32.to_le_bytes());

        let rows: [(u64, u8, &[u8; 3]); 3] = [
            (1.5f64.to_bits(), 1, b"abc"),
            (DOUBLE_MISSING_BITS, 101, b"de\0"),
            ((-2.0f64).to_bits(), (-5i8) as u8, b"f\0\0"),
        ];
        for (y, x, s) in rows {
            b.extend(y.to_le_bytes());
            b.push(x);
            b.extend(s);
        }
        b
    }

    /// Release 118, big endian: float `f`, long `l`.
    fn tagged_fixture() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend(b"<stata_dta><header><release>118</release><byteorder>MSF</byteorder><K>");
        b.extend(2u16.to_be_bytes());
        b.extend(b"</K><N>");
        b.extend(2u64.to_be_bytes());
        b.extend(b"</N><label>");
        b.extend(0u16.to_be_bytes());
        b.extend(b"</label><timestamp>");
        b.push(0);
        b.extend(b"</timestamp></header>");

        let map_pos = b.len();
        b.extend(b"<map>");
        let map_values = b.len();
        b.extend([0u8; 14 * 8]);
        b.extend(b"</map>");

        let types_pos = b.len();
        b.extend(b"<variable_types>");
        b.extend(65527u16.to_be_bytes());
        b.extend(65528u16.to_be_bytes());
        b.extend(b"</variable_types>");

        let names_pos = b.len();
        b.extend(b"<varnames>");
        b.extend(padded("f", 129));
        b.extend(padded("l", 129));
        b.extend(b"</varnames>");

        let data_pos = b.len();
        b.extend(b"<data>");
        b.extend(0.25f32.to_be_bytes());
        b.extend(42i32.to_be_bytes());
        b.extend(FLOAT_MISSING_BITS.to_be_bytes());
        b.extend(2_147_483_621i32.to_be_bytes());
        b.extend(b"</data>");

        let mut map = [0u64; 14];
        map[1] = map_pos as u64;
        map[2] = types_pos as u64;
        map[3] = names_pos as u64;
        map[9] = data_pos as u64;
        for (i, v) in map.iter().enumerate() {
            let at = map_values + i * 8;
            b[at..at + 8].copy_from_slice(&v.to_be_bytes());
        }
        b
    }

    #[test]
    fn reads_legacy_release() {
        let bytes = legacy_fixture();
        assert!(looks_like_dta(&bytes));
        let ds = parse_dta(&bytes).unwrap();
        // The string column is dropped.
        assert_eq!(ds.names().collect::<Vec<_>>(), vec!["y", "x"]);
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column("y").unwrap().values, vec![Some(1.5), None, Some(-2.0)]);
        assert_eq!(ds.column("x").unwrap().values, vec![Some(1.0), None, Some(-5.0)]);
    }

    #[test]
    fn reads_tagged_release_big_endian() {
        let bytes = tagged_fixture();
        assert!(looks_like_dta(&bytes));
        let ds = parse_dta(&bytes).unwrap();
        assert_eq!(ds.column("f").unwrap().values, vec![Some(0.25), None]);
        assert_eq!(ds.column("l").unwrap().values, vec![Some(42.0), None]);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut bytes = legacy_fixture();
        bytes.truncate(bytes.len() - 5);
        let err = parse_dta(&bytes).unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn csv_text_is_not_dta() {
        assert!(!looks_like_dta(b"y,x\n1,2\n"));
    }
}
