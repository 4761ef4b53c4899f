//! NumPy `.npy` decoding for Exdir datasets.
//!
//! Numeric arrays are decoded with `ndarray-npy` and widened to `f64`. NumPy
//! unicode arrays (`<U*`, used for epoch labels) are not supported there, so
//! they are decoded here from the raw UTF-32 payload.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use ndarray_npy::ReadNpyExt;

use super::{ExdirError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Contents of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetData {
    Numeric(ArrayD<f64>),
    Text(ArrayD<String>),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
    data_offset: usize,
}

fn malformed(object: &str, reason: impl Into<String>) -> ExdirError {
    ExdirError::MalformedNpy {
        object: object.to_string(),
        reason: reason.into(),
    }
}

fn parse_header(object: &str, bytes: &[u8]) -> Result<Header> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(malformed(object, "missing magic string"));
    }
    let major = bytes[6];
    let mut cursor = Cursor::new(&bytes[8..]);
    let (header_len, prefix) = match major {
        1 => (cursor.read_u16::<LittleEndian>()? as usize, 10),
        2 | 3 => (cursor.read_u32::<LittleEndian>()? as usize, 12),
        v => return Err(malformed(object, format!("unsupported format version {v}"))),
    };
    let end = prefix + header_len;
    if bytes.len() < end {
        return Err(malformed(object, "truncated header"));
    }
    let dict = std::str::from_utf8(&bytes[prefix..end])
        .map_err(|_| malformed(object, "header is not text"))?;

    let descr = dict_value(dict, "descr")
        .and_then(|v| v.trim().strip_prefix('\'').map(str::to_string))
        .and_then(|v| v.split('\'').next().map(str::to_string))
        .ok_or_else(|| malformed(object, "missing 'descr'"))?;
    let fortran_order = dict_value(dict, "fortran_order")
        .map(|v| v.trim_start().starts_with("True"))
        .ok_or_else(|| malformed(object, "missing 'fortran_order'"))?;
    let shape_text = dict_value(dict, "shape")
        .and_then(|v| {
            let open = v.find('(')?;
            let close = v.find(')')?;
            Some(v[open + 1..close].to_string())
        })
        .ok_or_else(|| malformed(object, "missing 'shape'"))?;
    let shape = shape_text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| malformed(object, format!("bad shape '({shape_text})'")))?;

    Ok(Header {
        descr,
        fortran_order,
        shape,
        data_offset: end,
    })
}

/// Text following `'key':` in a header dict.
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = dict.find(&needle)? + needle.len();
    Some(&dict[start..])
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub(crate) fn read(object: &str, bytes: &[u8]) -> Result<DatasetData> {
    let header = parse_header(object, bytes)?;
    let descr = header.descr.as_str();

    if let Some(width) = descr
        .strip_prefix("<U")
        .or_else(|| descr.strip_prefix("|U"))
    {
        let width: usize = width
            .parse()
            .map_err(|_| malformed(object, format!("bad unicode width in '{descr}'")))?;
        return read_text(object, bytes, &header, width).map(DatasetData::Text);
    }

    let cursor = Cursor::new(bytes);
    let array = match descr {
        "<f8" => ArrayD::<f64>::read_npy(cursor)?,
        "<f4" => ArrayD::<f32>::read_npy(cursor)?.mapv(f64::from),
        "<i8" => ArrayD::<i64>::read_npy(cursor)?.mapv(|v| v as f64),
        "<i4" => ArrayD::<i32>::read_npy(cursor)?.mapv(f64::from),
        "<i2" => ArrayD::<i16>::read_npy(cursor)?.mapv(f64::from),
        "|i1" => ArrayD::<i8>::read_npy(cursor)?.mapv(f64::from),
        "<u8" => ArrayD::<u64>::read_npy(cursor)?.mapv(|v| v as f64),
        "<u4" => ArrayD::<u32>::read_npy(cursor)?.mapv(f64::from),
        "<u2" => ArrayD::<u16>::read_npy(cursor)?.mapv(f64::from),
        "|u1" => ArrayD::<u8>::read_npy(cursor)?.mapv(f64::from),
        "|b1" => ArrayD::<bool>::read_npy(cursor)?.mapv(|v| if v { 1.0 } else { 0.0 }),
        other => {
            return Err(ExdirError::UnsupportedDtype {
                object: object.to_string(),
                descr: other.to_string(),
            })
        }
    };
    Ok(DatasetData::Numeric(array))
}

fn read_text(object: &str, bytes: &[u8], header: &Header, width: usize) -> Result<ArrayD<String>> {
    let count: usize = header.shape.iter().product();
    let mut cursor = Cursor::new(&bytes[header.data_offset..]);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let mut value = String::with_capacity(width);
        for _ in 0..width {
            let code = cursor.read_u32::<LittleEndian>()?;
            if code == 0 {
                continue;
            }
            let ch = char::from_u32(code)
                .ok_or_else(|| malformed(object, format!("invalid code point {code:#x}")))?;
            value.push(ch);
        }
        values.push(value);
    }
    let shape = IxDyn(&header.shape);
    let array = if header.fortran_order {
        ArrayD::from_shape_vec(shape.f(), values)
    } else {
        ArrayD::from_shape_vec(shape, values)
    };
    array.map_err(|e| malformed(object, e.to_string()))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a 1-D `<U*` array, padded to the longest value.
pub(crate) fn write_text<T: AsRef<str>>(path: &Path, values: &[T]) -> Result<()> {
    let width = values
        .iter()
        .map(|v| v.as_ref().chars().count())
        .max()
        .unwrap_or(0)
        .max(1);
    let mut dict = format!(
        "{{'descr': '<U{width}', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );
    // magic (6) + version (2) + length (2) + dict + '\n' must be a multiple of 64
    let unpadded = MAGIC.len() + 4 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    dict.push_str(&" ".repeat(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding + values.len() * width * 4);
    out.write_all(MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_u16::<LittleEndian>(dict.len() as u16)?;
    out.write_all(dict.as_bytes())?;
    for value in values {
        let mut written = 0;
        for ch in value.as_ref().chars() {
            out.write_u32::<LittleEndian>(ch as u32)?;
            written += 1;
        }
        for _ in written..width {
            out.write_u32::<LittleEndian>(0)?;
        }
    }
    fs::write(path, out)?;
    Ok(())
}

/// Read the raw bytes of a `.npy` file and decode them.
pub fn read_file(path: &Path) -> Result<DatasetData> {
    let mut bytes = Vec::new();
    fs::File::open(path)?.read_to_end(&mut bytes)?;
    read(&path.display().to_string(), &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn parses_v1_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.npy");
        ndarray_npy::write_npy(&path, &array![[1.0f32, 2.0], [3.0, 4.0]]).unwrap();
        let bytes = fs::read(&path).unwrap();
        let header = parse_header("a", &bytes).unwrap();
        assert_eq!(header.descr, "<f4");
        assert_eq!(header.shape, vec![2, 2]);
        assert!(!header.fortran_order);
        assert_eq!(header.data_offset % 64, 0);
    }

    #[test]
    fn widens_integer_arrays() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("idx.npy");
        ndarray_npy::write_npy(&path, &array![30000i32, 60000]).unwrap();
        match read_file(&path).unwrap() {
            DatasetData::Numeric(a) => {
                assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![30000.0, 60000.0])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unicode_round_trip_keeps_non_ascii() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("labels.npy");
        write_text(&path, &["0°", "90°", "blank"]).unwrap();
        match read_file(&path).unwrap() {
            DatasetData::Text(a) => {
                assert_eq!(a.shape(), &[3]);
                let labels: Vec<String> = a.iter().cloned().collect();
                assert_eq!(labels, vec!["0°", "90°", "blank"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            read("x", b"not an npy file"),
            Err(ExdirError::MalformedNpy { .. })
        ));
    }
}
