//! Named-array archives in the numpy `.npz` layout.
//!
//! An archive is a zip file with one `<key>.npy` member per array. Numeric
//! members go through `ndarray-npy`; text members are numpy unicode arrays
//! (`<U{n}`), so label vectors load as strings on the Python side too.

use crate::core::{LabeledStack, NamedArrays, SegmentedDataset};
use indexmap::IndexMap;
use ndarray::ArrayD;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Key of the stacked array in a stack archive.
pub const STACK_DATA_KEY: &str = "concatenated_data";
/// Key the older stacking scripts used for the stacked array.
pub const LEGACY_STACK_DATA_KEY: &str = "data";
/// Key of the label vector in a stack archive.
pub const STACK_LABELS_KEY: &str = "labels";

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_SUFFIX: &str = ".npy";
const BYTE_ORDER_MARKS: &[char] = &['<', '>', '|', '='];
/// Upper bound on the buffer reserved from a member's declared size.
const MAX_PREALLOC: usize = 64 << 20;

/// Archive read/write errors.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Malformed member '{member}': {message}")]
    Format { member: String, message: String },

    #[error("Member '{member}' has unsupported dtype '{descr}'")]
    UnsupportedDtype { member: String, descr: String },

    #[error("Archive has no member '{0}'")]
    MissingKey(String),

    #[error("Member '{member}' holds {found}, expected {expected}")]
    UnexpectedValue {
        member: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ArchiveError {
    fn format(member: &str, message: impl std::fmt::Display) -> Self {
        Self::Format {
            member: member.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// One archive member.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveValue {
    Float64(ArrayD<f64>),
    Int64(ArrayD<i64>),
    Text(Vec<String>),
}

impl ArchiveValue {
    fn kind(&self) -> &'static str {
        match self {
            ArchiveValue::Float64(_) => "float64 array",
            ArchiveValue::Int64(_) => "int64 array",
            ArchiveValue::Text(_) => "text array",
        }
    }

    /// Numeric contents as `f64`, widening integers.
    pub fn into_f64(self, member: &str) -> Result<ArrayD<f64>> {
        match self {
            ArchiveValue::Float64(a) => Ok(a),
            ArchiveValue::Int64(a) => Ok(a.mapv(|v| v as f64)),
            ArchiveValue::Text(_) => Err(ArchiveError::UnexpectedValue {
                member: member.to_string(),
                expected: "a numeric array",
                found: "text",
            }),
        }
    }

    pub fn into_text(self, member: &str) -> Result<Vec<String>> {
        match self {
            ArchiveValue::Text(t) => Ok(t),
            other => Err(ArchiveError::UnexpectedValue {
                member: member.to_string(),
                expected: "a text array",
                found: other.kind(),
            }),
        }
    }
}

/// Members in archive order.
pub type NamedArchive = IndexMap<String, ArchiveValue>;

/// Append `.npz` unless the path already ends with it.
pub fn with_npz_extension(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.extension() {
        Some(ext) if ext == "npz" => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".npz");
            PathBuf::from(name)
        }
    }
}

/// Write `archive` to `path` (extension added if missing), returning the final path.
pub fn save_archive(path: impl AsRef<Path>, archive: &NamedArchive) -> Result<PathBuf> {
    let path = with_npz_extension(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(&path)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for (key, value) in archive {
        zip.start_file(format!("{key}{NPY_SUFFIX}"), options)?;
        match value {
            ArchiveValue::Float64(a) => a
                .write_npy(&mut zip)
                .map_err(|e| ArchiveError::format(key, e))?,
            ArchiveValue::Int64(a) => a
                .write_npy(&mut zip)
                .map_err(|e| ArchiveError::format(key, e))?,
            ArchiveValue::Text(t) => write_unicode_npy(&mut zip, t)?,
        }
    }
    zip.finish()?.flush()?;

    info!(path = %path.display(), members = archive.len(), "Archive saved");
    Ok(path)
}

/// Read every member of the archive at `path`.
pub fn load_archive(path: impl AsRef<Path>) -> Result<NamedArchive> {
    let path = path.as_ref();
    let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let mut archive = NamedArchive::new();
    for i in 0..zip.len() {
        let mut member = zip.by_index(i)?;
        let name = member.name().to_string();
        let key = name.strip_suffix(NPY_SUFFIX).unwrap_or(&name).to_string();

        let declared = usize::try_from(member.size()).unwrap_or(usize::MAX);
        let mut bytes = Vec::with_capacity(declared.min(MAX_PREALLOC));
        member.read_to_end(&mut bytes)?;
        let value = decode_member(&key, &bytes)?;
        debug!(member = %key, kind = value.kind(), "Loaded archive member");
        archive.insert(key, value);
    }

    info!(path = %path.display(), members = archive.len(), "Archive loaded");
    Ok(archive)
}

/// Save a segmented recording, one member per activity.
pub fn save_segmented(path: impl AsRef<Path>, dataset: &SegmentedDataset) -> Result<PathBuf> {
    let archive = dataset
        .iter()
        .map(|(name, m)| (name.clone(), ArchiveValue::Float64(m.clone().into_dyn())))
        .collect();
    save_archive(path, &archive)
}

/// Load a segmented archive as named numeric arrays.
pub fn load_segmented(path: impl AsRef<Path>) -> Result<NamedArrays> {
    load_archive(path)?
        .into_iter()
        .map(|(key, value)| {
            let array = value.into_f64(&key)?;
            Ok((key, array))
        })
        .collect()
}

/// Save a labeled stack under the `concatenated_data` / `labels` keys.
pub fn save_stack(path: impl AsRef<Path>, stack: &LabeledStack) -> Result<PathBuf> {
    let mut archive = NamedArchive::new();
    archive.insert(STACK_DATA_KEY.to_string(), ArchiveValue::Float64(stack.data.clone()));
    archive.insert(STACK_LABELS_KEY.to_string(), ArchiveValue::Text(stack.labels.clone()));
    save_archive(path, &archive)
}

/// Load a labeled stack, accepting the legacy `data` key.
pub fn load_stack(path: impl AsRef<Path>) -> Result<LabeledStack> {
    let mut archive = load_archive(path)?;

    let (data_key, data) = [STACK_DATA_KEY, LEGACY_STACK_DATA_KEY]
        .into_iter()
        .find_map(|k| archive.shift_remove(k).map(|v| (k, v)))
        .ok_or_else(|| ArchiveError::MissingKey(STACK_DATA_KEY.to_string()))?;
    let data = data.into_f64(data_key)?;

    let labels = archive
        .shift_remove(STACK_LABELS_KEY)
        .ok_or_else(|| ArchiveError::MissingKey(STACK_LABELS_KEY.to_string()))?
        .into_text(STACK_LABELS_KEY)?;

    let rows = data.shape().first().copied().unwrap_or(0);
    if rows != labels.len() {
        return Err(ArchiveError::format(
            STACK_LABELS_KEY,
            format!("{} labels for {rows} rows", labels.len()),
        ));
    }
    Ok(LabeledStack { data, labels })
}

/// The fields of an npy header that decide how to read the body.
#[derive(Debug, PartialEq)]
struct NpyHeader {
    descr: String,
    shape: Vec<usize>,
    body_offset: usize,
}

fn parse_header(member: &str, bytes: &[u8]) -> Result<NpyHeader> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(ArchiveError::format(member, "not an npy file"));
    }

    // Header length field: 2 bytes in v1, 4 bytes in v2 and v3
    let (header_len, start) = if bytes[6] == 1 {
        (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10)
    } else {
        if bytes.len() < 12 {
            return Err(ArchiveError::format(member, "truncated header"));
        }
        (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
    };
    let header = bytes
        .get(start..start + header_len)
        .ok_or_else(|| ArchiveError::format(member, "truncated header"))?;
    let header = String::from_utf8_lossy(header);

    let descr = quoted_value(&header, "'descr':")
        .ok_or_else(|| ArchiveError::format(member, "header has no descr"))?;
    let shape = header
        .find("'shape':")
        .and_then(|i| {
            let rest = &header[i..];
            let open = rest.find('(')?;
            let close = rest.find(')')?;
            Some(
                rest[open + 1..close]
                    .split(',')
                    .filter_map(|d| d.trim().parse::<usize>().ok())
                    .collect(),
            )
        })
        .ok_or_else(|| ArchiveError::format(member, "header has no shape"))?;

    Ok(NpyHeader {
        descr,
        shape,
        body_offset: start + header_len,
    })
}

fn quoted_value(header: &str, key: &str) -> Option<String> {
    let rest = &header[header.find(key)? + key.len()..];
    let open = rest.find('\'')?;
    let close = rest[open + 1..].find('\'')?;
    Some(rest[open + 1..open + 1 + close].to_string())
}

fn decode_member(member: &str, bytes: &[u8]) -> Result<ArchiveValue> {
    let header = parse_header(member, bytes)?;
    let code = header.descr.trim_start_matches(BYTE_ORDER_MARKS);

    match code.chars().next() {
        Some('f') => {
            let array = if code == "f4" {
                ArrayD::<f32>::read_npy(bytes).map(|a| a.mapv(f64::from))
            } else {
                ArrayD::<f64>::read_npy(bytes)
            };
            array
                .map(ArchiveValue::Float64)
                .map_err(|_| unsupported(member, &header.descr))
        }
        Some('i') => {
            let array = if code == "i4" {
                ArrayD::<i32>::read_npy(bytes).map(|a| a.mapv(i64::from))
            } else {
                ArrayD::<i64>::read_npy(bytes)
            };
            array
                .map(ArchiveValue::Int64)
                .map_err(|_| unsupported(member, &header.descr))
        }
        Some('U') => {
            read_unicode_body(member, &header, &bytes[header.body_offset..]).map(ArchiveValue::Text)
        }
        _ => Err(unsupported(member, &header.descr)),
    }
}

fn unsupported(member: &str, descr: &str) -> ArchiveError {
    ArchiveError::UnsupportedDtype {
        member: member.to_string(),
        descr: descr.to_string(),
    }
}

/// Decode a fixed-width UCS-4 string array body.
fn read_unicode_body(member: &str, header: &NpyHeader, body: &[u8]) -> Result<Vec<String>> {
    if header.shape.len() > 1 {
        return Err(ArchiveError::format(member, "text arrays must be one-dimensional"));
    }
    let width: usize = header
        .descr
        .trim_start_matches(BYTE_ORDER_MARKS)
        .trim_start_matches('U')
        .parse()
        .map_err(|_| unsupported(member, &header.descr))?;
    let big_endian = header.descr.starts_with('>');
    let count = header.shape.first().copied().unwrap_or(1);

    let body_len = width
        .checked_mul(4)
        .and_then(|item_bytes| item_bytes.checked_mul(count).map(|total| (item_bytes, total)));
    let Some((item_bytes, total)) = body_len else {
        return Err(ArchiveError::format(member, "text shape overflows"));
    };
    if body.len() < total {
        return Err(ArchiveError::format(member, "text body shorter than its shape"));
    }

    (0..count)
        .map(|i| {
            let item = &body[i * item_bytes..(i + 1) * item_bytes];
            item.chunks_exact(4)
                .map(|c| {
                    let raw = [c[0], c[1], c[2], c[3]];
                    if big_endian {
                        u32::from_be_bytes(raw)
                    } else {
                        u32::from_le_bytes(raw)
                    }
                })
                .take_while(|&cp| cp != 0)
                .map(|cp| {
                    char::from_u32(cp)
                        .ok_or_else(|| ArchiveError::format(member, "invalid code point"))
                })
                .collect()
        })
        .collect()
}

/// Write `labels` as a 1-D little-endian unicode npy array.
fn write_unicode_npy<W: Write>(writer: &mut W, labels: &[String]) -> Result<()> {
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    let mut header = format!(
        "{{'descr': '<U{width}', 'fortran_order': False, 'shape': ({},), }}",
        labels.len()
    );
    // magic + version + length field + header + newline, padded to 64 bytes
    let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| ArchiveError::format(STACK_LABELS_KEY, "header too long"))?;

    writer.write_all(NPY_MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;

    let mut item = Vec::with_capacity(width * 4);
    for label in labels {
        item.clear();
        for ch in label.chars() {
            item.extend_from_slice(&(ch as u32).to_le_bytes());
        }
        item.resize(width * 4, 0);
        writer.write_all(&item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, IxDyn};
    use tempfile::TempDir;

    fn empty_array(shape: &[usize]) -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(shape))
    }

    fn segmented() -> SegmentedDataset {
        let mut dataset = SegmentedDataset::new();
        dataset.insert("YOGA".to_string(), array![[1.0, 0.5, -0.25], [2.0, 0.125, 3.75]]);
        dataset.insert("TROTAR".to_string(), Array2::zeros((0, 3)));
        dataset.insert("CAMINAR 1".to_string(), array![[10.0, 1e-9, 1e9]]);
        dataset
    }

    #[test]
    fn test_extension_added_once() {
        assert_eq!(with_npz_extension("out/subject"), PathBuf::from("out/subject.npz"));
        assert_eq!(with_npz_extension("out/subject.npz"), PathBuf::from("out/subject.npz"));
        assert_eq!(with_npz_extension("out/s.v2"), PathBuf::from("out/s.v2.npz"));
    }

    #[test]
    fn test_segmented_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = segmented();
        let path = save_segmented(dir.path().join("nested/subject_segmented"), &original).unwrap();

        assert!(path.ends_with("nested/subject_segmented.npz"));
        let loaded = load_segmented(&path).unwrap();

        let keys: Vec<&String> = loaded.keys().collect();
        assert_eq!(keys, original.keys().collect::<Vec<_>>());
        for (name, matrix) in &original {
            let back = &loaded[name];
            assert_eq!(back.shape(), matrix.shape());
            for (a, b) in back.iter().zip(matrix.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_integer_members_exact() {
        let dir = TempDir::new().unwrap();
        let ints = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![i64::MIN, -1, 0, i64::MAX]).unwrap();
        let mut archive = NamedArchive::new();
        archive.insert("counts".to_string(), ArchiveValue::Int64(ints.clone()));

        let path = save_archive(dir.path().join("ints.npz"), &archive).unwrap();
        let loaded = load_archive(path).unwrap();
        assert_eq!(loaded["counts"], ArchiveValue::Int64(ints));
    }

    #[test]
    fn test_stack_round_trip_with_unicode_labels() {
        let dir = TempDir::new().unwrap();
        let labels = vec![
            "CAMINAR 1".to_string(),
            "ACTIVIDAD NO ESTRUCTURADA".to_string(),
            "Cinta día 1".to_string(),
        ];
        let data = ArrayD::from_shape_fn(IxDyn(&[3, 2, 4]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
        });
        let stack = LabeledStack::new(data.clone(), labels.clone()).unwrap();

        let path = save_stack(dir.path().join("stacked"), &stack).unwrap();
        let loaded = load_stack(&path).unwrap();

        assert_eq!(loaded.labels, labels);
        assert_eq!(loaded.data, data);

        let raw = load_archive(&path).unwrap();
        let keys: Vec<&str> = raw.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![STACK_DATA_KEY, STACK_LABELS_KEY]);
    }

    #[test]
    fn test_empty_stack_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = save_stack(dir.path().join("empty"), &LabeledStack::empty()).unwrap();
        let loaded = load_stack(path).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.labels.is_empty());
    }

    #[test]
    fn test_load_stack_accepts_legacy_key() {
        let dir = TempDir::new().unwrap();
        let mut archive = NamedArchive::new();
        archive.insert(
            LEGACY_STACK_DATA_KEY.to_string(),
            ArchiveValue::Float64(empty_array(&[2, 3])),
        );
        archive.insert(
            STACK_LABELS_KEY.to_string(),
            ArchiveValue::Text(vec!["a".to_string(), "b".to_string()]),
        );
        let path = save_archive(dir.path().join("legacy"), &archive).unwrap();

        let stack = load_stack(path).unwrap();
        assert_eq!(stack.data.shape(), &[2, 3]);
        assert_eq!(stack.labels, vec!["a", "b"]);
    }

    #[test]
    fn test_load_stack_missing_labels() {
        let dir = TempDir::new().unwrap();
        let mut archive = NamedArchive::new();
        archive.insert(STACK_DATA_KEY.to_string(), ArchiveValue::Float64(empty_array(&[1, 3])));
        let path = save_archive(dir.path().join("nolabels"), &archive).unwrap();

        match load_stack(path) {
            Err(ArchiveError::MissingKey(key)) => assert_eq!(key, STACK_LABELS_KEY),
            other => panic!("expected missing key, got {other:?}"),
        }
    }

    #[test]
    fn test_text_member_in_segmented_archive_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut archive = NamedArchive::new();
        archive.insert("notes".to_string(), ArchiveValue::Text(vec!["x".to_string()]));
        let path = save_archive(dir.path().join("notes"), &archive).unwrap();

        assert!(matches!(load_segmented(path), Err(ArchiveError::UnexpectedValue { .. })));
    }

    #[test]
    fn test_missing_file_keeps_not_found() {
        let dir = TempDir::new().unwrap();
        match load_archive(dir.path().join("absent.npz")) {
            Err(ArchiveError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn test_unicode_header_is_aligned() {
        let mut bytes = Vec::new();
        write_unicode_npy(&mut bytes, &["ab".to_string(), "c".to_string()]).unwrap();

        let header = parse_header("labels", &bytes).unwrap();
        assert_eq!(header.body_offset % 64, 0);
        assert_eq!(header.descr, "<U2");
        assert_eq!(header.shape, vec![2]);
        assert_eq!(bytes.len(), header.body_offset + 2 * 2 * 4);
    }

    #[test]
    fn test_parse_numpy_written_header() {
        let text = "{'descr': '<f8', 'fortran_order': False, 'shape': (300, 3, 250), }";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(text.len() as u16).to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());

        let header = parse_header("m", &bytes).unwrap();
        assert_eq!(header.descr, "<f8");
        assert_eq!(header.shape, vec![300, 3, 250]);
    }

    #[test]
    fn test_oversized_text_shape_is_rejected() {
        let text = "{'descr': '<U4', 'fortran_order': False, 'shape': (1152921504606846977,), }";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(text.len() as u16).to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(&[0; 16]);

        assert!(matches!(
            decode_member("labels", &bytes),
            Err(ArchiveError::Format { .. })
        ));
    }

    #[test]
    fn test_unsupported_dtype() {
        let text = "{'descr': '|b1', 'fortran_order': False, 'shape': (1,), }";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(text.len() as u16).to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(1);

        assert!(matches!(
            decode_member("flags", &bytes),
            Err(ArchiveError::UnsupportedDtype { .. })
        ));
    }
}
