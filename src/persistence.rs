// File: src/persistence.rs
//! Reading and writing the fastText `.bin` model format.
//!
//! Layout (little-endian throughout):
//!
//! | Field | Encoding |
//! |-------|----------|
//! | magic, version | `i32`, `i32` |
//! | args | 12 x `i32`, then `f64` |
//! | dictionary header | `i32` size, nwords, nlabels; `i64` ntokens, pruneidx_size |
//! | entries | NUL-terminated word, `i64` count, `i8` type |
//! | prune index | pruneidx_size x (`i32`, `i32`) |
//! | input | `u8` quantized flag, `i64` rows, `i64` cols, rows*cols `f32` |
//! | output | same as input |
use crate::core::dictionary::Dictionary;
use crate::core::matrix::DenseMatrix;
use crate::core::model::FastText;
use crate::core::types::{Args, Entry, EntryType, LossName, ModelName};
use crate::error::{FastTextError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const FASTTEXT_MAGIC: i32 = 793_712_314;
pub const FASTTEXT_VERSION: i32 = 12;
/// Version 11 files are readable; supervised ones predate character n-grams.
const OLDEST_READABLE_VERSION: i32 = 11;

/// Floats decoded per read call.
const CHUNK_FLOATS: usize = 1 << 16;
/// Cap on speculative preallocation driven by sizes read from the file.
const MAX_PREALLOC: usize = 1 << 20;

fn map_io(e: std::io::Error) -> FastTextError {
    if e.kind() == ErrorKind::UnexpectedEof {
        FastTextError::corrupt("unexpected end of file")
    } else {
        FastTextError::Io(e)
    }
}

fn map_bincode(e: bincode::Error) -> FastTextError {
    match *e {
        bincode::ErrorKind::Io(io) => map_io(io),
        other => FastTextError::corrupt(other.to_string()),
    }
}

fn read_scalar<T: DeserializeOwned, R: Read>(reader: &mut R) -> Result<T> {
    bincode::deserialize_from(reader).map_err(map_bincode)
}

fn write_scalar<T: Serialize, W: Write>(writer: &mut W, value: &T) -> Result<()> {
    bincode::serialize_into(writer, value).map_err(map_bincode)
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value: i32 = read_scalar(reader)?;
    usize::try_from(value).map_err(|_| FastTextError::corrupt(format!("negative {what}: {value}")))
}

fn read_args<R: Read>(reader: &mut R) -> Result<Args> {
    let dim = read_count(reader, "dimension")?;
    let ws = read_scalar(reader)?;
    let epoch = read_scalar(reader)?;
    let min_count = read_scalar(reader)?;
    let neg = read_scalar(reader)?;
    let word_ngrams = read_count(reader, "word n-gram length")?;
    let loss = LossName::from_code(read_scalar(reader)?)?;
    let model = ModelName::from_code(read_scalar(reader)?)?;
    let bucket = read_count(reader, "bucket count")?;
    let minn = read_count(reader, "minn")?;
    let maxn = read_count(reader, "maxn")?;
    let lr_update_rate = read_scalar(reader)?;
    let t = read_scalar(reader)?;
    Ok(Args { dim, ws, epoch, min_count, neg, word_ngrams, loss, model, bucket, minn, maxn, lr_update_rate, t })
}

fn write_args<W: Write>(writer: &mut W, args: &Args) -> Result<()> {
    let ints = [
        args.dim as i32,
        args.ws,
        args.epoch,
        args.min_count,
        args.neg,
        args.word_ngrams as i32,
        args.loss.code(),
        args.model.code(),
        args.bucket as i32,
        args.minn as i32,
        args.maxn as i32,
        args.lr_update_rate,
    ];
    for value in ints {
        write_scalar(writer, &value)?;
    }
    write_scalar(writer, &args.t)
}

fn read_word<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    reader.read_until(0, &mut bytes).map_err(map_io)?;
    if bytes.pop() != Some(0) {
        return Err(FastTextError::corrupt("unterminated dictionary word"));
    }
    String::from_utf8(bytes).map_err(|_| FastTextError::corrupt("dictionary word is not valid UTF-8"))
}

fn read_dictionary<R: BufRead>(reader: &mut R, args: &Args) -> Result<Dictionary> {
    let size = read_count(reader, "dictionary size")?;
    let nwords = read_count(reader, "word count")?;
    let nlabels = read_count(reader, "label count")?;
    let ntokens: i64 = read_scalar(reader)?;
    let pruneidx_size: i64 = read_scalar(reader)?;
    if nwords.checked_add(nlabels) != Some(size) {
        return Err(FastTextError::corrupt(format!(
            "dictionary size {size} != {nwords} words + {nlabels} labels"
        )));
    }

    let mut entries = Vec::with_capacity(size.min(MAX_PREALLOC));
    for _ in 0..size {
        let word = read_word(reader)?;
        let count: i64 = read_scalar(reader)?;
        let entry_type = EntryType::from_code(read_scalar(reader)?)?;
        entries.push(Entry { word, count, entry_type });
    }

    let mut prune_pairs = Vec::new();
    for _ in 0..pruneidx_size.max(0) {
        let from: i32 = read_scalar(reader)?;
        let to: i32 = read_scalar(reader)?;
        prune_pairs.push((from, to));
    }

    let dict = Dictionary::new(args, entries, ntokens, pruneidx_size, prune_pairs)?;
    if dict.nwords() != nwords || dict.nlabels() != nlabels {
        return Err(FastTextError::corrupt(format!(
            "header declares {nwords} words and {nlabels} labels, entries hold {} and {}",
            dict.nwords(),
            dict.nlabels()
        )));
    }
    Ok(dict)
}

fn write_dictionary<W: Write>(writer: &mut W, dict: &Dictionary) -> Result<()> {
    write_scalar(writer, &(dict.size() as i32))?;
    write_scalar(writer, &(dict.nwords() as i32))?;
    write_scalar(writer, &(dict.nlabels() as i32))?;
    write_scalar(writer, &dict.ntokens())?;
    write_scalar(writer, &dict.pruneidx_size())?;
    for entry in dict.entries() {
        writer.write_all(entry.word.as_bytes())?;
        writer.write_all(&[0])?;
        write_scalar(writer, &entry.count)?;
        write_scalar(writer, &entry.entry_type.code())?;
    }
    for (from, to) in dict.prune_pairs() {
        write_scalar(writer, &from)?;
        write_scalar(writer, &to)?;
    }
    Ok(())
}

fn read_matrix<R: Read>(reader: &mut R, which: &str) -> Result<DenseMatrix> {
    let quantized: bool = read_scalar(reader)?;
    if quantized {
        return Err(FastTextError::UnsupportedFeature(format!("quantized {which} matrix")));
    }
    let rows: i64 = read_scalar(reader)?;
    let cols: i64 = read_scalar(reader)?;
    let (rows, cols) = match (usize::try_from(rows), usize::try_from(cols)) {
        (Ok(r), Ok(c)) => (r, c),
        _ => return Err(FastTextError::corrupt(format!("{which} matrix has shape {rows}x{cols}"))),
    };
    let total = rows
        .checked_mul(cols)
        .ok_or_else(|| FastTextError::corrupt(format!("{which} matrix {rows}x{cols} overflows")))?;

    let mut data = Vec::with_capacity(total.min(MAX_PREALLOC));
    let mut buf = vec![0u8; total.min(CHUNK_FLOATS) * 4];
    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(CHUNK_FLOATS);
        let bytes = &mut buf[..n * 4];
        reader.read_exact(bytes).map_err(map_io)?;
        data.extend(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])));
        remaining -= n;
    }
    DenseMatrix::from_vec(rows, cols, data)
}

fn write_matrix<W: Write>(writer: &mut W, matrix: &DenseMatrix) -> Result<()> {
    write_scalar(writer, &false)?;
    write_scalar(writer, &(matrix.rows() as i64))?;
    write_scalar(writer, &(matrix.cols() as i64))?;
    for value in matrix.as_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Decodes a model from any buffered byte source.
pub fn read_model<R: BufRead>(reader: &mut R) -> Result<FastText> {
    let magic: i32 = read_scalar(reader)?;
    if magic != FASTTEXT_MAGIC {
        return Err(FastTextError::corrupt(format!("bad magic number {magic}")));
    }
    let version: i32 = read_scalar(reader)?;
    if !(OLDEST_READABLE_VERSION..=FASTTEXT_VERSION).contains(&version) {
        return Err(FastTextError::UnsupportedVersion(version));
    }

    let mut args = read_args(reader)?;
    if version == 11 && args.model == ModelName::Supervised {
        args.maxn = 0;
    }
    let dict = read_dictionary(reader, &args)?;
    let input = read_matrix(reader, "input")?;
    let output = read_matrix(reader, "output")?;
    FastText::new(args, version, dict, input, output)
}

/// Loads a model file. Nothing global is touched; see `ModelRegistry` for that.
pub fn load_model(path: impl AsRef<Path>) -> Result<FastText> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let model = read_model(&mut BufReader::new(file)).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to load model");
        e
    })?;
    tracing::info!(
        path = %path.display(),
        version = model.version(),
        words = model.dictionary().nwords(),
        labels = model.dictionary().nlabels(),
        dim = model.dimension(),
        loss = ?model.args().loss,
        "loaded model"
    );
    Ok(model)
}

/// Encodes a model in the current format version.
pub fn write_model<W: Write>(writer: &mut W, model: &FastText) -> Result<()> {
    write_scalar(writer, &FASTTEXT_MAGIC)?;
    write_scalar(writer, &FASTTEXT_VERSION)?;
    write_args(writer, model.args())?;
    write_dictionary(writer, model.dictionary())?;
    write_matrix(writer, model.input_matrix())?;
    write_matrix(writer, model.output_model().weights())
}

/// Writes the model to a temporary file beside `path` and renames it into
/// place, so readers never see a half-written model.
pub fn save_model(model: &FastText, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let parent_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    let mut writer = BufWriter::new(temp_file.as_file());
    write_model(&mut writer, model)?;
    writer.flush()?;
    drop(writer);

    temp_file.persist(path).map_err(|e| FastTextError::Io(e.error))?;
    tracing::debug!(path = %path.display(), "saved model");
    Ok(())
}
