// C ABI over the process-wide engine. Results come back as heap-allocated
// JSON strings through an out-pointer and must be released with
// `fasttext_free_string`. Panics are caught at the boundary.
use crate::core::engine::InferenceEngine;
use crate::error::FastTextError;
use libc::{c_char, c_int};
use serde::Serialize;
use std::ffi::{CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

pub const FT_OK: c_int = 0;
pub const FT_ERR_IO: c_int = 1;
pub const FT_ERR_CORRUPT_MODEL: c_int = 2;
pub const FT_ERR_UNSUPPORTED_VERSION: c_int = 3;
pub const FT_ERR_MODEL_NOT_FOUND: c_int = 4;
pub const FT_ERR_INVALID_ARGUMENT: c_int = 5;
pub const FT_ERR_INFERENCE: c_int = 6;
pub const FT_ERR_INVALID_INPUT: c_int = 7;
pub const FT_ERR_UNSUPPORTED_FEATURE: c_int = 8;
pub const FT_ERR_CONFIG: c_int = 9;
pub const FT_ERR_PANIC: c_int = 10;

fn status_of(e: &FastTextError) -> c_int {
    match e {
        FastTextError::Io(_) => FT_ERR_IO,
        FastTextError::CorruptModel(_) => FT_ERR_CORRUPT_MODEL,
        FastTextError::UnsupportedVersion(_) => FT_ERR_UNSUPPORTED_VERSION,
        FastTextError::UnsupportedFeature(_) => FT_ERR_UNSUPPORTED_FEATURE,
        FastTextError::ModelNotFound(_) => FT_ERR_MODEL_NOT_FOUND,
        FastTextError::InvalidArgument(_) => FT_ERR_INVALID_ARGUMENT,
        FastTextError::Inference(_) => FT_ERR_INFERENCE,
        FastTextError::Config(_) => FT_ERR_CONFIG,
    }
}

/// Failure inside a boundary call: either an engine error or bad input.
enum CallError {
    Engine(FastTextError),
    InvalidInput(&'static str),
}

impl From<FastTextError> for CallError {
    fn from(e: FastTextError) -> Self {
        Self::Engine(e)
    }
}

impl CallError {
    fn status(&self) -> c_int {
        match self {
            Self::Engine(e) => status_of(e),
            Self::InvalidInput(_) => FT_ERR_INVALID_INPUT,
        }
    }
}

unsafe fn borrow_str<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, CallError> {
    if ptr.is_null() {
        return Err(CallError::InvalidInput(what));
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| CallError::InvalidInput(what))
}

fn count_arg(k: c_int, what: &str) -> Result<usize, CallError> {
    usize::try_from(k).map_err(|_| FastTextError::invalid_argument(format!("{what} must not be negative")).into())
}

/// Runs `f`, converting errors and panics into status codes.
fn guarded<F>(name: &str, f: F) -> c_int
where
    F: FnOnce() -> Result<(), CallError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => FT_OK,
        Ok(Err(e)) => {
            match &e {
                CallError::Engine(err) => tracing::debug!(call = name, error = %err, "call failed"),
                CallError::InvalidInput(what) => tracing::warn!(call = name, "invalid {}", what),
            }
            e.status()
        }
        Err(_) => {
            tracing::error!(call = name, "panic caught at the C boundary");
            FT_ERR_PANIC
        }
    }
}

/// Serializes `value` into a freshly allocated C string stored in `*out`.
unsafe fn emit_json<T: Serialize>(out: *mut *mut c_char, value: &T) -> Result<(), CallError> {
    if out.is_null() {
        return Err(CallError::InvalidInput("output pointer"));
    }
    let json = serde_json::to_string(value)
        .map_err(|e| FastTextError::Inference(format!("failed to encode result: {e}")))?;
    // JSON escapes control characters, so the string never holds an interior NUL.
    let c_string = CString::new(json).map_err(|_| CallError::InvalidInput("result text"))?;
    *out = c_string.into_raw();
    Ok(())
}

#[derive(Serialize)]
struct Intentions {
    labels: Vec<String>,
    scores: Vec<f32>,
}

/// Loads `path` and registers it as `name`, replacing any model of that name.
///
/// # Safety
/// `name` and `path` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn fasttext_load_model(name: *const c_char, path: *const c_char) -> c_int {
    guarded("load_model", || {
        let name = borrow_str(name, "model name")?;
        let path = borrow_str(path, "model path")?;
        InferenceEngine::global().load_model(name, path)?;
        Ok(())
    })
}

/// Removes `name`. Unknown names report `FT_ERR_MODEL_NOT_FOUND`.
///
/// # Safety
/// `name` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fasttext_unload_model(name: *const c_char) -> c_int {
    guarded("unload_model", || {
        let name = borrow_str(name, "model name")?;
        if InferenceEngine::global().unload_model(name) {
            Ok(())
        } else {
            Err(FastTextError::ModelNotFound(name.to_string()).into())
        }
    })
}

/// Writes `[[label, probability], ...]`, best first.
///
/// # Safety
/// String arguments must be valid NUL-terminated strings and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn fasttext_predict(
    name: *const c_char,
    text: *const c_char,
    k: c_int,
    out: *mut *mut c_char,
) -> c_int {
    guarded("predict", || {
        let name = borrow_str(name, "model name")?;
        let text = borrow_str(text, "query text")?;
        let k = count_arg(k, "k")?;
        let predictions = InferenceEngine::global().predict(name, text, k)?;
        emit_json(out, &predictions)
    })
}

/// Writes `{"labels": [...], "scores": [...]}` holding at most six entries.
///
/// # Safety
/// String arguments must be valid NUL-terminated strings and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn fasttext_predict_max_intention(
    name: *const c_char,
    text: *const c_char,
    out: *mut *mut c_char,
) -> c_int {
    guarded("predict_max_intention", || {
        let name = borrow_str(name, "model name")?;
        let text = borrow_str(text, "query text")?;
        let (labels, scores) = InferenceEngine::global().predict_max_intention(name, text)?;
        emit_json(out, &Intentions { labels, scores })
    })
}

/// Writes the word's vector as a JSON array of `dim` numbers.
///
/// # Safety
/// String arguments must be valid NUL-terminated strings and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn fasttext_get_word_vector(
    name: *const c_char,
    word: *const c_char,
    out: *mut *mut c_char,
) -> c_int {
    guarded("get_word_vector", || {
        let name = borrow_str(name, "model name")?;
        let word = borrow_str(word, "word")?;
        let vector = InferenceEngine::global().get_word_vector(name, word)?;
        emit_json(out, &vector)
    })
}

/// Writes `[[word, similarity], ...]`, most similar first.
///
/// # Safety
/// String arguments must be valid NUL-terminated strings and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn fasttext_get_most_similar(
    name: *const c_char,
    query: *const c_char,
    k: c_int,
    out: *mut *mut c_char,
) -> c_int {
    guarded("get_most_similar", || {
        let name = borrow_str(name, "model name")?;
        let query = borrow_str(query, "query word")?;
        let k = count_arg(k, "k")?;
        let neighbours = InferenceEngine::global().get_most_similar(name, query, k)?;
        emit_json(out, &neighbours)
    })
}

/// Writes the vocabulary as a JSON array in id order.
///
/// # Safety
/// `name` must be a valid NUL-terminated string and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn fasttext_get_words(name: *const c_char, out: *mut *mut c_char) -> c_int {
    guarded("get_words", || {
        let name = borrow_str(name, "model name")?;
        let words = InferenceEngine::global().get_words(name)?;
        emit_json(out, &words)
    })
}

fn size_query(name: *const c_char, call: &str, f: impl FnOnce(&str) -> Result<usize, FastTextError>) -> c_int {
    let mut value = 0usize;
    let status = guarded(call, || {
        let name = unsafe { borrow_str(name, "model name")? };
        value = f(name)?;
        Ok(())
    });
    if status == FT_OK {
        c_int::try_from(value).unwrap_or(c_int::MAX)
    } else {
        -status
    }
}

/// Vector width of the model, or a negated status code.
///
/// # Safety
/// `name` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fasttext_get_dimension(name: *const c_char) -> c_int {
    size_query(name, "get_dimension", |n| InferenceEngine::global().get_dimension(n))
}

/// Vocabulary size of the model, or a negated status code.
///
/// # Safety
/// `name` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fasttext_get_word_n(name: *const c_char) -> c_int {
    size_query(name, "get_word_n", |n| InferenceEngine::global().get_word_n(n))
}

/// Releases a string produced by this library.
///
/// # Safety
/// `s` must come from this library and not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn fasttext_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}
