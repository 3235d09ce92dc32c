// File: src/core/dictionary.rs
use crate::core::types::{Args, Entry, EntryType, RowId, WordId, BOW, EOS, EOW};
use crate::error::{FastTextError, Result};
use std::collections::HashMap;

/// Multiplier used to chain token hashes into word n-gram hashes.
const WORD_NGRAM_MULTIPLIER: u64 = 116_049_371;

/// 32-bit FNV-1a over raw bytes. Each byte is sign-extended before the xor,
/// which keeps bucket ids identical to models trained by the reference tool.
pub fn hash(bytes: &[u8]) -> u32 {
    let mut h: u32 = 2_166_136_261;
    for &b in bytes {
        h ^= b as i8 as i32 as u32;
        h = h.wrapping_mul(16_777_619);
    }
    h
}

fn is_utf8_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Whitespace-delimited tokens of the first line of `text`. The newline ends
/// the sequence and is not itself a token.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    let line = text.split('\n').next().unwrap_or("");
    line.split(|c: char| matches!(c, ' ' | '\r' | '\t' | '\x0b' | '\x0c' | '\0'))
        .filter(|token| !token.is_empty())
}

/// The vocabulary of a loaded model: words, labels and the n-gram bucket space.
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: Vec<Entry>,
    word2int: HashMap<String, WordId>,
    /// Input rows of every word: its own row followed by its character n-gram buckets.
    subwords: Vec<Vec<RowId>>,
    nwords: usize,
    nlabels: usize,
    ntokens: i64,
    /// Negative when the bucket space is not pruned.
    pruneidx_size: i64,
    pruneidx: HashMap<i32, i32>,
    bucket: usize,
    minn: usize,
    maxn: usize,
    word_ngrams: usize,
}

impl Dictionary {
    /// Builds the dictionary from entries in file order: all words, then all labels.
    pub fn new(
        args: &Args,
        entries: Vec<Entry>,
        ntokens: i64,
        pruneidx_size: i64,
        prune_pairs: Vec<(i32, i32)>,
    ) -> Result<Self> {
        let nwords = entries.iter().take_while(|e| e.entry_type == EntryType::Word).count();
        if entries[nwords..].iter().any(|e| e.entry_type != EntryType::Label) {
            return Err(FastTextError::corrupt("words and labels are interleaved"));
        }
        let nlabels = entries.len() - nwords;

        let mut word2int = HashMap::with_capacity(entries.len());
        for (id, entry) in entries.iter().enumerate() {
            if word2int.insert(entry.word.clone(), id).is_some() {
                return Err(FastTextError::corrupt(format!(
                    "duplicate dictionary entry '{}'",
                    entry.word
                )));
            }
        }

        let pruneidx = prune_index(pruneidx_size, prune_pairs)?;

        let mut dict = Self {
            entries,
            word2int,
            subwords: Vec::new(),
            nwords,
            nlabels,
            ntokens,
            pruneidx_size,
            pruneidx,
            bucket: args.bucket,
            minn: args.minn,
            maxn: args.maxn,
            word_ngrams: args.word_ngrams,
        };
        dict.init_ngrams();
        Ok(dict)
    }

    /// Convenience constructor for synthetic models: words and labels with their counts.
    pub fn from_counts(args: &Args, words: &[(&str, i64)], labels: &[(&str, i64)]) -> Result<Self> {
        let entries = words
            .iter()
            .map(|&(w, c)| (w, c, EntryType::Word))
            .chain(labels.iter().map(|&(l, c)| (l, c, EntryType::Label)))
            .map(|(word, count, entry_type)| Entry { word: word.to_string(), count, entry_type })
            .collect::<Vec<_>>();
        let ntokens = entries.iter().map(|e| e.count).sum();
        Self::new(args, entries, ntokens, -1, Vec::new())
    }

    fn init_ngrams(&mut self) {
        let mut subwords = Vec::with_capacity(self.nwords);
        for id in 0..self.nwords {
            let mut rows = vec![id];
            let word = &self.entries[id].word;
            if word != EOS {
                self.compute_subwords(&wrap(word), &mut rows);
            }
            subwords.push(rows);
        }
        self.subwords = subwords;
    }

    pub fn nwords(&self) -> usize {
        self.nwords
    }

    pub fn nlabels(&self) -> usize {
        self.nlabels
    }

    pub fn ntokens(&self) -> i64 {
        self.ntokens
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn pruneidx_size(&self) -> i64 {
        self.pruneidx_size
    }

    /// Prune index pairs sorted by bucket id, for deterministic serialization.
    pub fn prune_pairs(&self) -> Vec<(i32, i32)> {
        let mut pairs: Vec<(i32, i32)> = self.pruneidx.iter().map(|(&k, &v)| (k, v)).collect();
        pairs.sort_unstable();
        pairs
    }

    /// Number of input rows this dictionary addresses.
    pub fn input_rows(&self) -> usize {
        if self.pruneidx_size >= 0 {
            self.nwords + self.pruneidx_size as usize
        } else {
            self.nwords + self.bucket
        }
    }

    pub fn get_id(&self, word: &str) -> Option<WordId> {
        self.word2int.get(word).copied()
    }

    /// Like `get_id`, but only for vocabulary words; labels resolve to `None`.
    pub fn word_id(&self, word: &str) -> Option<WordId> {
        self.get_id(word).filter(|&id| id < self.nwords)
    }

    pub fn word(&self, id: WordId) -> &str {
        &self.entries[id].word
    }

    /// Label string by label index (0-based among labels).
    pub fn label(&self, lid: usize) -> &str {
        &self.entries[self.nwords + lid].word
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries[..self.nwords].iter().map(|e| e.word.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries[self.nwords..].iter().map(|e| e.word.as_str())
    }

    pub fn label_counts(&self) -> Vec<i64> {
        self.entries[self.nwords..].iter().map(|e| e.count).collect()
    }

    pub fn word_counts(&self) -> Vec<i64> {
        self.entries[..self.nwords].iter().map(|e| e.count).collect()
    }

    fn token_type(&self, token: &str, id: Option<WordId>) -> EntryType {
        match id {
            Some(id) => self.entries[id].entry_type,
            None => EntryType::of_token(token),
        }
    }

    /// Maps a bucket hash to an input row, honouring the prune index.
    fn push_hash(&self, rows: &mut Vec<RowId>, id: i64) {
        if self.pruneidx_size == 0 || id < 0 {
            return;
        }
        let id = if self.pruneidx_size > 0 {
            match self.pruneidx.get(&(id as i32)) {
                Some(&mapped) => mapped as i64,
                None => return,
            }
        } else {
            id
        };
        rows.push(self.nwords + id as usize);
    }

    /// Appends the bucket rows of every character n-gram of `word`
    /// (already wrapped in boundary markers). Lengths count UTF-8 characters;
    /// single-character n-grams at either boundary are skipped.
    fn compute_subwords(&self, word: &str, rows: &mut Vec<RowId>) {
        if self.bucket == 0 {
            return;
        }
        let bytes = word.as_bytes();
        let len = bytes.len();
        for i in 0..len {
            if is_utf8_continuation(bytes[i]) {
                continue;
            }
            let mut j = i;
            let mut n = 1;
            while j < len && n <= self.maxn {
                j += 1;
                while j < len && is_utf8_continuation(bytes[j]) {
                    j += 1;
                }
                if n >= self.minn && !(n == 1 && (i == 0 || j == len)) {
                    let h = hash(&bytes[i..j]) % self.bucket as u32;
                    self.push_hash(rows, h as i64);
                }
                n += 1;
            }
        }
    }

    fn add_subwords(&self, rows: &mut Vec<RowId>, token: &str, id: Option<WordId>) {
        match id {
            None => {
                if token != EOS {
                    self.compute_subwords(&wrap(token), rows);
                }
            }
            Some(id) if self.maxn == 0 => rows.push(id),
            Some(id) => rows.extend_from_slice(&self.subwords[id]),
        }
    }

    fn add_word_ngrams(&self, rows: &mut Vec<RowId>, hashes: &[i32]) {
        if self.bucket == 0 {
            return;
        }
        for i in 0..hashes.len() {
            let mut h = hashes[i] as i64 as u64;
            for &next in hashes.iter().take(i + self.word_ngrams).skip(i + 1) {
                h = h.wrapping_mul(WORD_NGRAM_MULTIPLIER).wrapping_add(next as i64 as u64);
                self.push_hash(rows, (h % self.bucket as u64) as i64);
            }
        }
    }

    /// Input rows activated by a query line: word rows, character n-grams and
    /// word n-grams. Label tokens contribute nothing.
    pub fn line_rows(&self, text: &str) -> Vec<RowId> {
        let mut rows = Vec::new();
        let mut hashes = Vec::new();
        for token in tokenize(text) {
            let id = self.get_id(token);
            if self.token_type(token, id) == EntryType::Word {
                self.add_subwords(&mut rows, token, id);
                hashes.push(hash(token.as_bytes()) as i32);
            }
        }
        self.add_word_ngrams(&mut rows, &hashes);
        rows
    }

    /// Input rows that make up a single word's vector: the stored row for a
    /// known word, its character n-gram buckets otherwise. Label strings are
    /// not words and take the n-gram path.
    pub fn word_rows(&self, word: &str) -> Vec<RowId> {
        match self.word_id(word) {
            Some(id) => vec![id],
            None => {
                let mut rows = Vec::new();
                if word != EOS {
                    self.compute_subwords(&wrap(word), &mut rows);
                }
                rows
            }
        }
    }

    /// Character n-grams of a word with their input rows, in the order they
    /// contribute to the word's vector. Pruned n-grams are left out.
    pub fn ngrams(&self, word: &str) -> Vec<(String, RowId)> {
        let mut out = Vec::new();
        if self.bucket == 0 {
            return out;
        }
        let wrapped = wrap(word);
        let mut bounds: Vec<usize> = wrapped.char_indices().map(|(i, _)| i).collect();
        bounds.push(wrapped.len());
        let chars = bounds.len() - 1;
        for start in 0..chars {
            for n in self.minn.max(1)..=self.maxn {
                let end = start + n;
                if end > chars {
                    break;
                }
                if n == 1 && (start == 0 || end == chars) {
                    continue;
                }
                let gram = &wrapped[bounds[start]..bounds[end]];
                let mut rows = Vec::with_capacity(1);
                self.push_hash(&mut rows, (hash(gram.as_bytes()) % self.bucket as u32) as i64);
                if let Some(row) = rows.pop() {
                    out.push((gram.to_string(), row));
                }
            }
        }
        out
    }
}

/// Checks the prune pairs against the declared size: one pair per kept
/// bucket, unique source buckets, targets inside `0..pruneidx_size`.
fn prune_index(pruneidx_size: i64, pairs: Vec<(i32, i32)>) -> Result<HashMap<i32, i32>> {
    let expected = usize::try_from(pruneidx_size).unwrap_or(0);
    if pairs.len() != expected {
        return Err(FastTextError::corrupt(format!(
            "prune index declares {pruneidx_size} entries, found {}",
            pairs.len()
        )));
    }
    let mut index = HashMap::with_capacity(pairs.len());
    for (from, to) in pairs {
        if to < 0 || i64::from(to) >= pruneidx_size {
            return Err(FastTextError::corrupt(format!(
                "prune index maps bucket {from} to {to}, outside 0..{pruneidx_size}"
            )));
        }
        if index.insert(from, to).is_some() {
            return Err(FastTextError::corrupt(format!("bucket {from} pruned twice")));
        }
    }
    Ok(index)
}

fn wrap(word: &str) -> String {
    let mut s = String::with_capacity(word.len() + BOW.len() + EOW.len());
    s.push_str(BOW);
    s.push_str(word);
    s.push_str(EOW);
    s
}
