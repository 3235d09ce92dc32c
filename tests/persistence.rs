mod common;

use common::{classifier, embeddings, golden_model, write_model_file};
use fasttext_core::core::dictionary::{hash, Dictionary};
use fasttext_core::core::matrix::DenseMatrix;
use fasttext_core::core::types::{Args, Entry, EntryType, LossName};
use fasttext_core::{load_model, read_model, write_model, FastText, FastTextError};

fn assert_same_model(a: &FastText, b: &FastText) {
    assert_eq!(a.args(), b.args());
    assert_eq!(a.words(), b.words());
    assert_eq!(a.labels(), b.labels());
    assert_eq!(a.dictionary().entries(), b.dictionary().entries());
    assert_eq!(a.dictionary().ntokens(), b.dictionary().ntokens());
    let bits = |m: &FastText| m.input_matrix().as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(a), bits(b));
    let out_bits =
        |m: &FastText| m.output_model().weights().as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(out_bits(a), out_bits(b));
}

#[test]
fn saved_models_load_back_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    for (file, model) in [
        ("golden.bin", golden_model(LossName::OneVsAll)),
        ("hs.bin", classifier(LossName::HierarchicalSoftmax, 0.1)),
        ("emb.bin", embeddings()),
    ] {
        let path = write_model_file(dir.path(), file, &model);
        let loaded = load_model(&path).unwrap();
        assert_same_model(&model, &loaded);
        assert_eq!(loaded.version(), 12);
        for word in ["the", "movie", "unseen", "cat"] {
            assert_eq!(model.word_vector(word), loaded.word_vector(word));
        }
    }
}

#[test]
fn queries_survive_a_round_trip() {
    let model = classifier(LossName::Softmax, 0.0);
    let mut bytes = Vec::new();
    write_model(&mut bytes, &model).unwrap();
    let loaded = read_model(&mut bytes.as_slice()).unwrap();
    for text in ["the movie was great", "awful actors", "plots"] {
        assert_eq!(model.predict(text, 3, 0.0).unwrap(), loaded.predict(text, 3, 0.0).unwrap());
    }

    let mut again = Vec::new();
    write_model(&mut again, &loaded).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn save_replaces_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model_file(dir.path(), "model.bin", &golden_model(LossName::Softmax));
    write_model_file(dir.path(), "model.bin", &embeddings());
    let loaded = load_model(&path).unwrap();
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

fn pruned_model(bucket_hash: i32) -> FastText {
    let args = Args { dim: 2, bucket: 100, minn: 2, maxn: 2, ..Args::default() };
    let entries = vec![
        Entry { word: "w".into(), count: 2, entry_type: EntryType::Word },
        Entry { word: "__label__l".into(), count: 1, entry_type: EntryType::Label },
    ];
    let dict = Dictionary::new(&args, entries, 3, 1, vec![(bucket_hash, 0)]).unwrap();
    let input = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let output = DenseMatrix::from_rows(&[vec![1.0, 1.0]]).unwrap();
    FastText::new(args, 12, dict, input, output).unwrap()
}

#[test]
fn prune_target_outside_the_kept_buckets_is_corrupt() {
    let h = (hash(b"<x") % 100) as i32;
    let model = pruned_model(h);
    let mut bytes = Vec::new();
    write_model(&mut bytes, &model).unwrap();
    assert_eq!(model.predict("x", 1, 0.0).unwrap().len(), 1);

    let mut pair = h.to_le_bytes().to_vec();
    pair.extend_from_slice(&0i32.to_le_bytes());
    let at = bytes.windows(8).rposition(|w| w == pair.as_slice()).unwrap() + 4;
    for target in [500i32, 1, -1] {
        let mut broken = bytes.clone();
        broken[at..at + 4].copy_from_slice(&target.to_le_bytes());
        let err = read_model(&mut broken.as_slice()).unwrap_err();
        assert!(matches!(err, FastTextError::CorruptModel(_)), "target {target}: {err}");
    }
}
