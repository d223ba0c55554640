use std::io::Cursor;
use std::thread;

use tokio::sync::mpsc;

use wordembed::corpus::{CooccurrenceOptions, Corpus, CorpusOptions, CountType};
use wordembed::Error;

fn options(min_count: u64, in_memory: bool) -> CorpusOptions {
    CorpusOptions {
        min_count,
        doc_in_memory: in_memory,
        ..Default::default()
    }
}

#[test]
fn dictionary_counts_in_order_of_appearance() {
    let corpus = Corpus::load(Cursor::new("a b a c b a"), &options(1, true), None).unwrap();
    let dic = corpus.dictionary();
    assert_eq!(dic.words().collect::<Vec<_>>(), ["a", "b", "c"]);
    assert_eq!(dic.id_freq(0), 3);
    assert_eq!(dic.total_freq(), 6);
    assert_eq!(corpus.len(), 6);
    assert_eq!(*corpus.indexed_doc().unwrap(), vec![0, 1, 0, 2, 1, 0]);
    assert!(corpus.cooccurrence().is_none());
}

#[test]
fn min_and_max_count() {
    let opts = CorpusOptions {
        max_count: Some(2),
        ..options(2, true)
    };
    let corpus = Corpus::load(Cursor::new("a b a c b a"), &opts, None).unwrap();
    assert_eq!(corpus.dictionary().words().collect::<Vec<_>>(), ["b"]);
    assert_eq!(*corpus.indexed_doc().unwrap(), vec![0, 0]);
}

#[test]
fn lower_case() {
    let opts = CorpusOptions {
        to_lower: true,
        ..options(1, true)
    };
    let corpus = Corpus::load(Cursor::new("Dog dog DOG"), &opts, None).unwrap();
    assert_eq!(corpus.dictionary().len(), 1);
    assert_eq!(corpus.dictionary().id_freq(0), 3);
}

#[test]
fn empty_vocabulary() {
    assert!(matches!(
        Corpus::load(Cursor::new(""), &options(1, true), None),
        Err(Error::EmptyVocabulary)
    ));
    assert!(matches!(
        Corpus::load(Cursor::new("a b"), &options(2, false), None),
        Err(Error::EmptyVocabulary)
    ));
}

#[test]
fn cooccurrence_in_both_modes() {
    let cooc = CooccurrenceOptions {
        count_type: CountType::Increment,
        window: 1,
    };
    for in_memory in [true, false] {
        let corpus = Corpus::load(Cursor::new("a b a c"), &options(1, in_memory), Some(cooc)).unwrap();
        let counts = corpus.cooccurrence().unwrap();
        // a-b twice, b-a once, a-c once
        assert!(counts.get(0, 1) + counts.get(1, 0) > 0.0);
        assert!(counts.get(0, 2) + counts.get(2, 0) > 0.0);
        assert_eq!(counts.get(1, 2) + counts.get(2, 1), 0.0);
    }
}

#[test]
fn streaming_batches() {
    let corpus = Corpus::load(Cursor::new("a b x a c b a"), &options(2, false), None).unwrap();
    assert!(corpus.indexed_doc().is_none());
    assert_eq!(corpus.len(), 5);

    let batcher = corpus.batcher();
    for _ in 0..2 {
        let (tx, mut rx) = mpsc::channel(1);
        let b = batcher.clone();
        let producer = thread::spawn(move || b.batch_words(tx, 2));
        let mut batches = vec![];
        while let Some(batch) = rx.blocking_recv() {
            batches.push(batch);
        }
        producer.join().unwrap().unwrap();
        assert_eq!(batches, vec![vec![0, 1], vec![0, 1], vec![0]]);
    }
}
