use std::fs;
use std::path::Path;

use furn_corpus::{load_sequences, Error, LabelStore, Row, TaggedSequence};

fn write_queue(dir: &Path, words: &[&str]) -> LabelStore {
    let queue = dir.join("furniture_data.csv");
    let mut content = String::from("text\n");
    for w in words {
        content.push_str(w);
        content.push('\n');
    }
    fs::write(&queue, content).unwrap();
    LabelStore::new(queue, dir.join("furniture_data.conll"))
}

fn tag_everything(rows: &[Row]) -> Result<Vec<TaggedSequence>, Error> {
    Ok(rows
        .iter()
        .map(|row| {
            row.text()
                .split_whitespace()
                .map(|w| (w.to_string(), "B-PRODUCT".to_string()))
                .collect()
        })
        .collect())
}

#[test]
fn three_rows_limit_two() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_queue(dir.path(), &["Ektorp", "Poang", "Billy"]);

    let report = store.drain(Some(2), tag_everything).unwrap();
    assert_eq!(report.consumed, 2);
    assert_eq!(report.sequences, 2);
    assert_eq!(report.remaining, 1);

    let remaining = store.queue().rows().unwrap();
    assert_eq!(remaining, vec![Row::from_iter(["Billy"])]);

    let labeled = load_sequences(store.labeled_path()).unwrap();
    assert_eq!(labeled.len(), 2);
    assert_eq!(labeled[0].tokens(), ["Ektorp"]);
    assert_eq!(labeled[1].tokens(), ["Poang"]);
}

#[test]
fn zero_limit_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_queue(dir.path(), &["Ektorp", "Poang"]);
    fs::write(store.labeled_path(), "Kivik B-PRODUCT\n\n").unwrap();
    let queue_before = fs::read(store.queue().path()).unwrap();

    let report = store.drain(Some(0), tag_everything).unwrap();
    assert_eq!(report.consumed, 0);
    assert_eq!(report.remaining, 2);
    assert_eq!(fs::read(store.queue().path()).unwrap(), queue_before);
    assert_eq!(
        fs::read_to_string(store.labeled_path()).unwrap(),
        "Kivik B-PRODUCT\n\n"
    );
}

#[test]
fn limit_past_the_end_leaves_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_queue(dir.path(), &["Ektorp", "Poang"]);

    let report = store.drain(Some(10), tag_everything).unwrap();
    assert_eq!(report.consumed, 2);
    assert_eq!(report.remaining, 0);
    assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\n");
    assert!(store.queue().is_empty().unwrap());
}

#[test]
fn empty_queue_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_queue(dir.path(), &[]);

    let report = store.drain(None, tag_everything).unwrap();
    assert_eq!(report.consumed, 0);
    assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\n");
    assert!(!store.labeled_path().exists());
}

#[test]
fn consumed_and_remaining_rebuild_the_queue() {
    let words = ["Malm", "Hemnes", "Kallax", "Lack", "Billy"];
    for limit in 0..=words.len() + 1 {
        let dir = tempfile::tempdir().unwrap();
        let store = write_queue(dir.path(), &words);

        let mut consumed = vec![];
        store
            .drain(Some(limit), |rows: &[Row]| {
                consumed.extend(rows.iter().cloned());
                tag_everything(rows)
            })
            .unwrap();
        let remaining = store.queue().rows().unwrap();

        assert_eq!(remaining.len(), words.len().saturating_sub(limit));
        let rebuilt = consumed
            .iter()
            .chain(remaining.iter())
            .map(Row::text)
            .collect::<Vec<_>>();
        assert_eq!(rebuilt, words);
    }
}

#[test]
fn repeated_passes_append_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_queue(dir.path(), &["Malm", "Hemnes", "Kallax"]);

    store.drain(Some(1), tag_everything).unwrap();
    store.drain(Some(1), tag_everything).unwrap();
    store.drain(Some(1), tag_everything).unwrap();
    store.drain(Some(1), tag_everything).unwrap();

    let tokens = store
        .labeled_sequences()
        .unwrap()
        .iter()
        .flat_map(|s| s.tokens().to_vec())
        .collect::<Vec<_>>();
    assert_eq!(tokens, ["Malm", "Hemnes", "Kallax"]);
}
