use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conll::{load_sequences, write_sequence, TaggedSequence};
use crate::error::{Error, Result};
use crate::queue::{fingerprint, QueueSplit, Row, UnlabeledQueue};

/// Write-ahead record of a drain in progress.
///
/// Written before the labeled file is touched and removed once the queue has
/// been replaced. Its presence on startup means the previous drain stopped
/// somewhere in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DrainJournal {
    labeled_len_before: u64,
    queue_len_before: u64,
    queue_hash_before: u64,
    queue_len_after: u64,
    queue_hash_after: u64,
    rows: usize,
}

impl DrainJournal {
    fn new(split: &QueueSplit, labeled_len_before: u64) -> Self {
        Self {
            labeled_len_before,
            queue_len_before: split.original_len,
            queue_hash_before: split.original_hash,
            queue_len_after: split.rewritten.len() as u64,
            queue_hash_after: fingerprint(&split.rewritten),
            rows: split.consumed.len(),
        }
    }

    /// Whether the queue holds exactly the pre-drain (`Before`) or post-drain
    /// (`After`) content, or starts with it and got rows appended since.
    fn queue_state(&self, queue: &[u8]) -> Option<QueueState> {
        let starts_with = |len: u64, hash: u64| {
            usize::try_from(len)
                .ok()
                .and_then(|len| queue.get(..len))
                .is_some_and(|prefix| fingerprint(prefix) == hash)
        };
        let len = queue.len() as u64;
        let after = starts_with(self.queue_len_after, self.queue_hash_after);
        let before = starts_with(self.queue_len_before, self.queue_hash_before);

        if after && len == self.queue_len_after {
            Some(QueueState::After)
        } else if before && len == self.queue_len_before {
            Some(QueueState::Before)
        } else if after {
            Some(QueueState::After)
        } else if before {
            Some(QueueState::Before)
        } else {
            None
        }
    }
}

enum QueueState {
    Before,
    After,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Rows taken off the head of the queue
    pub consumed: usize,
    /// Non-empty sequences appended to the labeled file
    pub sequences: usize,
    /// Rows left in the queue
    pub remaining: usize,
}

/// The unlabeled queue paired with the labeled CoNLL file it feeds.
///
/// Only one process may drain or append to a given store at a time.
#[derive(Debug, Clone)]
pub struct LabelStore {
    queue: UnlabeledQueue,
    labeled: PathBuf,
}

impl LabelStore {
    pub fn new<Q, L>(queue: Q, labeled: L) -> Self
    where
        Q: Into<PathBuf>,
        L: Into<PathBuf>,
    {
        Self {
            queue: UnlabeledQueue::new(queue),
            labeled: labeled.into(),
        }
    }

    pub fn queue(&self) -> &UnlabeledQueue {
        &self.queue
    }

    pub fn labeled_path(&self) -> &Path {
        &self.labeled
    }

    pub fn journal_path(&self) -> PathBuf {
        self.queue.journal_path()
    }

    pub fn has_pending_drain(&self) -> bool {
        self.journal_path().exists()
    }

    /// Every labeled sequence so far. A missing labeled file is empty.
    pub fn labeled_sequences(&self) -> Result<Vec<TaggedSequence>> {
        if !self.labeled.exists() {
            return Ok(vec![]);
        }
        load_sequences(&self.labeled)
    }

    /// Takes the first `limit` rows of the queue (all when `None`), hands them
    /// to `label`, appends the returned sequences to the labeled file and
    /// rewrites the queue with only the rows at or past `limit`.
    ///
    /// Nothing is written if `label` fails.
    pub fn drain<F, E>(&self, limit: Option<usize>, label: F) -> std::result::Result<DrainReport, E>
    where
        F: FnOnce(&[Row]) -> std::result::Result<Vec<TaggedSequence>, E>,
        E: From<Error>,
    {
        self.recover()?;

        let split = self.queue.split(limit)?;
        let remaining = split.remaining_rows;
        if split.consumed.is_empty() {
            if self.queue.path().exists() {
                self.replace_queue(&split)?;
            }
            log::info!("No rows to drain from {}", self.queue.path().display());
            return Ok(DrainReport {
                remaining,
                ..Default::default()
            });
        }

        let sequences = label(&split.consumed)?;

        let mut block = vec![];
        let mut appended = 0;
        for seq in sequences.iter().filter(|s| !s.is_empty()) {
            write_sequence(&mut block, seq).map_err(|e| Error::io(&self.labeled, e))?;
            appended += 1;
        }

        let journal = DrainJournal::new(&split, file_len(&self.labeled)?);
        self.write_journal(&journal)?;
        self.append_labeled(&block, journal.labeled_len_before)?;
        self.replace_queue(&split)?;
        self.clear_journal()?;

        let report = DrainReport {
            consumed: split.consumed.len(),
            sequences: appended,
            remaining,
        };
        log::info!(
            "Drained {} rows into {} sequences, {} rows remaining",
            report.consumed,
            report.sequences,
            report.remaining
        );
        Ok(report)
    }

    /// Finishes or undoes an interrupted drain. Returns whether a journal was
    /// found.
    ///
    /// If the queue was already replaced the drain is complete and only the
    /// journal is removed. If it still holds its pre-drain content the labeled
    /// file is cut back to its length before the drain, so the same rows can
    /// be labeled again without duplicates. Rows appended after either state
    /// are kept. A queue matching neither is an error and the journal stays.
    pub fn recover(&self) -> Result<bool> {
        let path = self.journal_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&path, e)),
        };
        let journal: DrainJournal =
            serde_json::from_slice(&bytes).map_err(|e| Error::json(&path, e))?;

        let queue = self.queue.read_bytes()?;
        match journal.queue_state(&queue) {
            Some(QueueState::After) => log::warn!(
                "Previous drain of {} rows completed, clearing {}",
                journal.rows,
                path.display()
            ),
            Some(QueueState::Before) => self.roll_back(&journal)?,
            None => {
                log::error!(
                    "Queue {} matches neither side of the drain in {}",
                    self.queue.path().display(),
                    path.display()
                );
                return Err(Error::UnresolvedDrain { journal: path });
            }
        }

        self.clear_journal()?;
        Ok(true)
    }

    fn roll_back(&self, journal: &DrainJournal) -> Result<()> {
        log::warn!(
            "Previous drain of {} rows interrupted, rolling {} back to {} bytes",
            journal.rows,
            self.labeled.display(),
            journal.labeled_len_before
        );
        if file_len(&self.labeled)? > journal.labeled_len_before {
            let file = OpenOptions::new()
                .write(true)
                .open(&self.labeled)
                .map_err(|e| Error::io(&self.labeled, e))?;
            file.set_len(journal.labeled_len_before)
                .and_then(|()| file.sync_all())
                .map_err(|e| Error::io(&self.labeled, e))?;
        }
        Ok(())
    }

    fn write_journal(&self, journal: &DrainJournal) -> Result<()> {
        let path = self.journal_path();
        let json = serde_json::to_vec(journal).map_err(|e| Error::json(&path, e))?;
        let mut file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        file.write_all(&json)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io(&path, e))
    }

    fn clear_journal(&self) -> Result<()> {
        let path = self.journal_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    fn append_labeled(&self, block: &[u8], current_len: u64) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        let io_err = |e| Error::io(&self.labeled, e);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.labeled)
            .map_err(io_err)?;

        let separator: &[u8] = match tail(&mut file, current_len).map_err(io_err)? {
            Tail::Empty | Tail::BlankLine => b"",
            Tail::Newline => b"\n",
            Tail::Text => b"\n\n",
        };

        file.write_all(separator)
            .and_then(|()| file.write_all(block))
            .and_then(|()| file.sync_all())
            .map_err(io_err)
    }

    fn replace_queue(&self, split: &QueueSplit) -> Result<()> {
        let path = self.queue.path();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(&split.rewritten)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }
}

/// How the labeled file currently ends.
enum Tail {
    Empty,
    BlankLine,
    Newline,
    Text,
}

fn tail(file: &mut File, len: u64) -> std::io::Result<Tail> {
    if len == 0 {
        return Ok(Tail::Empty);
    }
    let n = len.min(2);
    file.seek(SeekFrom::Start(len - n))?;
    let mut buf = [0u8; 2];
    let buf = &mut buf[..n as usize];
    file.read_exact(buf)?;
    Ok(match buf {
        [b'\n', b'\n'] | [b'\n'] => Tail::BlankLine,
        [_, b'\n'] => Tail::Newline,
        _ => Tail::Text,
    })
}

fn file_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FileMode;

    fn store_with(queue: &str, labeled: Option<&str>) -> (tempfile::TempDir, LabelStore) {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("queue.csv");
        let labeled_path = dir.path().join("labeled.conll");
        fs::write(&queue_path, queue).unwrap();
        if let Some(labeled) = labeled {
            fs::write(&labeled_path, labeled).unwrap();
        }
        (dir, LabelStore::new(queue_path, labeled_path))
    }

    fn all_outside(rows: &[Row]) -> std::result::Result<Vec<TaggedSequence>, Error> {
        Ok(rows
            .iter()
            .map(|row| row.fields().iter().map(|w| (w.as_str(), "O")).collect())
            .collect())
    }

    #[test]
    fn blank_line_is_inserted_before_unterminated_sequence() {
        let (_dir, store) = store_with("text\nSofa\n", Some("Malm B-PRODUCT"));
        store.drain(None, all_outside).unwrap();
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Malm B-PRODUCT\n\nSofa O\n\n"
        );

        let (_dir, store) = store_with("text\nSofa\n", Some("Malm B-PRODUCT\n"));
        store.drain(None, all_outside).unwrap();
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Malm B-PRODUCT\n\nSofa O\n\n"
        );
    }

    #[test]
    fn empty_sequences_are_not_written() {
        let (_dir, store) = store_with("text\nSofa\nMalm\n", None);
        let report = store
            .drain(Some(2), |_rows: &[Row]| {
                Ok::<_, Error>(vec![TaggedSequence::default(); 2])
            })
            .unwrap();
        assert_eq!(report.consumed, 2);
        assert_eq!(report.sequences, 0);
        assert!(!store.labeled_path().exists());
        assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\n");
    }

    #[test]
    fn failed_labeling_leaves_files_alone() {
        let (_dir, store) = store_with("text\nSofa\n", Some("Malm B-PRODUCT\n\n"));
        let res = store.drain(Some(1), |_rows: &[Row]| {
            Err::<Vec<TaggedSequence>, _>(Error::LabelSetMismatch {
                expected: vec![],
                found: vec![],
            })
        });
        assert!(res.is_err());
        assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\nSofa\n");
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Malm B-PRODUCT\n\n"
        );
        assert!(!store.has_pending_drain());
    }

    #[test]
    fn crash_before_queue_rewrite_is_rolled_back() {
        let (_dir, store) = store_with("text\nSofa\nMalm\n", Some("Kivik B-PRODUCT\n\n"));

        // Replay a drain that stopped right after appending its labels.
        let split = store.queue().split(Some(1)).unwrap();
        let journal = DrainJournal::new(&split, file_len(store.labeled_path()).unwrap());
        store.write_journal(&journal).unwrap();
        store
            .append_labeled(b"Sofa O\n\n", journal.labeled_len_before)
            .unwrap();
        assert!(store.has_pending_drain());

        assert!(store.recover().unwrap());
        assert!(!store.has_pending_drain());
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Kivik B-PRODUCT\n\n"
        );

        // Running again labels the row exactly once.
        store.drain(Some(1), all_outside).unwrap();
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Kivik B-PRODUCT\n\nSofa O\n\n"
        );
        assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\nMalm\n");
    }

    #[test]
    fn crash_after_queue_rewrite_is_rolled_forward() {
        let (_dir, store) = store_with("text\nSofa\nMalm\n", None);

        let split = store.queue().split(Some(1)).unwrap();
        let journal = DrainJournal::new(&split, 0);
        store.write_journal(&journal).unwrap();
        store.append_labeled(b"Sofa O\n\n", 0).unwrap();
        store.replace_queue(&split).unwrap();

        assert!(store.recover().unwrap());
        assert_eq!(fs::read_to_string(store.labeled_path()).unwrap(), "Sofa O\n\n");
        assert_eq!(fs::read_to_string(store.queue().path()).unwrap(), "text\nMalm\n");
        assert!(!store.recover().unwrap());
    }

    fn append_to_queue(store: &LabelStore, rows: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.queue().path())
            .unwrap();
        file.write_all(rows.as_bytes()).unwrap();
    }

    /// Replays a drain of one row that stopped before its journal was removed.
    fn interrupted_drain(store: &LabelStore, replaced: bool) {
        let split = store.queue().split(Some(1)).unwrap();
        let journal = DrainJournal::new(&split, file_len(store.labeled_path()).unwrap());
        store.write_journal(&journal).unwrap();
        store
            .append_labeled(b"Malm O\n\n", journal.labeled_len_before)
            .unwrap();
        if replaced {
            store.replace_queue(&split).unwrap();
        }
    }

    #[test]
    fn completed_drain_keeps_labels_when_rows_were_appended_since() {
        let (_dir, store) = store_with("text\nMalm\nHemnes\n", None);
        interrupted_drain(&store, true);
        append_to_queue(&store, "Kallax\n");

        assert!(store.recover().unwrap());
        assert_eq!(fs::read_to_string(store.labeled_path()).unwrap(), "Malm O\n\n");
        assert_eq!(
            fs::read_to_string(store.queue().path()).unwrap(),
            "text\nHemnes\nKallax\n"
        );
        assert!(!store.has_pending_drain());
    }

    #[test]
    fn interrupted_drain_rolls_back_and_keeps_appended_rows() {
        let (_dir, store) = store_with("text\nMalm\nHemnes\n", Some("Kivik B-PRODUCT\n\n"));
        interrupted_drain(&store, false);
        append_to_queue(&store, "Kallax\n");

        assert!(store.recover().unwrap());
        assert_eq!(
            fs::read_to_string(store.labeled_path()).unwrap(),
            "Kivik B-PRODUCT\n\n"
        );
        assert_eq!(
            fs::read_to_string(store.queue().path()).unwrap(),
            "text\nMalm\nHemnes\nKallax\n"
        );
    }

    #[test]
    fn rewritten_queue_leaves_the_drain_unresolved() {
        let (_dir, store) = store_with("text\nMalm\nHemnes\n", None);
        interrupted_drain(&store, true);
        fs::write(store.queue().path(), "text\nBilly\n").unwrap();

        let err = store.recover().unwrap_err();
        assert!(matches!(err, Error::UnresolvedDrain { .. }), "{err}");
        assert!(store.has_pending_drain());
        assert_eq!(fs::read_to_string(store.labeled_path()).unwrap(), "Malm O\n\n");
        assert!(store.drain(None, all_outside).is_err());
    }

    #[test]
    fn queue_writer_waits_for_pending_drain() {
        let (_dir, store) = store_with("text\nMalm\nHemnes\n", None);
        interrupted_drain(&store, true);

        let err = store.queue().writer(FileMode::Append).err().unwrap();
        assert!(matches!(err, Error::PendingDrain { .. }), "{err}");

        store.recover().unwrap();
        let mut wtr = store.queue().writer(FileMode::Append).unwrap();
        wtr.append_words(["Kallax"]).unwrap();
        wtr.flush().unwrap();
        assert_eq!(
            fs::read_to_string(store.queue().path()).unwrap(),
            "text\nHemnes\nKallax\n"
        );
        assert_eq!(fs::read_to_string(store.labeled_path()).unwrap(), "Malm O\n\n");
    }
}
