use std::collections::hash_map::DefaultHasher;
use std::ffi::OsString;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Single column header of the unlabeled queue.
pub const QUEUE_HEADER: &str = "text";

/// How the crawler opens an existing queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum FileMode {
    /// Keep pending rows and add new ones after them
    #[default]
    Append,
    /// Start over from a header-only queue
    Truncate,
}

impl From<FileMode> for fs::OpenOptions {
    fn from(mode: FileMode) -> Self {
        let mut opts = fs::OpenOptions::new();
        match mode {
            FileMode::Append => opts.create(true).append(true),
            FileMode::Truncate => opts.create(true).write(true).truncate(true),
        };
        opts
    }
}

/// One pending record of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(Vec<String>);

impl Row {
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// The row's words as one whitespace-joined span.
    pub fn text(&self) -> String {
        self.0.join(" ")
    }
}

impl From<&csv::StringRecord> for Row {
    fn from(record: &csv::StringRecord) -> Self {
        Self(record.iter().map(String::from).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// CSV file of candidate words waiting to be labeled.
#[derive(Debug, Clone)]
pub struct UnlabeledQueue {
    path: PathBuf,
}

/// A queue cut in two at a row index.
#[derive(Debug)]
pub(crate) struct QueueSplit {
    pub(crate) consumed: Vec<Row>,
    pub(crate) remaining_rows: usize,
    /// Header bytes followed by the untouched bytes of every remaining row.
    pub(crate) rewritten: Vec<u8>,
    pub(crate) original_len: u64,
    pub(crate) original_hash: u64,
}

impl UnlabeledQueue {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write-ahead record of a drain of this queue, present only while the
    /// drain is unfinished.
    pub fn journal_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".drain.json");
        PathBuf::from(name)
    }

    /// Opens the queue for appending or overwriting.
    ///
    /// Refused while a drain journal is pending, since recovering that drain
    /// depends on the queue content it recorded.
    pub fn writer(&self, mode: FileMode) -> Result<QueueWriter> {
        let journal = self.journal_path();
        if journal.exists() {
            return Err(Error::PendingDrain { journal });
        }
        QueueWriter::open(&self.path, mode)
    }

    /// All pending rows, in file order. A missing queue is empty.
    pub fn rows(&self) -> Result<Vec<Row>> {
        Ok(self.split(None)?.consumed)
    }

    pub fn len(&self) -> Result<usize> {
        let split = self.split(Some(0))?;
        Ok(split.remaining_rows)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    /// Reads the first `limit` rows (all of them when `None`) and computes the
    /// file content holding only the rest.
    pub(crate) fn split(&self, limit: Option<usize>) -> Result<QueueSplit> {
        let bytes = self.read_bytes()?;
        let csv_err = |e| Error::csv(&self.path, e);

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(&bytes[..]);

        let header_end = if bytes.is_empty() {
            0
        } else {
            rdr.headers().map_err(csv_err)?;
            rdr.position().byte() as usize
        };

        let limit = limit.unwrap_or(usize::MAX);
        let mut record = csv::StringRecord::new();
        let mut consumed = vec![];
        while consumed.len() < limit && rdr.read_record(&mut record).map_err(csv_err)? {
            consumed.push(Row::from(&record));
        }
        let cut = (rdr.position().byte() as usize).min(bytes.len());

        let mut remaining_rows = 0;
        while rdr.read_record(&mut record).map_err(csv_err)? {
            remaining_rows += 1;
        }

        let mut rewritten = Vec::with_capacity(header_end + bytes.len() - cut);
        rewritten.extend_from_slice(&bytes[..header_end]);
        rewritten.extend_from_slice(&bytes[cut..]);

        Ok(QueueSplit {
            consumed,
            remaining_rows,
            rewritten,
            original_len: bytes.len() as u64,
            original_hash: fingerprint(&bytes),
        })
    }
}

/// Hash of a queue's content, recorded in drain journals.
pub(crate) fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Appends rows to the queue, writing the header when the file starts empty.
pub struct QueueWriter {
    wtr: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl QueueWriter {
    fn open(path: &Path, mode: FileMode) -> Result<Self> {
        let opts: fs::OpenOptions = mode.into();
        let file = opts.open(path).map_err(|e| Error::io(path, e))?;
        let is_empty = file.metadata().map_err(|e| Error::io(path, e))?.len() == 0;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        if is_empty {
            wtr.write_record([QUEUE_HEADER])
                .map_err(|e| Error::csv(path, e))?;
        }

        Ok(Self {
            wtr,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write_row<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.wtr
            .write_record(fields)
            .map_err(|e| Error::csv(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Writes one row per word.
    pub fn append_words<I, S>(&mut self, words: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.rows;
        for word in words {
            self.write_row([word.as_ref()])?;
        }
        Ok(self.rows - before)
    }

    /// Rows written through this writer.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.wtr
            .flush()
            .map_err(|e: io::Error| Error::io(&self.path, e))
    }
}
