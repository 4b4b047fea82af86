//! Fixed-width settlement records.
//!
//! Each line of a trade-flow file is a fixed-width record. Only four columns
//! are projected; the whole line is kept alongside them.
//!
//! ```text
//! byte   0 ........ 36 ... 46 ..... 65 ..... 77 ..... 106 ..... 138 ..... 245 ..... 260
//!                   txnTime         txnAmt            orderId             merId
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::{Result, UpacpError};

const TXN_TIME: Range<usize> = 36..46;
const TXN_AMT: Range<usize> = 65..77;
const ORDER_ID: Range<usize> = 106..138;
const MER_ID: Range<usize> = 245..260;

/// Shortest line that covers every projected column.
pub const MIN_LINE_LEN: usize = 260;

// ---------------------------------------------------------------------------
// SettlementRecord
// ---------------------------------------------------------------------------

/// One settlement line, projected.
///
/// Column values are the exact bytes at their offsets (padding included),
/// decoded lossily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementRecord {
    /// `MMDD` the file was requested for.
    pub settle_date: String,
    pub txn_time: String,
    pub txn_amt: String,
    pub order_id: String,
    pub mer_id: String,
    /// The line as read, without its terminator.
    #[serde(serialize_with = "serialize_lossy")]
    pub raw: Vec<u8>,
}

impl SettlementRecord {
    /// Project `line` (without terminator).
    ///
    /// Fails with [`UpacpError::MalformedRecord`] when the line is too short
    /// to hold every column.
    pub fn parse(line: &[u8], settle_date: &str, file: &str, line_no: usize) -> Result<Self> {
        if line.len() < MIN_LINE_LEN {
            return Err(UpacpError::MalformedRecord {
                file: file.to_string(),
                line: line_no,
                reason: format!("line is {} bytes, need {}", line.len(), MIN_LINE_LEN),
            });
        }
        Ok(Self {
            settle_date: settle_date.to_string(),
            txn_time: column(line, TXN_TIME),
            txn_amt: column(line, TXN_AMT),
            order_id: column(line, ORDER_ID),
            mer_id: column(line, MER_ID),
            raw: line.to_vec(),
        })
    }

    /// Amount in fen, when the column holds digits.
    pub fn amount_fen(&self) -> Option<u64> {
        self.txn_amt.trim().parse().ok()
    }

    /// Order id without column padding.
    pub fn order_id_trimmed(&self) -> &str {
        self.order_id.trim()
    }
}

fn column(line: &[u8], range: Range<usize>) -> String {
    String::from_utf8_lossy(&line[range]).into_owned()
}

fn serialize_lossy<S: Serializer>(raw: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(raw))
}

// ---------------------------------------------------------------------------
// RecordReader
// ---------------------------------------------------------------------------

/// Streams records out of one settlement file.
///
/// Yields one item per line: a record, or a `MalformedRecord` error for a
/// short line. Reading continues after a malformed line. An I/O error is
/// yielded once and ends the stream.
pub struct RecordReader<R> {
    reader: R,
    file: String,
    settle_date: String,
    line_no: usize,
    line_len: usize,
    buf: Vec<u8>,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open `path` for reading. The file name is used in error reports.
    pub fn open(path: &Path, settle_date: &str) -> Result<Self> {
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(BufReader::new(file), name, settle_date))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, file: impl Into<String>, settle_date: impl Into<String>) -> Self {
        Self {
            reader,
            file: file.into(),
            settle_date: settle_date.into(),
            line_no: 0,
            line_len: 0,
            buf: Vec::with_capacity(512),
            done: false,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file
    }

    /// Byte length, without terminator, of the line last yielded.
    pub fn last_line_len(&self) -> usize {
        self.line_len
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<SettlementRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line_no += 1;
                let line = trim_terminator(&self.buf);
                self.line_len = line.len();
                Some(SettlementRecord::parse(line, &self.settle_date, &self.file, self.line_no))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

fn trim_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

// ---------------------------------------------------------------------------
// SettlementBatch
// ---------------------------------------------------------------------------

/// A line that could not be projected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub file: String,
    /// 1-based.
    pub line: usize,
    /// Byte length without terminator.
    pub length: usize,
}

/// Everything parsed out of one settlement run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlementBatch {
    /// Records in file order, then line order.
    pub records: Vec<SettlementRecord>,
    pub skipped: Vec<SkippedLine>,
}

impl SettlementBatch {
    /// Parse every file in `files`, in order.
    ///
    /// Malformed lines are logged and collected in `skipped`; I/O errors
    /// abort the batch.
    pub fn read_files(files: &[PathBuf], settle_date: &str) -> Result<Self> {
        let mut batch = Self::default();
        for path in files {
            batch.extend_from(RecordReader::open(path, settle_date)?)?;
        }
        Ok(batch)
    }

    /// Drain `reader` into the batch.
    pub fn extend_from<R: BufRead>(&mut self, mut reader: RecordReader<R>) -> Result<()> {
        while let Some(item) = reader.next() {
            match item {
                Ok(record) => self.records.push(record),
                Err(UpacpError::MalformedRecord { file, line, reason }) => {
                    tracing::warn!(%file, line, %reason, "skipping malformed settlement line");
                    let length = reader.last_line_len();
                    self.skipped.push(SkippedLine { file, line, length });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.skipped.is_empty()
    }
}
