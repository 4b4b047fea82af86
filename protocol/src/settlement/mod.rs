//! # Settlement Files
//!
//! Turns the `fileContent` of a verified file-transfer response into
//! settlement records.
//!
//! ```text
//! fileContent ─► base64 ─► zlib ─► ZIP ─► <work_dir>/<prefix><year><MMDD>/
//!                                              │
//!                          accept_file(name, merId)
//!                                              │
//!                           fixed-width lines ─► SettlementBatch
//! ```
//!
//! ```text
//! flow.rs    : trade-flow markers and file acceptance
//! archive.rs : decode, stage, extract, clean up
//! record.rs  : fixed-width record projection and streaming reader
//! ```

pub mod archive;
pub mod flow;
pub mod record;

pub use archive::{decode_file_content, extract, extraction_dir, ExtractedArchive};
pub use flow::{accept_file, TradeFlowType};
pub use record::{RecordReader, SettlementBatch, SettlementRecord, SkippedLine, MIN_LINE_LEN};

use crate::config::SettlementConfig;
use crate::error::Result;

/// Run everything after verification: decode, extract into the per-date
/// directory for `year`, keep the merchant's trade-flow files, parse them.
pub fn ingest(
    file_content: &str,
    settle_date: &str,
    merchant_id: &str,
    config: &SettlementConfig,
    year: i32,
) -> Result<SettlementBatch> {
    let zipped = decode_file_content(file_content)?;
    let dir = extraction_dir(config, year, settle_date);
    let extracted = extract(&zipped, &dir)?;

    let files = extracted.accepted_files(merchant_id);
    tracing::info!(
        dir = %extracted.dir.display(),
        entries = extracted.entries.len(),
        accepted = files.len(),
        "settlement archive unpacked"
    );

    let batch = SettlementBatch::read_files(&files, settle_date)?;
    if !batch.skipped.is_empty() {
        tracing::warn!(skipped = batch.skipped.len(), "settlement lines skipped");
    }
    Ok(batch)
}
