//! Settlement archive decoding and extraction.
//!
//! `fileContent` is base64 text wrapping a zlib stream wrapping a ZIP
//! archive. The archive is staged in a uniquely named temporary file inside
//! the per-date directory, extracted next to it, and the temporary file is
//! removed whether or not extraction succeeded.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use zip::ZipArchive;

use crate::config::{SettlementConfig, TEMP_ARCHIVE_PREFIX};
use crate::error::{Result, UpacpError};

use super::flow::accept_file;

/// Recover the ZIP bytes from a `fileContent` value.
pub fn decode_file_content(content: &str) -> Result<Vec<u8>> {
    let repaired = content.trim().replace(' ', "+");
    let deflated = STANDARD
        .decode(repaired.as_bytes())
        .map_err(|e| UpacpError::Archive(format!("fileContent is not valid base64: {}", e)))?;

    let mut zipped = Vec::with_capacity(deflated.len() * 4);
    ZlibDecoder::new(deflated.as_slice())
        .read_to_end(&mut zipped)
        .map_err(|e| UpacpError::Archive(format!("zlib inflate failed: {}", e)))?;
    Ok(zipped)
}

/// `<work_dir>/<dir_prefix><year><settle_date>`.
pub fn extraction_dir(config: &SettlementConfig, year: i32, settle_date: &str) -> PathBuf {
    config
        .work_dir
        .join(format!("{}{}{}", config.dir_prefix, year, settle_date))
}

/// Result of unpacking one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    pub dir: PathBuf,
    /// File entries in archive order, as named inside the archive.
    pub entries: Vec<String>,
}

impl ExtractedArchive {
    /// Paths of the trade-flow files that belong to `merchant_id`.
    pub fn accepted_files(&self, merchant_id: &str) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|name| accept_file(name, merchant_id))
            .map(|name| self.dir.join(name))
            .collect()
    }
}

/// Stage `zip_bytes` in `dir` and extract the archive into `dir`.
pub fn extract(zip_bytes: &[u8], dir: &Path) -> Result<ExtractedArchive> {
    fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(TEMP_ARCHIVE_PREFIX)
        .suffix(".zip")
        .tempfile_in(dir)?;
    staged.write_all(zip_bytes)?;
    staged.flush()?;
    tracing::debug!(path = %staged.path().display(), bytes = zip_bytes.len(), "staged settlement archive");

    // `staged` is deleted on drop if anything below fails.
    let entries = unpack(staged.reopen()?, dir)?;
    tracing::debug!(dir = %dir.display(), entries = ?entries, "settlement archive extracted");

    staged.close()?;
    tracing::debug!("staged archive removed");

    Ok(ExtractedArchive {
        dir: dir.to_path_buf(),
        entries,
    })
}

fn unpack(file: File, dir: &Path) -> Result<Vec<String>> {
    let mut archive =
        ZipArchive::new(file).map_err(|e| UpacpError::Archive(format!("not a ZIP archive: {}", e)))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| UpacpError::Archive(format!("unreadable ZIP entry {}: {}", i, e)))?;
        if entry.is_file() {
            entries.push(entry.name().to_string());
        }
    }

    archive
        .extract(dir)
        .map_err(|e| UpacpError::Archive(format!("extraction failed: {}", e)))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{settlement_file_content, TEST_MERCHANT_ID};

    fn staged_archives(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TEMP_ARCHIVE_PREFIX))
            })
            .collect()
    }

    #[test]
    fn extraction_dir_layout() {
        let config = SettlementConfig {
            work_dir: PathBuf::from("/var/upacp"),
            dir_prefix: "unionpay_".into(),
        };
        assert_eq!(
            extraction_dir(&config, 2026, "1016"),
            PathBuf::from("/var/upacp/unionpay_20261016")
        );
    }

    #[test]
    fn decode_and_extract_filters_by_merchant() {
        let content = settlement_file_content(&[
            ("INN26101688ZM_700000000000001", b"a\n"),
            ("INN26101688ZM_999999999999999", b"b\n"),
            ("README.txt", b"c\n"),
        ]);
        // Form decoding may have turned `+` into spaces.
        let content = content.replace('+', " ");

        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("unionpay_20261016");
        let zipped = decode_file_content(&content).unwrap();
        let extracted = extract(&zipped, &dir).unwrap();

        assert_eq!(extracted.entries.len(), 3);
        let accepted = extracted.accepted_files(TEST_MERCHANT_ID);
        assert_eq!(accepted, vec![dir.join("INN26101688ZM_700000000000001")]);
        assert_eq!(fs::read(&accepted[0]).unwrap(), b"a\n");
        assert!(staged_archives(&dir).is_empty());
    }

    #[test]
    fn concurrent_extractions_share_a_directory() {
        let first = decode_file_content(&settlement_file_content(&[(
            "INN26101688ZM_700000000000001",
            b"first\n",
        )]))
        .unwrap();
        let second = decode_file_content(&settlement_file_content(&[(
            "INN26101699PED_700000000000001",
            b"second\n",
        )]))
        .unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("unionpay_20261016");
        let barrier = std::sync::Barrier::new(2);

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| {
                barrier.wait();
                extract(&first, &dir)
            });
            let b = s.spawn(|| {
                barrier.wait();
                extract(&second, &dir)
            });
            (a.join().unwrap(), b.join().unwrap())
        });

        assert_eq!(a.unwrap().entries, vec!["INN26101688ZM_700000000000001"]);
        assert_eq!(b.unwrap().entries, vec!["INN26101699PED_700000000000001"]);
        assert_eq!(fs::read(dir.join("INN26101688ZM_700000000000001")).unwrap(), b"first\n");
        assert_eq!(fs::read(dir.join("INN26101699PED_700000000000001")).unwrap(), b"second\n");
        assert!(staged_archives(&dir).is_empty());
    }

    #[test]
    fn corrupt_archive_fails_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("unionpay_20261016");
        let err = extract(b"definitely not a zip", &dir).unwrap_err();
        assert!(matches!(err, UpacpError::Archive(_)));
        assert!(staged_archives(&dir).is_empty());
    }

    #[test]
    fn bad_base64_and_bad_zlib_are_archive_errors() {
        assert!(matches!(
            decode_file_content("%%%"),
            Err(UpacpError::Archive(_))
        ));
        assert!(matches!(
            decode_file_content(&STANDARD.encode(b"not zlib")),
            Err(UpacpError::Archive(_))
        ));
    }
}
