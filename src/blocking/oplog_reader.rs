//! Read oplog entries out of a stream of concatenated bson documents, which is what
//! `mongodump --db local --collection oplog.rs` writes.

use bson::Document;
use std::io::{ErrorKind, Read};

use crate::error::{ConvertError, ReplayError, Result};

/// smallest valid bson document: length prefix + trailing nul.
const MIN_DOC_SIZE: i32 = 5;
/// mongodb documents are limited to 16MB, oplog entries get a little headroom on top of that.
const MAX_DOC_SIZE: i32 = 16 * 1024 * 1024 + 16 * 1024;

/// Iterate raw oplog entries one by one, never buffering more than one document.
pub struct OplogReader<R> {
    reader: R,
    entry: u64,
}

impl<R: Read> OplogReader<R> {
    /// create a reader positioned at the start of an oplog stream.
    pub fn new(reader: R) -> Self {
        OplogReader { reader, entry: 0 }
    }

    /// number of entries read so far.
    pub fn entries_read(&self) -> u64 {
        self.entry
    }

    /// Read next entry, `Ok(None)` means the stream ends cleanly between two documents.
    pub fn next_entry(&mut self) -> Result<Option<Document>> {
        let mut len_buf = [0u8; 4];
        let read = read_full(&mut self.reader, &mut len_buf)?;
        if read == 0 {
            return Ok(None);
        }
        let entry = self.entry + 1;
        if read < len_buf.len() {
            return Err(ReplayError::TruncatedEntry {
                entry,
                expected: len_buf.len(),
                actual: read,
            });
        }

        let len = i32::from_le_bytes(len_buf);
        if !(MIN_DOC_SIZE..=MAX_DOC_SIZE).contains(&len) {
            return Err(ReplayError::InvalidEntryLength { entry, len });
        }

        let mut buf = vec![0u8; len as usize];
        buf[..4].copy_from_slice(&len_buf);
        let read = read_full(&mut self.reader, &mut buf[4..])?;
        if read < buf.len() - 4 {
            return Err(ReplayError::TruncatedEntry {
                entry,
                expected: buf.len(),
                actual: read + 4,
            });
        }

        let mut raw = buf.as_slice();
        let doc = Document::from_reader(&mut raw).map_err(|e| ReplayError::MalformedEntry {
            entry,
            source: ConvertError::MalformedDocument(e.to_string()),
        })?;
        self.entry = entry;
        Ok(Some(doc))
    }
}

impl<R: Read> Iterator for OplogReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Like `read_exact`, but reports how many bytes were read when the stream ends early.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
