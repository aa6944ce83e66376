//! Append-only frame log backing one ordered table
//!
//! No pages and no in-place updates: every change is a frame appended to
//! the table's log, and recovery replays the log in order.
//!
//! ```text
//! Frame:   [4-byte length][payload][4-byte checksum]
//! Payload: [op u8][key len u32][key][data len u32][data]
//!          data len u32::MAX = no data
//! ```
//!
//! Recovery stops at the first frame that is short or fails its checksum;
//! everything after it is treated as a torn tail and cut off.

use super::code;
use crate::codec::{Reader, Writer};
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;
const OP_TRUNCATE: u8 = 3;

const NO_DATA: u32 = u32::MAX;

/// One logged change
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LogOp {
    Put { key: Vec<u8>, data: Vec<u8> },
    /// Delete a key, or one duplicate of it when `data` is given
    Delete { key: Vec<u8>, data: Option<Vec<u8>> },
    Truncate,
}

fn checksum(payload: &[u8]) -> u32 {
    payload.iter().fold(0u32, |acc, &b| acc.rotate_left(5) ^ u32::from(b))
}

impl LogOp {
    fn payload_size(&self) -> usize {
        match self {
            LogOp::Put { key, data } => 1 + 4 + key.len() + 4 + data.len(),
            LogOp::Delete { key, data } => 1 + 4 + key.len() + 4 + data.as_ref().map_or(0, Vec::len),
            LogOp::Truncate => 1,
        }
    }

    /// Encode as a complete frame
    pub(crate) fn to_frame(&self) -> Result<Vec<u8>> {
        let len = self.payload_size();
        let mut frame = vec![0u8; len + 8];
        {
            let mut w = Writer::new(&mut frame[..len + 4]);
            w.put(&(len as u32))?;
            match self {
                LogOp::Put { key, data } => {
                    w.put(&OP_PUT)?;
                    w.put(&(key.len() as u32))?;
                    w.put_bytes(key)?;
                    w.put(&(data.len() as u32))?;
                    w.put_bytes(data)?;
                }
                LogOp::Delete { key, data } => {
                    w.put(&OP_DELETE)?;
                    w.put(&(key.len() as u32))?;
                    w.put_bytes(key)?;
                    match data {
                        Some(data) => {
                            w.put(&(data.len() as u32))?;
                            w.put_bytes(data)?;
                        }
                        None => w.put(&NO_DATA)?,
                    }
                }
                LogOp::Truncate => w.put(&OP_TRUNCATE)?,
            }
        }
        let sum = checksum(&frame[4..len + 4]);
        frame[len + 4..].copy_from_slice(&sum.to_le_bytes());
        Ok(frame)
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let op = r.get::<u8>()?;
        if op == OP_TRUNCATE {
            return Ok(LogOp::Truncate);
        }

        let klen = r.get::<u32>()? as usize;
        let key = r.take(klen)?.to_vec();
        let dlen = r.get::<u32>()?;
        let data = if dlen == NO_DATA {
            None
        } else {
            Some(r.take(dlen as usize)?.to_vec())
        };

        match (op, data) {
            (OP_PUT, Some(data)) => Ok(LogOp::Put { key, data }),
            (OP_DELETE, data) => Ok(LogOp::Delete { key, data }),
            _ => Err(Error::engine(code::CORRUPT, format!("unknown log op {}", op))),
        }
    }
}

/// Log file of one table
pub(crate) struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Read every intact frame; cuts a torn tail unless `readonly`
    pub(crate) fn replay(&self, readonly: bool) -> Result<Vec<LogOp>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No table log found, starting empty");
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut ops = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            // payload plus checksum must fit in what is left of the file
            let remaining = file_len.saturating_sub(valid_len + 4);
            if len as u64 + 4 > remaining {
                warn!(
                    path = ?self.path,
                    offset = valid_len,
                    len,
                    remaining,
                    "Frame length runs past end of log"
                );
                break;
            }
            let mut rest = vec![0u8; len + 4];
            if let Err(e) = reader.read_exact(&mut rest) {
                warn!(path = ?self.path, "Torn frame at end of log: {}", e);
                break;
            }

            let stored = u32::from_le_bytes([rest[len], rest[len + 1], rest[len + 2], rest[len + 3]]);
            if stored != checksum(&rest[..len]) {
                warn!(path = ?self.path, offset = valid_len, "Checksum mismatch, ignoring log tail");
                break;
            }

            match LogOp::from_payload(&rest[..len]) {
                Ok(op) => ops.push(op),
                Err(e) => {
                    warn!(path = ?self.path, "Failed to decode frame: {}", e);
                    break;
                }
            }
            valid_len += (len + 8) as u64;
        }

        if valid_len < file_len && !readonly {
            warn!(
                path = ?self.path,
                valid = valid_len,
                total = file_len,
                "Cutting torn log tail"
            );
            OpenOptions::new().write(true).open(&self.path)?.set_len(valid_len)?;
        }

        Ok(ops)
    }

    fn handle(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::engine(code::IO, "log file handle unavailable"))
    }

    pub(crate) fn append(&mut self, frames: &[Vec<u8>]) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }
        let file = self.handle()?;
        for frame in frames {
            file.write_all(frame)?;
        }
        Ok(())
    }

    pub(crate) fn fsync(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Replace the log with `frames` through a temp file and rename
    pub(crate) fn rewrite(&mut self, frames: impl Iterator<Item = Result<Vec<u8>>>) -> Result<()> {
        self.file = None;

        let temp_path = self.path.with_extension("db.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        for frame in frames {
            file.write_all(&frame?)?;
        }
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, &self.path)?;
        info!(path = ?self.path, "Log rewritten");
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        self.fsync()?;
        self.file = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> (PathBuf, LogFile) {
        let dir = std::env::temp_dir().join(format!("statstore_log_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.db");
        std::fs::remove_file(&path).ok();
        (dir, LogFile::new(path))
    }

    #[test]
    fn test_frame_layout() -> Result<()> {
        let frame = LogOp::Put {
            key: vec![1, 2],
            data: vec![9],
        }
        .to_frame()?;
        // op + klen + key + dlen + data
        assert_eq!(&frame[..4], &12u32.to_le_bytes());
        assert_eq!(frame[4], OP_PUT);
        assert_eq!(frame.len(), 4 + 12 + 4);
        Ok(())
    }

    #[test]
    fn test_append_and_replay() -> Result<()> {
        let (dir, mut log) = temp_log("replay");
        let ops = vec![
            LogOp::Put { key: b"a".to_vec(), data: b"1".to_vec() },
            LogOp::Delete { key: b"a".to_vec(), data: None },
            LogOp::Delete { key: b"b".to_vec(), data: Some(b"2".to_vec()) },
            LogOp::Truncate,
        ];
        let frames = ops.iter().map(LogOp::to_frame).collect::<Result<Vec<_>>>()?;
        log.append(&frames)?;
        log.close()?;

        assert_eq!(log.replay(false)?, ops);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_torn_tail_is_cut() -> Result<()> {
        let (dir, mut log) = temp_log("torn");
        let good = LogOp::Put { key: b"k".to_vec(), data: b"v".to_vec() }.to_frame()?;
        let mut torn = LogOp::Put { key: b"x".to_vec(), data: b"y".to_vec() }.to_frame()?;
        torn.truncate(torn.len() - 3);
        log.append(&[good.clone(), torn])?;
        log.close()?;

        let ops = log.replay(false)?;
        assert_eq!(ops.len(), 1);
        assert_eq!(log.size(), good.len() as u64);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_oversized_length_word_is_torn_tail() -> Result<()> {
        let (dir, mut log) = temp_log("oversized");
        let good = LogOp::Put { key: b"k".to_vec(), data: b"v".to_vec() }.to_frame()?;
        let mut bogus = u32::MAX.to_le_bytes().to_vec();
        bogus.extend_from_slice(&[OP_PUT, 0, 0]);
        log.append(&[good.clone(), bogus])?;
        log.close()?;

        assert_eq!(log.replay(true)?.len(), 1);
        assert_eq!(log.size(), good.len() as u64 + 7);
        assert_eq!(log.replay(false)?.len(), 1);
        assert_eq!(log.size(), good.len() as u64);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_corrupt_checksum_stops_replay() -> Result<()> {
        let (dir, mut log) = temp_log("checksum");
        let first = LogOp::Put { key: b"k".to_vec(), data: b"v".to_vec() }.to_frame()?;
        let mut second = LogOp::Put { key: b"q".to_vec(), data: b"w".to_vec() }.to_frame()?;
        second[6] ^= 0xff;
        log.append(&[first, second])?;
        log.close()?;

        assert_eq!(log.replay(true)?.len(), 1);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
