use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nf_types::{Node, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::NodeStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// One mutation recorded in the log.
///
/// On-disk framing:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-serialized LogRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum LogRecord {
    Upsert { node: Node },
    Delete { id: NodeId },
}

/// Flush/sync strategy for the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every batch (safest, highest latency).
    EveryWrite,
    /// `fsync` at most once per interval, checked on write.
    Periodic { interval_ms: u64 },
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

struct LogState {
    writer: BufWriter<File>,
    /// Current end of the log file.
    offset: u64,
    last_sync: Instant,
    /// Live nodes, rebuilt from the log on open.
    nodes: HashMap<NodeId, Node>,
}

/// Durable node store backed by an append-only, CRC-framed log.
///
/// Every bulk write appends one record per node and flushes once. On open
/// the log is replayed front-to-back into an in-memory index; records that
/// fail the CRC check are skipped, and a torn tail ends the replay and is
/// cut off so later appends start on a record boundary. Reads never touch
/// the file.
pub struct LogNodeStore {
    path: PathBuf,
    sync_mode: SyncMode,
    state: Mutex<LogState>,
}

impl LogNodeStore {
    /// Open (or create) the log at `path` and replay it.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let file_len = file.metadata()?.len();

        let (records, intact_len) = scan_records(path)?;
        if intact_len < file_len {
            warn!(
                path = %path.display(),
                intact_len,
                file_len,
                "truncating torn log tail"
            );
            file.set_len(intact_len)?;
            file.sync_all()?;
        }
        let offset = intact_len;
        let replayed = records.len();
        let mut nodes = HashMap::new();
        for record in records {
            apply(&mut nodes, record);
        }
        info!(
            path = %path.display(),
            records = replayed,
            live = nodes.len(),
            "node log replayed"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sync_mode,
            state: Mutex::new(LogState {
                writer: BufWriter::new(file),
                offset,
                last_sync: Instant::now(),
                nodes,
            }),
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes.
    pub fn offset(&self) -> u64 {
        self.state.lock().expect("log mutex poisoned").offset
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.state.lock().expect("log mutex poisoned").nodes.len()
    }

    /// Returns `true` if no nodes are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the log as one `Upsert` per live node.
    ///
    /// The new log is written to a sibling file, synced, then renamed over
    /// the old one. Returns the number of records written.
    pub fn compact(&self) -> StoreResult<usize> {
        let mut state = self.state.lock().expect("log mutex poisoned");
        state.writer.flush()?;

        let tmp_path = self.path.with_extension("compact");
        let mut nodes: Vec<Node> = state.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        let count = nodes.len();

        let mut tmp = BufWriter::new(File::create(&tmp_path)?);
        let mut written = 0u64;
        for node in nodes {
            written += write_record(&mut tmp, &LogRecord::Upsert { node })?;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let before = state.offset;
        state.writer = BufWriter::new(file);
        state.offset = written;
        state.last_sync = Instant::now();

        debug!(records = count, before, after = written, "node log compacted");
        Ok(count)
    }

    fn append(&self, records: Vec<LogRecord>) -> StoreResult<()> {
        let mut state = self.state.lock().expect("log mutex poisoned");

        let mut written = 0u64;
        for record in &records {
            written += write_record(&mut state.writer, record)?;
        }
        state.writer.flush()?;

        let due = match self.sync_mode {
            SyncMode::EveryWrite => true,
            SyncMode::Periodic { interval_ms } => {
                state.last_sync.elapsed() >= Duration::from_millis(interval_ms)
            }
            SyncMode::OsDefault => false,
        };
        if due {
            state.writer.get_ref().sync_all()?;
            state.last_sync = Instant::now();
        }

        let start = state.offset;
        state.offset += written;
        for record in records {
            apply(&mut state.nodes, record);
        }

        debug!(offset = start, bytes = written, synced = due, "node log append");
        Ok(())
    }
}

impl std::fmt::Debug for LogNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogNodeStore")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .field("node_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl NodeStore for LogNodeStore {
    async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>> {
        let state = self.state.lock().expect("log mutex poisoned");
        Ok(state.nodes.get(id).cloned())
    }

    async fn get_children(&self, id: &NodeId) -> StoreResult<Vec<Node>> {
        let state = self.state.lock().expect("log mutex poisoned");
        Ok(state
            .nodes
            .values()
            .filter(|n| &n.parent == id)
            .cloned()
            .collect())
    }

    async fn get_all_nodes(&self) -> StoreResult<Vec<Node>> {
        let state = self.state.lock().expect("log mutex poisoned");
        Ok(state.nodes.values().cloned().collect())
    }

    async fn upsert_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let records = nodes
            .iter()
            .map(|node| LogRecord::Upsert { node: node.clone() })
            .collect();
        self.append(records)
    }

    async fn delete_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let records = nodes.iter().map(|n| LogRecord::Delete { id: n.id }).collect();
        self.append(records)
    }
}

fn apply(nodes: &mut HashMap<NodeId, Node>, record: LogRecord) {
    match record {
        LogRecord::Upsert { node } => {
            nodes.insert(node.id, node);
        }
        LogRecord::Delete { id } => {
            nodes.remove(&id);
        }
    }
}

/// Frame and write one record. Returns the number of bytes written.
fn write_record<W: Write>(out: &mut W, record: &LogRecord) -> StoreResult<u64> {
    let payload = serde_json::to_vec(record)?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);

    out.write_all(&length.to_le_bytes())?;
    out.write_all(&crc.to_le_bytes())?;
    out.write_all(&payload)?;

    Ok((HEADER_SIZE + payload.len()) as u64)
}

/// Read every intact record in the log, in order.
///
/// A record whose CRC does not match, or whose payload is not a valid
/// record, is skipped. A truncated record ends the scan.
pub fn read_records(path: &Path) -> StoreResult<Vec<LogRecord>> {
    Ok(scan_records(path)?.0)
}

/// Like [`read_records`], also returning the byte length of the framed
/// prefix. Anything past it is a torn tail.
fn scan_records(path: &Path) -> StoreResult<(Vec<LogRecord>, u64)> {
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(file) => {
            BufReader::new(file).read_to_end(&mut bytes)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => {
            return Err(StoreError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }

    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= bytes.len() {
        let header = &bytes[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > bytes.len() {
            warn!(offset, length, file_len = bytes.len(), "torn log record; stopping replay");
            break;
        }
        let payload = &bytes[start..start + length];
        offset = start + length;

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset = start - HEADER_SIZE,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping record"
            );
            continue;
        }

        match serde_json::from_slice::<LogRecord>(payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset = start - HEADER_SIZE, error = %e, "unreadable log record; skipping");
            }
        }
    }

    Ok((records, offset as u64))
}
