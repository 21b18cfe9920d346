// wal/marker.rs
// Marker codec (C1): fixed header + kind-specific payload.

use crate::error::{RecoveryError, Result};
use serde_json::Value;

/// Marker kind, encoded as the first byte of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarkerKind {
    Header = 1,
    Footer = 2,
    Prologue = 3,
    BeginTransaction = 4,
    CommitTransaction = 5,
    AbortTransaction = 6,
    BeginRemoteTransaction = 7,
    CommitRemoteTransaction = 8,
    AbortRemoteTransaction = 9,
    Document = 10,
    Remove = 11,
    CreateDatabase = 12,
    DropDatabase = 13,
    CreateCollection = 14,
    DropCollection = 15,
    RenameCollection = 16,
    ChangeCollection = 17,
    CreateIndex = 18,
    DropIndex = 19,
}

impl MarkerKind {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            1 => MarkerKind::Header,
            2 => MarkerKind::Footer,
            3 => MarkerKind::Prologue,
            4 => MarkerKind::BeginTransaction,
            5 => MarkerKind::CommitTransaction,
            6 => MarkerKind::AbortTransaction,
            7 => MarkerKind::BeginRemoteTransaction,
            8 => MarkerKind::CommitRemoteTransaction,
            9 => MarkerKind::AbortRemoteTransaction,
            10 => MarkerKind::Document,
            11 => MarkerKind::Remove,
            12 => MarkerKind::CreateDatabase,
            13 => MarkerKind::DropDatabase,
            14 => MarkerKind::CreateCollection,
            15 => MarkerKind::DropCollection,
            16 => MarkerKind::RenameCollection,
            17 => MarkerKind::ChangeCollection,
            18 => MarkerKind::CreateIndex,
            19 => MarkerKind::DropIndex,
            other => return Err(RecoveryError::Corruption(format!("unknown marker kind {other}"))),
        })
    }

    pub fn is_local_transaction_envelope(&self) -> bool {
        matches!(
            self,
            MarkerKind::BeginTransaction | MarkerKind::CommitTransaction | MarkerKind::AbortTransaction
        )
    }

    pub fn is_remote_transaction_envelope(&self) -> bool {
        matches!(
            self,
            MarkerKind::BeginRemoteTransaction
                | MarkerKind::CommitRemoteTransaction
                | MarkerKind::AbortRemoteTransaction
        )
    }
}

/// Fixed header: type(1) + size(4) + tick(8) + crc(4) = 17 bytes.
pub const HEADER_SIZE: usize = 17;
pub const MAX_MARKER_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct MarkerHeader {
    pub kind: MarkerKind,
    pub size: u32,
    pub tick: u64,
}

/// A decoded marker: header plus the raw payload bytes that follow it.
#[derive(Debug, Clone)]
pub struct Marker {
    pub header: MarkerHeader,
    pub payload: Vec<u8>,
}

impl Marker {
    pub fn new(kind: MarkerKind, tick: u64, payload: Vec<u8>) -> Self {
        let size = (HEADER_SIZE + payload.len()) as u32;
        Marker {
            header: MarkerHeader { kind, size, tick },
            payload,
        }
    }

    /// Construct a marker whose payload is a JSON object, matching the
    /// TBJSON-over-serde_json convention this crate uses for attributes
    /// like `database`, `cid`, `tid`, `iid`, `name`, `data`.
    pub fn with_json(kind: MarkerKind, tick: u64, value: &Value) -> Result<Self> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(kind, tick, payload))
    }

    pub fn kind(&self) -> MarkerKind {
        self.header.kind
    }

    pub fn tick(&self) -> u64 {
        self.header.tick
    }

    /// Serialize header + payload + trailing CRC32 over both.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len() + 4);
        buf.push(self.header.kind as u8);
        buf.extend_from_slice(&self.header.size.to_le_bytes());
        buf.extend_from_slice(&self.header.tick.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]); // crc placeholder, filled below
        buf.extend_from_slice(&self.payload);

        let crc = crc32fast::hash(&buf);
        buf[5..9].copy_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize a marker from a byte slice that starts exactly at its
    /// header. Returns `(marker, bytes_consumed)`.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(RecoveryError::Corruption("truncated marker header".into()));
        }
        let kind = MarkerKind::from_u8(data[0])?;
        let size = u32::from_le_bytes(data[1..5].try_into().unwrap());
        let tick = u64::from_le_bytes(data[5..13].try_into().unwrap());
        let crc = u32::from_le_bytes(data[13..17].try_into().unwrap());

        let size_usize = size as usize;
        if size_usize < HEADER_SIZE || size_usize > MAX_MARKER_SIZE {
            return Err(RecoveryError::Corruption(format!(
                "implausible marker size {size}"
            )));
        }
        let total = size_usize + 4; // + trailing crc copy
        if data.len() < total {
            return Err(RecoveryError::Corruption("truncated marker payload".into()));
        }

        let payload = data[HEADER_SIZE..size_usize].to_vec();

        // Recompute CRC the same way serialize() does: header-with-zeroed-crc + payload.
        let mut check_buf = data[0..HEADER_SIZE].to_vec();
        check_buf[13..17].copy_from_slice(&[0u8; 4]);
        check_buf.extend_from_slice(&payload);
        let computed = crc32fast::hash(&check_buf);
        if computed != crc {
            return Err(RecoveryError::Corruption("marker checksum mismatch".into()));
        }
        let trailing = u32::from_le_bytes(data[size_usize..total].try_into().unwrap());
        if trailing != crc {
            return Err(RecoveryError::Corruption("marker trailer checksum mismatch".into()));
        }

        Ok((
            Marker {
                header: MarkerHeader { kind, size, tick },
                payload,
            },
            total,
        ))
    }

    fn json_payload(&self) -> Result<Value> {
        if self.payload.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&self.payload)
            .map_err(|e| RecoveryError::Serialization(format!("invalid TBJSON payload: {e}")))
    }

    /// PROLOGUE's fixed struct: (databaseId, collectionId), 16 bytes.
    pub fn prologue(&self) -> Result<(u64, u64)> {
        if self.payload.len() < 16 {
            return Err(RecoveryError::Corruption("truncated PROLOGUE payload".into()));
        }
        let db = u64::from_le_bytes(self.payload[0..8].try_into().unwrap());
        let col = u64::from_le_bytes(self.payload[8..16].try_into().unwrap());
        Ok((db, col))
    }

    /// Remote transaction envelope's fixed struct: (databaseId, tid).
    pub fn remote_txn(&self) -> Result<(u64, u64)> {
        if self.payload.len() < 16 {
            return Err(RecoveryError::Corruption("truncated remote transaction payload".into()));
        }
        let db = u64::from_le_bytes(self.payload[0..8].try_into().unwrap());
        let tid = u64::from_le_bytes(self.payload[8..16].try_into().unwrap());
        Ok((db, tid))
    }

    /// Local transaction envelope's TBJSON attributes `{database, tid}`.
    pub fn local_txn(&self) -> Result<(u64, u64)> {
        let obj = self.json_payload()?;
        let db = numeric_value(&obj, "database")?;
        let tid = numeric_value(&obj, "tid")?;
        Ok((db, tid))
    }

    /// CRUD markers: 8 bytes LE `tid` followed by the TBJSON document.
    pub fn crud_payload(&self) -> Result<(u64, Value)> {
        if self.payload.len() < 8 {
            return Err(RecoveryError::Corruption("truncated CRUD payload".into()));
        }
        let tid = u64::from_le_bytes(self.payload[0..8].try_into().unwrap());
        let doc: Value = serde_json::from_slice(&self.payload[8..])
            .map_err(|e| RecoveryError::Serialization(format!("invalid document payload: {e}")))?;
        Ok((tid, doc))
    }

    /// DDL markers: TBJSON object carrying `database`, optional `cid`,
    /// optional `iid`/`id`/`name`, and a nested `data` object.
    pub fn ddl_payload(&self) -> Result<Value> {
        self.json_payload()
    }
}

/// Extracts an unsigned integer attribute from a TBJSON object, accepting
/// either a native number or a string of digits (tolerates legacy
/// encoding drift, matching the original's `NumericValue<T>` helper).
pub fn numeric_value(obj: &Value, attr: &str) -> Result<u64> {
    let field = obj
        .get(attr)
        .ok_or_else(|| RecoveryError::Serialization(format!("missing attribute `{attr}`")))?;
    match field {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| RecoveryError::Serialization(format!("attribute `{attr}` is not an unsigned integer"))),
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|_| RecoveryError::Serialization(format!("attribute `{attr}` is not numeric"))),
        _ => Err(RecoveryError::Serialization(format!(
            "attribute `{attr}` has unexpected type"
        ))),
    }
}

/// Same as [`numeric_value`] but returns `None` instead of erroring when
/// the attribute is absent, for optional DDL fields such as `cid`.
pub fn numeric_value_opt(obj: &Value, attr: &str) -> Result<Option<u64>> {
    if obj.get(attr).is_none() {
        return Ok(None);
    }
    numeric_value(obj, attr).map(Some)
}

pub fn string_value<'a>(obj: &'a Value, attr: &str) -> Result<&'a str> {
    obj.get(attr)
        .and_then(Value::as_str)
        .ok_or_else(|| RecoveryError::Serialization(format!("missing string attribute `{attr}`")))
}
