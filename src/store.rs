//! Snapshot publication to the shared key-value store.
//!
//! Each cycle ends with one [`Snapshot`] written under five fixed keys in a
//! configured namespace. The write is all-or-nothing: [`RedisStore`] wraps
//! the five `SET`s in a MULTI/EXEC transaction and reads them back with a
//! single `MGET`, so a reader polling mid-publish sees either the previous
//! complete snapshot or the new one, never a mix. This process is the sole
//! writer for the namespace; no history is kept.
//!
//! [`MemoryStore`] is the in-process stand-in used by the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::bandpass::Bandpass;
use crate::error::MonitorResult;
use crate::scanner::BeamKind;

/// Published state for one beam.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSnapshot {
    /// File name (without directory) of the extracted filterbank file.
    pub file_name: String,
    /// Per-channel statistics of that file.
    pub bandpass: Bandpass,
}

/// The externally visible state of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Path of the current recording directory.
    pub directory: String,
    /// Coherent-beam file and statistics.
    pub coherent: BeamSnapshot,
    /// Incoherent-beam file and statistics.
    pub incoherent: BeamSnapshot,
}

impl Snapshot {
    /// The per-beam state for `beam`.
    pub fn beam(&self, beam: BeamKind) -> &BeamSnapshot {
        match beam {
            BeamKind::Coherent => &self.coherent,
            BeamKind::Incoherent => &self.incoherent,
        }
    }
}

/// The five keys a snapshot occupies under a namespace.
#[derive(Debug, Clone)]
pub struct SnapshotKeys {
    /// `<ns>:directory`: UTF-8 recording directory path.
    pub directory: String,
    /// `<ns>:coherent:file`: UTF-8 file name.
    pub coherent_file: String,
    /// `<ns>:coherent:bandpass`: packed statistics blob.
    pub coherent_bandpass: String,
    /// `<ns>:incoherent:file`: UTF-8 file name.
    pub incoherent_file: String,
    /// `<ns>:incoherent:bandpass`: packed statistics blob.
    pub incoherent_bandpass: String,
}

impl SnapshotKeys {
    /// Build the key set for `namespace`.
    pub fn new(namespace: &str) -> Self {
        Self {
            directory: format!("{namespace}:directory"),
            coherent_file: format!("{namespace}:coherent:file"),
            coherent_bandpass: format!("{namespace}:coherent:bandpass"),
            incoherent_file: format!("{namespace}:incoherent:file"),
            incoherent_bandpass: format!("{namespace}:incoherent:bandpass"),
        }
    }

    fn as_array(&self) -> [&str; 5] {
        [
            &self.directory,
            &self.coherent_file,
            &self.coherent_bandpass,
            &self.incoherent_file,
            &self.incoherent_bandpass,
        ]
    }
}

/// Sink for completed snapshots.
///
/// Implementations must make `publish` atomic with respect to `fetch`: a
/// concurrent `fetch` returns a complete snapshot from a single publish.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Write all five values of `snapshot` as one logical update.
    async fn publish(&self, snapshot: &Snapshot) -> MonitorResult<()>;

    /// Read back the last published snapshot, jointly across all five keys.
    ///
    /// Returns `Ok(None)` when no complete snapshot has been published yet
    /// (missing keys or an undecodable blob count as "no data yet").
    async fn fetch(&self) -> MonitorResult<Option<Snapshot>>;
}

/// Redis-backed snapshot store.
pub struct RedisStore {
    client: redis::Client,
    keys: SnapshotKeys,
}

impl RedisStore {
    /// Open a client for `url` and round-trip a `PING`, so an unreachable
    /// store fails at startup rather than on the first cycle.
    pub async fn connect(url: &str, namespace: &str) -> MonitorResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(Self {
            client,
            keys: SnapshotKeys::new(namespace),
        })
    }

    /// The key set this store writes.
    pub fn keys(&self) -> &SnapshotKeys {
        &self.keys
    }
}

#[async_trait]
impl SnapshotStore for RedisStore {
    async fn publish(&self, snapshot: &Snapshot) -> MonitorResult<()> {
        // A fresh multiplexed connection per cycle keeps publishing
        // self-healing across store restarts.
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .atomic()
            .set(&self.keys.directory, snapshot.directory.as_str())
            .ignore()
            .set(&self.keys.coherent_file, snapshot.coherent.file_name.as_str())
            .ignore()
            .set(
                &self.keys.coherent_bandpass,
                snapshot.coherent.bandpass.to_bytes(),
            )
            .ignore()
            .set(
                &self.keys.incoherent_file,
                snapshot.incoherent.file_name.as_str(),
            )
            .ignore()
            .set(
                &self.keys.incoherent_bandpass,
                snapshot.incoherent.bandpass.to_bytes(),
            )
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn fetch(&self) -> MonitorResult<Option<Snapshot>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys = self.keys.as_array();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(&keys[..])
            .query_async(&mut conn)
            .await?;
        Ok(snapshot_from_values(values))
    }
}

/// Assemble a snapshot from the five raw values in key order; `None` if any
/// value is missing or undecodable.
fn snapshot_from_values(values: Vec<Option<Vec<u8>>>) -> Option<Snapshot> {
    let mut values = values.into_iter();
    let directory = String::from_utf8(values.next()??).ok()?;
    let coherent_file = String::from_utf8(values.next()??).ok()?;
    let coherent_bandpass = Bandpass::from_bytes(&values.next()??)?;
    let incoherent_file = String::from_utf8(values.next()??).ok()?;
    let incoherent_bandpass = Bandpass::from_bytes(&values.next()??)?;
    Some(Snapshot {
        directory,
        coherent: BeamSnapshot {
            file_name: coherent_file,
            bandpass: coherent_bandpass,
        },
        incoherent: BeamSnapshot {
            file_name: incoherent_file,
            bandpass: incoherent_bandpass,
        },
    })
}

/// In-memory snapshot store for tests.
///
/// Holds the same five keys as [`RedisStore`]; a single lock spans each
/// publish and each fetch, giving the same joint-consistency guarantee the
/// MULTI/EXEC + MGET pair does.
pub struct MemoryStore {
    keys: SnapshotKeys,
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store for `namespace`.
    pub fn new(namespace: &str) -> Self {
        Self {
            keys: SnapshotKeys::new(namespace),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Raw value of one key, as a store reader would see it.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().get(key).cloned()
    }

    /// The key set this store writes.
    pub fn keys(&self) -> &SnapshotKeys {
        &self.keys
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn publish(&self, snapshot: &Snapshot) -> MonitorResult<()> {
        let mut inner = self.inner.write();
        inner.insert(
            self.keys.directory.clone(),
            snapshot.directory.clone().into_bytes(),
        );
        inner.insert(
            self.keys.coherent_file.clone(),
            snapshot.coherent.file_name.clone().into_bytes(),
        );
        inner.insert(
            self.keys.coherent_bandpass.clone(),
            snapshot.coherent.bandpass.to_bytes(),
        );
        inner.insert(
            self.keys.incoherent_file.clone(),
            snapshot.incoherent.file_name.clone().into_bytes(),
        );
        inner.insert(
            self.keys.incoherent_bandpass.clone(),
            snapshot.incoherent.bandpass.to_bytes(),
        );
        Ok(())
    }

    async fn fetch(&self) -> MonitorResult<Option<Snapshot>> {
        let inner = self.inner.read();
        let values = self
            .keys
            .as_array()
            .iter()
            .map(|key| inner.get(*key).cloned())
            .collect();
        Ok(snapshot_from_values(values))
    }
}
