//! The periodic scan → extract → publish loop.
//!
//! [`BandpassMonitor::run`] drives one cycle per interval, forever. A cycle
//! either fully succeeds (a complete [`Snapshot`] is published) or fully
//! fails (nothing is published, the error is logged, the loop sleeps and
//! retries). Cycle errors never terminate the loop; a persistent external
//! fault shows up as a string of failed cycles and a stale snapshot, not a
//! crash. Shutdown is honored between cycles only, so an in-flight cycle
//! completes or fails whole.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::filterbank;
use crate::scanner::{BeamKind, DirectoryScanner};
use crate::store::{BeamSnapshot, Snapshot, SnapshotStore};

/// The periodic worker tying scanner, extractor, and store together.
pub struct BandpassMonitor {
    config: MonitorConfig,
    scanner: DirectoryScanner,
    store: Arc<dyn SnapshotStore>,
}

impl BandpassMonitor {
    /// Build a monitor publishing to `store`.
    pub fn new(config: MonitorConfig, store: Arc<dyn SnapshotStore>) -> Self {
        let scanner = DirectoryScanner::new(config.scanner.clone());
        Self {
            config,
            scanner,
            store,
        }
    }

    /// Run cycles until `shutdown` fires. The first cycle starts
    /// immediately; the interval sleep follows each cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.scanner.interval();
        info!(
            root = %self.config.scanner.root_directory.display(),
            interval_secs = self.config.scanner.scan_interval_secs,
            "bandpass monitor started"
        );

        loop {
            match self.run_cycle().await {
                Ok(snapshot) => info!(
                    directory = %snapshot.directory,
                    coherent = %snapshot.coherent.file_name,
                    incoherent = %snapshot.incoherent.file_name,
                    channels = snapshot.coherent.bandpass.len(),
                    "published bandpass snapshot"
                ),
                Err(error) => warn!(%error, "cycle failed, keeping previous snapshot"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("shutdown requested, stopping monitor");
                    break;
                }
            }
        }
    }

    /// Execute one scan-compute-publish cycle.
    ///
    /// Nothing reaches the store unless every step succeeded; the publish
    /// itself is a single atomic store update.
    pub async fn run_cycle(&self) -> MonitorResult<Snapshot> {
        let recording_dir = self.scanner.latest_recording_dir()?;
        debug!(directory = %recording_dir.display(), "selected recording directory");

        // The two beams are disjoint read-only files; extract them
        // concurrently.
        let (coherent, incoherent) = tokio::try_join!(
            self.beam_snapshot(&recording_dir, BeamKind::Coherent),
            self.beam_snapshot(&recording_dir, BeamKind::Incoherent),
        )?;

        let snapshot = Snapshot {
            directory: recording_dir.to_string_lossy().into_owned(),
            coherent,
            incoherent,
        };
        self.store.publish(&snapshot).await?;
        Ok(snapshot)
    }

    /// Select and extract the completed file for one beam.
    async fn beam_snapshot(
        &self,
        recording_dir: &Path,
        beam: BeamKind,
    ) -> MonitorResult<BeamSnapshot> {
        let path = self.scanner.select_beam_file(recording_dir, beam)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(%beam, file = %file_name, "extracting bandpass");

        let chunk_spectra = self.config.scanner.chunk_spectra;
        let bandpass =
            tokio::task::spawn_blocking(move || filterbank::extract(&path, chunk_spectra))
                .await??;

        Ok(BeamSnapshot {
            file_name,
            bandpass,
        })
    }
}
