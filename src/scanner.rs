//! Recording-directory and beam-file selection.
//!
//! The beamforming pipeline writes one directory tree per observation; the
//! scanner locates the session currently being recorded and, within it, the
//! newest filterbank file per beam that is safe to read.
//!
//! Selection is heuristic throughout, kept bit-compatible with the deployed
//! pipeline rather than hardened:
//! - the "current" recording directory is the one at a fixed depth under the
//!   root with the newest created-or-modified timestamp (any process touching
//!   a directory can mis-select it);
//! - file names are assumed to encode creation order, so candidates are
//!   sorted by name and the second-to-last is taken; the last may still be
//!   mid-write and is never read.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::ScannerConfig;
use crate::error::{MonitorError, MonitorResult};

/// The two synthesized beam outputs of the beamformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeamKind {
    /// Phased-array combination of all antennas.
    Coherent,
    /// Simple power sum over all antennas.
    Incoherent,
}

impl BeamKind {
    /// Both beam kinds, in publish order.
    pub const ALL: [BeamKind; 2] = [BeamKind::Coherent, BeamKind::Incoherent];

    /// Lowercase label used in log fields and store keys.
    pub fn label(self) -> &'static str {
        match self {
            BeamKind::Coherent => "coherent",
            BeamKind::Incoherent => "incoherent",
        }
    }
}

impl std::fmt::Display for BeamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Locates the current recording directory and completed beam files.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    config: ScannerConfig,
}

impl DirectoryScanner {
    /// Build a scanner over the configured root.
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// The subdirectory prefix naming `beam` recordings.
    pub fn beam_prefix(&self, beam: BeamKind) -> &str {
        match beam {
            BeamKind::Coherent => &self.config.coherent_prefix,
            BeamKind::Incoherent => &self.config.incoherent_prefix,
        }
    }

    /// Select the recording directory: the directory `scan_depth` levels
    /// below the root with the newest timestamp.
    pub fn latest_recording_dir(&self) -> MonitorResult<PathBuf> {
        let mut candidates = Vec::new();
        collect_dirs_at_depth(
            &self.config.root_directory,
            self.config.scan_depth,
            &mut candidates,
        )?;

        candidates
            .into_iter()
            .max_by_key(|(_, stamp)| *stamp)
            .map(|(path, _)| path)
            .ok_or_else(|| MonitorError::NoDirectoryFound {
                root: self.config.root_directory.clone(),
            })
    }

    /// Select the completed file for `beam` under `recording_dir`: the
    /// second-to-last candidate in name order inside the first
    /// prefix-matching beam subdirectory.
    pub fn select_beam_file(&self, recording_dir: &Path, beam: BeamKind) -> MonitorResult<PathBuf> {
        let beam_dir = self.beam_dir(recording_dir, beam)?;
        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&beam_dir)? {
            let entry = entry?;
            let path = entry.path();
            let matches_ext = path
                .extension()
                .is_some_and(|ext| ext == self.config.file_extension.as_str());
            if entry.file_type()?.is_file() && matches_ext {
                candidates.push(path);
            }
        }

        if candidates.len() < 2 {
            return Err(MonitorError::InsufficientFiles {
                beam,
                dir: beam_dir,
                found: candidates.len(),
            });
        }

        candidates.sort();
        Ok(candidates.swap_remove(candidates.len() - 2))
    }

    /// The first beam subdirectory (name order) whose name starts with the
    /// kind's prefix.
    fn beam_dir(&self, recording_dir: &Path, beam: BeamKind) -> MonitorResult<PathBuf> {
        let prefix = self.beam_prefix(beam);
        let mut matches: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(recording_dir)? {
            let entry = entry?;
            let starts_with_prefix = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix));
            if entry.file_type()?.is_dir() && starts_with_prefix {
                matches.push(entry.path());
            }
        }
        matches.sort();
        matches
            .into_iter()
            .next()
            .ok_or_else(|| MonitorError::NoBeamDirectory {
                beam,
                dir: recording_dir.to_path_buf(),
            })
    }
}

/// Recursively collect `(path, timestamp)` for every directory exactly
/// `depth` levels below `path`.
fn collect_dirs_at_depth(
    path: &Path,
    depth: usize,
    out: &mut Vec<(PathBuf, SystemTime)>,
) -> MonitorResult<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if depth == 1 {
            let meta = entry.metadata()?;
            let stamp = meta.created().or_else(|_| meta.modified())?;
            out.push((entry.path(), stamp));
        } else {
            collect_dirs_at_depth(&entry.path(), depth - 1, out)?;
        }
    }
    Ok(())
}
