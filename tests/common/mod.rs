//! Shared helpers for integration tests: synthetic filterbank files and
//! recording-tree construction.

use std::fs;
use std::path::Path;

use filterbank_monitor::config::{ApplicationConfig, MonitorConfig, ScannerConfig, StoreConfig};

fn push_token(buf: &mut Vec<u8>, token: &str) {
    buf.extend_from_slice(&(token.len() as u32).to_le_bytes());
    buf.extend_from_slice(token.as_bytes());
}

fn push_int(buf: &mut Vec<u8>, keyword: &str, value: i32) {
    push_token(buf, keyword);
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_double(buf: &mut Vec<u8>, keyword: &str, value: f64) {
    push_token(buf, keyword);
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write an 8-bit filterbank file of `nspectra` constant-valued spectra.
pub fn write_fil(path: &Path, nchans: i32, fill: u8, nspectra: usize) {
    let mut bytes = Vec::new();
    push_token(&mut bytes, "HEADER_START");
    push_int(&mut bytes, "nchans", nchans);
    push_int(&mut bytes, "nbits", 8);
    push_int(&mut bytes, "nifs", 1);
    push_double(&mut bytes, "fch1", 1.5e9);
    push_double(&mut bytes, "foff", -856e6 / nchans as f64);
    push_double(&mut bytes, "tsamp", 306e-6);
    push_token(&mut bytes, "HEADER_END");
    bytes.extend(std::iter::repeat(fill).take(nchans as usize * nspectra));
    fs::write(path, bytes).unwrap();
}

/// Build a beam subdirectory holding one constant-valued file per entry of
/// `files`, filled with `fill_base + index`.
pub fn write_beam_dir(recording_dir: &Path, name: &str, files: &[&str], fill_base: u8) {
    let beam_dir = recording_dir.join(name);
    fs::create_dir_all(&beam_dir).unwrap();
    for (i, file) in files.iter().enumerate() {
        write_fil(&beam_dir.join(file), 16, fill_base + i as u8, 4);
    }
}

/// Monitor configuration over `root` with recording directories `depth`
/// levels down.
pub fn monitor_config(root: &Path, depth: usize) -> MonitorConfig {
    MonitorConfig {
        application: ApplicationConfig::default(),
        scanner: ScannerConfig {
            root_directory: root.to_path_buf(),
            scan_depth: depth,
            scan_interval_secs: 300,
            coherent_prefix: "cfbf".to_string(),
            incoherent_prefix: "ifbf".to_string(),
            file_extension: "fil".to_string(),
            chunk_spectra: 10_000,
        },
        store: StoreConfig::default(),
    }
}
