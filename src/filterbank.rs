//! SIGPROC filterbank reading and streaming per-channel statistics.
//!
//! A filterbank file is a binary header followed by time-ordered, channelized
//! power samples. The header is a sequence of length-prefixed keyword/value
//! pairs bracketed by the `HEADER_START` and `HEADER_END` sentinels, all
//! little-endian. The data section holds one spectrum per time sample:
//! `nifs` IF planes of `nchans` samples each, at 8, 16, or 32 bits per
//! sample.
//!
//! [`extract`] streams the data section in fixed-size chunks of whole
//! spectra, so peak memory stays bounded for arbitrarily large files, and
//! accumulates a running sum and sum-of-squares per channel. Frequencies are
//! taken from the header (`fch1`/`foff`) without unit conversion.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::bandpass::{Bandpass, ChannelStat};
use crate::error::{MonitorError, MonitorResult};

/// Longest keyword accepted while scanning the header. Anything larger means
/// the file is not a filterbank file.
const MAX_KEYWORD_LEN: u32 = 80;

/// Header keywords carrying a 32-bit integer value.
const INT_KEYWORDS: &[&str] = &[
    "telescope_id",
    "machine_id",
    "data_type",
    "barycentric",
    "pulsarcentric",
    "nbits",
    "nchans",
    "nifs",
    "nbeams",
    "ibeam",
    "nsamples",
];

/// Header keywords carrying a 64-bit float value.
const DOUBLE_KEYWORDS: &[&str] = &[
    "tstart", "tsamp", "fch1", "foff", "refdm", "period", "az_start", "za_start", "src_raj",
    "src_dej",
];

/// Header keywords carrying a length-prefixed string value.
const STRING_KEYWORDS: &[&str] = &["source_name", "rawdatafile"];

/// Sample word size declared by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Unsigned 8-bit samples.
    U8,
    /// Unsigned 16-bit little-endian samples.
    U16,
    /// IEEE 754 32-bit little-endian samples.
    F32,
}

impl SampleKind {
    /// Map a declared `nbits` onto a supported sample kind.
    pub fn from_nbits(nbits: i32) -> Option<Self> {
        match nbits {
            8 => Some(SampleKind::U8),
            16 => Some(SampleKind::U16),
            32 => Some(SampleKind::F32),
            _ => None,
        }
    }

    /// Bytes per sample.
    pub fn bytes(self) -> usize {
        match self {
            SampleKind::U8 => 1,
            SampleKind::U16 => 2,
            SampleKind::F32 => 4,
        }
    }
}

/// Parsed filterbank header.
#[derive(Debug, Clone)]
pub struct FilterbankHeader {
    /// Number of frequency channels per spectrum.
    pub nchans: usize,
    /// Number of IF planes per spectrum.
    pub nifs: usize,
    /// Sample word size.
    pub sample: SampleKind,
    /// Frequency of the first channel.
    pub fch1: f64,
    /// Channel bandwidth, negative for a descending band.
    pub foff: f64,
    /// Sampling interval in seconds.
    pub tsamp: f64,
    /// Observation start time, MJD.
    pub tstart: f64,
    /// Source name, when the header carries one.
    pub source_name: Option<String>,
    /// Byte offset of the first spectrum.
    pub data_start: u64,
}

impl FilterbankHeader {
    /// Bytes per spectrum (all IF planes of all channels).
    pub fn bytes_per_spectrum(&self) -> usize {
        self.nchans * self.nifs * self.sample.bytes()
    }

    /// Band edges as `(f_low, f_high)`, sigproc convention: channel centers
    /// run from `fch1` in steps of `foff`, with half a channel of band on
    /// either side. Edges are ordered so `f_low <= f_high` whatever the sign
    /// of `foff`.
    pub fn band_edges(&self) -> (f64, f64) {
        let edge_a = self.fch1 - 0.5 * self.foff;
        let edge_b = edge_a + self.foff * self.nchans as f64;
        if edge_a <= edge_b {
            (edge_a, edge_b)
        } else {
            (edge_b, edge_a)
        }
    }

    /// Evenly spaced ascending channel frequencies across the band,
    /// `f_low` alone for a single-channel file.
    pub fn frequencies(&self) -> Vec<f64> {
        let (f_low, f_high) = self.band_edges();
        if self.nchans == 1 {
            return vec![f_low];
        }
        let step = (f_high - f_low) / (self.nchans - 1) as f64;
        (0..self.nchans).map(|i| f_low + i as f64 * step).collect()
    }
}

/// `Read` wrapper that tracks how many bytes have been consumed, so the
/// data-start offset falls out of the header parse.
struct HeaderReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> HeaderReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn read_u32(&mut self) -> std::io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> std::io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> std::io::Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }
}

/// Parse a filterbank header from `reader`, leaving it positioned at the
/// first spectrum. `path` is carried for error context only.
pub fn parse_header<R: Read>(reader: R, path: &Path) -> MonitorResult<FilterbankHeader> {
    let mut reader = HeaderReader::new(reader);

    let read_string = |reader: &mut HeaderReader<R>| -> MonitorResult<String> {
        let len = reader.read_u32()?;
        if len == 0 || len > MAX_KEYWORD_LEN {
            return Err(MonitorError::format(
                path,
                format!("implausible header token length {len}"),
            ));
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|_| MonitorError::format(path, "non-UTF-8 header token"))
    };

    let sentinel = read_string(&mut reader)?;
    if sentinel != "HEADER_START" {
        return Err(MonitorError::format(path, "missing HEADER_START sentinel"));
    }

    let mut nchans: Option<i32> = None;
    let mut nbits: Option<i32> = None;
    let mut nifs: i32 = 1;
    let mut fch1 = 0.0;
    let mut foff = 0.0;
    let mut tsamp = 0.0;
    let mut tstart = 0.0;
    let mut source_name = None;

    loop {
        let keyword = read_string(&mut reader)?;
        match keyword.as_str() {
            "HEADER_END" => break,
            "nchans" => nchans = Some(reader.read_i32()?),
            "nbits" => nbits = Some(reader.read_i32()?),
            "nifs" => nifs = reader.read_i32()?,
            "fch1" => fch1 = reader.read_f64()?,
            "foff" => foff = reader.read_f64()?,
            "tsamp" => tsamp = reader.read_f64()?,
            "tstart" => tstart = reader.read_f64()?,
            "source_name" => source_name = Some(read_string(&mut reader)?),
            "signed" => {
                let mut b = [0u8; 1];
                reader.read_exact(&mut b)?;
            }
            kw if INT_KEYWORDS.contains(&kw) => {
                reader.read_i32()?;
            }
            kw if DOUBLE_KEYWORDS.contains(&kw) => {
                reader.read_f64()?;
            }
            kw if STRING_KEYWORDS.contains(&kw) => {
                read_string(&mut reader)?;
            }
            kw => {
                return Err(MonitorError::format(
                    path,
                    format!("unknown header keyword '{kw}'"),
                ));
            }
        }
    }

    let nchans = match nchans {
        Some(n) if n > 0 => n as usize,
        Some(n) => {
            return Err(MonitorError::format(
                path,
                format!("declared channel count {n} is not positive"),
            ));
        }
        None => {
            return Err(MonitorError::format(path, "header does not declare nchans"));
        }
    };

    let nbits = nbits
        .ok_or_else(|| MonitorError::format(path, "header does not declare nbits"))?;
    let sample = SampleKind::from_nbits(nbits)
        .ok_or_else(|| MonitorError::format(path, format!("unsupported nbits {nbits}")))?;

    if nifs < 1 {
        return Err(MonitorError::format(
            path,
            format!("declared IF count {nifs} is not positive"),
        ));
    }

    Ok(FilterbankHeader {
        nchans,
        nifs: nifs as usize,
        sample,
        fch1,
        foff,
        tsamp,
        tstart,
        source_name,
        data_start: reader.pos,
    })
}

/// Read the header of the filterbank file at `path`.
pub fn read_header(path: &Path) -> MonitorResult<FilterbankHeader> {
    let file = File::open(path)?;
    parse_header(BufReader::new(file), path)
}

/// Compute the per-channel bandpass of the filterbank file at `path`,
/// streaming at most `chunk_spectra` spectra per read.
///
/// Statistics are the population mean and standard deviation over every time
/// sample (and IF plane) of each channel, accumulated in `f64` and published
/// as `f32`. A trailing partial spectrum is ignored; a file with no complete
/// spectrum is malformed.
pub fn extract(path: &Path, chunk_spectra: usize) -> MonitorResult<Bandpass> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let header = parse_header(&mut reader, path)?;

    let spectrum_bytes = header.bytes_per_spectrum();
    let data_len = file_len.saturating_sub(header.data_start);
    let nspectra = (data_len / spectrum_bytes as u64) as usize;
    if nspectra == 0 {
        return Err(MonitorError::format(
            path,
            "no complete spectra after the header",
        ));
    }

    let mut sums = vec![0.0f64; header.nchans];
    let mut sum_sqs = vec![0.0f64; header.nchans];
    let chunk = chunk_spectra.max(1);
    let mut buf = vec![0u8; chunk.min(nspectra) * spectrum_bytes];

    let mut remaining = nspectra;
    while remaining > 0 {
        let this_chunk = remaining.min(chunk);
        let nbytes = this_chunk * spectrum_bytes;
        reader.read_exact(&mut buf[..nbytes])?;
        accumulate(
            &buf[..nbytes],
            header.sample,
            header.nchans,
            &mut sums,
            &mut sum_sqs,
        );
        remaining -= this_chunk;
    }

    let count = (nspectra * header.nifs) as f64;
    let freqs = header.frequencies();
    let channels = (0..header.nchans)
        .map(|i| {
            let mean = sums[i] / count;
            // Clamp the radicand: floating-point cancellation can push it
            // fractionally below zero for near-constant channels.
            let var = (sum_sqs[i] / count - mean * mean).max(0.0);
            ChannelStat {
                frequency: freqs[i] as f32,
                mean: mean as f32,
                std: var.sqrt() as f32,
            }
        })
        .collect();

    Ok(Bandpass::new(channels))
}

/// Fold a block of whole spectra into the per-channel accumulators. Within a
/// spectrum each IF plane repeats the channel sequence, so the channel index
/// is the sample index modulo `nchans`.
fn accumulate(
    block: &[u8],
    sample: SampleKind,
    nchans: usize,
    sums: &mut [f64],
    sum_sqs: &mut [f64],
) {
    let mut ch = 0usize;
    let mut fold = |v: f64| {
        sums[ch] += v;
        sum_sqs[ch] += v * v;
        ch += 1;
        if ch == nchans {
            ch = 0;
        }
    };
    match sample {
        SampleKind::U8 => {
            for &b in block {
                fold(b as f64);
            }
        }
        SampleKind::U16 => {
            for pair in block.chunks_exact(2) {
                fold(u16::from_le_bytes([pair[0], pair[1]]) as f64);
            }
        }
        SampleKind::F32 => {
            for quad in block.chunks_exact(4) {
                fold(f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]) as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    /// Minimal sigproc-style header writer for synthetic test files.
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

    fn header_bytes(nchans: i32, nbits: i32, fch1: f64, foff: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        push_token(&mut buf, "HEADER_START");
        push_token(&mut buf, "source_name");
        push_token(&mut buf, "J0835-4510");
        push_int(&mut buf, "telescope_id", 64);
        push_int(&mut buf, "nchans", nchans);
        push_int(&mut buf, "nbits", nbits);
        push_int(&mut buf, "nifs", 1);
        push_double(&mut buf, "fch1", fch1);
        push_double(&mut buf, "foff", foff);
        push_double(&mut buf, "tsamp", 306e-6);
        push_double(&mut buf, "tstart", 58000.0);
        push_token(&mut buf, "HEADER_END");
        buf
    }

    fn write_fil(dir: &tempfile::TempDir, name: &str, nchans: i32, spectra: &[&[u8]]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut bytes = header_bytes(nchans, 8, 1.5e9, -856e6 / nchans as f64);
        for spectrum in spectra {
            bytes.extend_from_slice(spectrum);
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(&bytes).unwrap();
        path
    }

    #[test]
    fn parses_header_fields() {
        let bytes = header_bytes(4096, 8, 1.5e9, -0.2e6);
        let header = parse_header(Cursor::new(&bytes), Path::new("synthetic.fil")).unwrap();
        assert_eq!(header.nchans, 4096);
        assert_eq!(header.sample, SampleKind::U8);
        assert_eq!(header.nifs, 1);
        assert_eq!(header.source_name.as_deref(), Some("J0835-4510"));
        assert_eq!(header.data_start, bytes.len() as u64);
    }

    #[test]
    fn rejects_missing_sentinel() {
        let mut bytes = Vec::new();
        push_token(&mut bytes, "HEADER_MIDDLE");
        let err = parse_header(Cursor::new(&bytes), Path::new("bad.fil")).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
    }

    #[test]
    fn rejects_arbitrary_binary() {
        let bytes = [0xFFu8; 64];
        let err = parse_header(Cursor::new(&bytes[..]), Path::new("noise.bin")).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
    }

    #[test]
    fn rejects_nonpositive_channel_count() {
        let bytes = header_bytes(0, 8, 1.5e9, -0.2e6);
        let err = parse_header(Cursor::new(&bytes), Path::new("bad.fil")).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
        let bytes = header_bytes(-7, 8, 1.5e9, -0.2e6);
        let err = parse_header(Cursor::new(&bytes), Path::new("bad.fil")).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
    }

    #[test]
    fn rejects_unsupported_nbits() {
        let bytes = header_bytes(64, 2, 1.5e9, -0.2e6);
        let err = parse_header(Cursor::new(&bytes), Path::new("bad.fil")).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
    }

    #[test]
    fn truncated_header_is_io_error() {
        let bytes = header_bytes(64, 8, 1.5e9, -0.2e6);
        let err =
            parse_header(Cursor::new(&bytes[..bytes.len() - 10]), Path::new("cut.fil"))
                .unwrap_err();
        assert!(matches!(err, MonitorError::Io(_)));
    }

    #[test]
    fn frequencies_ascend_for_descending_band() {
        // foff < 0: header channel order runs high to low, published
        // frequencies still ascend across the band edges.
        let bytes = header_bytes(8, 8, 1.5e9, -1e6);
        let header = parse_header(Cursor::new(&bytes), Path::new("synthetic.fil")).unwrap();
        let freqs = header.frequencies();
        assert_eq!(freqs.len(), 8);
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
        let (f_low, f_high) = header.band_edges();
        assert_eq!(freqs[0], f_low);
        assert!((freqs[7] - f_high).abs() < 1e-3);
        assert!((f_high - f_low - 8e6).abs() < 1e-3);
    }

    #[test]
    fn single_channel_frequency_is_band_bottom() {
        let bytes = header_bytes(1, 8, 1.5e9, 1e6);
        let header = parse_header(Cursor::new(&bytes), Path::new("synthetic.fil")).unwrap();
        let (f_low, _) = header.band_edges();
        assert_eq!(header.frequencies(), vec![f_low]);
    }

    #[test]
    fn constant_file_has_exact_mean_and_zero_std() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = [42u8; 16];
        let path = write_fil(&dir, "const.fil", 16, &[&spectrum, &spectrum, &spectrum]);

        let bandpass = extract(&path, 2).unwrap();
        assert_eq!(bandpass.len(), 16);
        for chan in bandpass.channels() {
            assert_eq!(chan.mean, 42.0);
            assert_eq!(chan.std, 0.0);
        }
    }

    #[test]
    fn per_channel_statistics_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        // Channel 0 alternates 10/20, channel 1 stays at 7.
        let path = write_fil(&dir, "mix.fil", 2, &[&[10, 7], &[20, 7], &[10, 7], &[20, 7]]);

        let bandpass = extract(&path, 10_000).unwrap();
        let chans = bandpass.channels();
        assert_eq!(chans[0].mean, 15.0);
        assert_eq!(chans[0].std, 5.0);
        assert_eq!(chans[1].mean, 7.0);
        assert_eq!(chans[1].std, 0.0);
    }

    #[test]
    fn chunked_and_whole_reads_agree() {
        let dir = tempfile::tempdir().unwrap();
        let spectra: Vec<Vec<u8>> = (0..37u8).map(|i| vec![i, 255 - i, i / 2]).collect();
        let refs: Vec<&[u8]> = spectra.iter().map(|s| s.as_slice()).collect();
        let path = write_fil(&dir, "chunky.fil", 3, &refs);

        let whole = extract(&path, 10_000).unwrap();
        let chunked = extract(&path, 4).unwrap();
        assert_eq!(whole, chunked);
    }

    #[test]
    fn trailing_partial_spectrum_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.fil");
        let mut bytes = header_bytes(4, 8, 1.4e9, -1e6);
        bytes.extend_from_slice(&[9, 9, 9, 9]);
        bytes.extend_from_slice(&[1, 2]); // half a spectrum
        std::fs::write(&path, &bytes).unwrap();

        let bandpass = extract(&path, 10_000).unwrap();
        for chan in bandpass.channels() {
            assert_eq!(chan.mean, 9.0);
        }
    }

    #[test]
    fn header_only_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fil");
        std::fs::write(&path, header_bytes(64, 8, 1.4e9, -1e6)).unwrap();

        let err = extract(&path, 10_000).unwrap_err();
        assert!(matches!(err, MonitorError::Format { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = extract(Path::new("/nonexistent/beam.fil"), 10_000).unwrap_err();
        assert!(matches!(err, MonitorError::Io(_)));
    }

    #[test]
    fn sixteen_bit_samples_decode_little_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.fil");
        let mut bytes = header_bytes(2, 16, 1.4e9, -1e6);
        for value in [300u16, 70u16, 300u16, 70u16] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let bandpass = extract(&path, 10_000).unwrap();
        assert_eq!(bandpass.channels()[0].mean, 300.0);
        assert_eq!(bandpass.channels()[1].mean, 70.0);
    }

    #[test]
    fn float_samples_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.fil");
        let mut bytes = header_bytes(1, 32, 1.4e9, 1e6);
        for value in [1.5f32, 2.5f32] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let bandpass = extract(&path, 10_000).unwrap();
        assert_eq!(bandpass.channels()[0].mean, 2.0);
        assert_eq!(bandpass.channels()[0].std, 0.5);
    }
}
