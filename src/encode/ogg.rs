//! Ogg page reader and Opus packet helpers for `ffmpeg -f ogg` output.

use std::io::{self, Read};

use crate::encode::ivf::read_exact_or_eof;

/// Opus always runs its decoder clock at 48 kHz.
pub const OPUS_CLOCK_HZ: u32 = 48_000;

/// Reassembles logical packets from a single-stream Ogg bitstream.
pub struct OggPacketReader<R> {
    inner: R,
    partial: Vec<u8>,
    ready: std::collections::VecDeque<Vec<u8>>,
    eof: bool,
}

impl<R: Read> OggPacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            partial: Vec::new(),
            ready: std::collections::VecDeque::new(),
            eof: false,
        }
    }

    /// Next complete packet; `Ok(None)` once the stream ends.
    pub fn next_packet(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(p) = self.ready.pop_front() {
                return Ok(Some(p));
            }
            if self.eof {
                return Ok(None);
            }
            if !self.read_page()? {
                self.eof = true;
            }
        }
    }

    fn read_page(&mut self) -> io::Result<bool> {
        let mut hdr = [0u8; 27];
        if !read_exact_or_eof(&mut self.inner, &mut hdr)? {
            return Ok(false);
        }
        if &hdr[0..4] != b"OggS" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing OggS capture pattern",
            ));
        }
        if hdr[4] != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported Ogg version {}", hdr[4]),
            ));
        }
        let nsegs = usize::from(hdr[26]);
        let mut lacing = vec![0u8; nsegs];
        self.inner.read_exact(&mut lacing)?;
        let body_len: usize = lacing.iter().map(|&l| usize::from(l)).sum();
        let mut body = vec![0u8; body_len];
        self.inner.read_exact(&mut body)?;

        let mut off = 0usize;
        for &l in &lacing {
            let l = usize::from(l);
            self.partial.extend_from_slice(&body[off..off + l]);
            off += l;
            // A lacing value below 255 terminates the packet.
            if l < 255 {
                self.ready.push_back(std::mem::take(&mut self.partial));
            }
        }
        Ok(true)
    }
}

/// `pre_skip` from an `OpusHead` packet, in 48 kHz samples.
pub fn opus_head_pre_skip(head: &[u8]) -> Option<u16> {
    if head.len() < 19 || &head[0..8] != b"OpusHead" {
        return None;
    }
    Some(u16::from_le_bytes([head[10], head[11]]))
}

pub fn is_opus_tags(packet: &[u8]) -> bool {
    packet.starts_with(b"OpusTags")
}

/// Samples (at 48 kHz) an Opus packet decodes to, read from its TOC byte.
pub fn opus_packet_samples(packet: &[u8]) -> Option<u32> {
    let toc = *packet.first()?;
    let config = toc >> 3;
    let per_frame: u32 = match config {
        0..=11 => [480, 960, 1920, 2880][usize::from(config % 4)],
        12..=15 => [480, 960][usize::from(config % 2)],
        _ => [120, 240, 480, 960][usize::from(config % 4)],
    };
    let frames = match toc & 0b11 {
        0 => 1,
        1 | 2 => 2,
        _ => u32::from(*packet.get(1)? & 0x3F),
    };
    Some(per_frame * frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn page(lacing: &[u8], body: &[u8]) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(b"OggS");
        p.push(0);
        p.push(0);
        p.extend_from_slice(&0u64.to_le_bytes());
        p.extend_from_slice(&1u32.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.push(lacing.len() as u8);
        p.extend_from_slice(lacing);
        p.extend_from_slice(body);
        p
    }

    #[test]
    fn packets_span_pages_through_255_lacing() {
        let big = vec![7u8; 300];
        let mut bytes = page(&[3, 255], &[[1u8, 2, 3].as_slice(), &big[..255]].concat());
        bytes.extend(page(&[45, 1], &[&big[255..], [9u8].as_slice()].concat()));
        let mut r = OggPacketReader::new(Cursor::new(bytes));

        assert_eq!(r.next_packet().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(r.next_packet().unwrap(), Some(big));
        assert_eq!(r.next_packet().unwrap(), Some(vec![9]));
        assert_eq!(r.next_packet().unwrap(), None);
    }

    #[test]
    fn rejects_garbage() {
        let mut r = OggPacketReader::new(Cursor::new(vec![0u8; 40]));
        assert!(r.next_packet().is_err());
    }

    #[test]
    fn reads_opus_head_pre_skip() {
        let mut head = b"OpusHead".to_vec();
        head.push(1);
        head.push(2);
        head.extend_from_slice(&312u16.to_le_bytes());
        head.extend_from_slice(&48_000u32.to_le_bytes());
        head.extend_from_slice(&0u16.to_le_bytes());
        head.push(0);
        assert_eq!(opus_head_pre_skip(&head), Some(312));
        assert_eq!(opus_head_pre_skip(b"OpusTags"), None);
        assert!(is_opus_tags(b"OpusTags\0\0"));
    }

    #[test]
    fn toc_durations() {
        // CELT fullband 20 ms, one frame.
        assert_eq!(opus_packet_samples(&[31 << 3]), Some(960));
        // CELT 2.5 ms, two frames.
        assert_eq!(opus_packet_samples(&[(16 << 3) | 1]), Some(240));
        // SILK 60 ms.
        assert_eq!(opus_packet_samples(&[3 << 3]), Some(2880));
        // Hybrid 10 ms, code 3 with 4 frames.
        assert_eq!(opus_packet_samples(&[(12 << 3) | 3, 4]), Some(1920));
        assert_eq!(opus_packet_samples(&[]), None);
    }
}
