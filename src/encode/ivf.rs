//! Reader for the IVF framing `ffmpeg -f ivf` writes around VP8/VP9 packets.

use std::io::{self, Read};

/// 32-byte IVF file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    /// Timebase is `timebase_num / timebase_den` seconds per pts tick.
    pub timebase_den: u32,
    pub timebase_num: u32,
}

/// One IVF frame: codec payload plus its pts in header timebase ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvfFrame {
    pub pts: u64,
    pub data: Vec<u8>,
}

pub fn read_header<R: Read>(r: &mut R) -> io::Result<IvfHeader> {
    let mut buf = [0u8; 32];
    r.read_exact(&mut buf)?;
    if &buf[0..4] != b"DKIF" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing DKIF signature",
        ));
    }
    let header_len = u16::from_le_bytes([buf[6], buf[7]]);
    if header_len != 32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected IVF header length {header_len}"),
        ));
    }
    Ok(IvfHeader {
        fourcc: [buf[8], buf[9], buf[10], buf[11]],
        width: u16::from_le_bytes([buf[12], buf[13]]),
        height: u16::from_le_bytes([buf[14], buf[15]]),
        timebase_den: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        timebase_num: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
    })
}

/// Read the next frame; `Ok(None)` on a clean end of stream.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<IvfFrame>> {
    let mut hdr = [0u8; 12];
    if !read_exact_or_eof(r, &mut hdr)? {
        return Ok(None);
    }
    let size = u32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]) as usize;
    let mut pts_bytes = [0u8; 8];
    pts_bytes.copy_from_slice(&hdr[4..12]);
    let pts = u64::from_le_bytes(pts_bytes);
    let mut data = vec![0u8; size];
    r.read_exact(&mut data)?;
    Ok(Some(IvfFrame { pts, data }))
}

/// Whether a VP9 packet starts with a shown key frame.
///
/// Reads `frame_marker`, `profile`, `show_existing_frame` and `frame_type` from the first
/// bits of the uncompressed header; a superframe starts with its first frame's header.
pub fn vp9_is_keyframe(data: &[u8]) -> bool {
    let Some(&b) = data.first() else {
        return false;
    };
    if b >> 6 != 0b10 {
        return false;
    }
    let profile_low = (b >> 5) & 1;
    let profile_high = (b >> 4) & 1;
    let profile = (profile_high << 1) | profile_low;
    // Profile 3 carries one reserved bit before show_existing_frame.
    let mut bit = if profile == 3 { 2 } else { 3 };
    let show_existing = (b >> bit) & 1;
    if show_existing == 1 {
        return false;
    }
    bit -= 1;
    (b >> bit) & 1 == 0
}

/// `read_exact` that reports a clean EOF before the first byte as `false`.
pub(crate) fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a record header",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
