//! Minimal EBML element writer and reader.
//!
//! Elements are built bottom-up in memory: a master element's body is serialized first so its
//! size is known when the header is written.

/// Largest value a size vint can carry; the all-ones pattern is reserved for "unknown".
const MAX_SIZE: u64 = (1 << 56) - 2;

/// Append an element id in its natural big-endian form (the marker bit is part of the id).
pub fn write_id(out: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    out.extend_from_slice(&bytes[skip..]);
}

/// Number of bytes the shortest size vint for `len` takes.
pub fn size_len(len: u64) -> usize {
    (1..=8)
        .find(|&l| len < (1u64 << (7 * l)) - 1)
        .unwrap_or(8)
}

/// Append `len` as a size vint using the shortest encoding.
pub fn write_size(out: &mut Vec<u8>, len: u64) {
    let l = size_len(len);
    let marked = len.min(MAX_SIZE) | (1u64 << (7 * l));
    out.extend_from_slice(&marked.to_be_bytes()[8 - l..]);
}

fn uint_bytes(v: u64) -> usize {
    (1..=8).find(|&n| n == 8 || v < (1u64 << (8 * n))).unwrap_or(8)
}

pub fn put_uint(out: &mut Vec<u8>, id: u32, v: u64) {
    put_uint_width(out, id, v, uint_bytes(v));
}

/// Unsigned integer element with a fixed payload width, for values patched in later passes.
pub fn put_uint_width(out: &mut Vec<u8>, id: u32, v: u64, width: usize) {
    let width = width.clamp(1, 8);
    write_id(out, id);
    write_size(out, width as u64);
    out.extend_from_slice(&v.to_be_bytes()[8 - width..]);
}

pub fn put_float(out: &mut Vec<u8>, id: u32, v: f64) {
    write_id(out, id);
    write_size(out, 8);
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_str(out: &mut Vec<u8>, id: u32, s: &str) {
    put_bytes(out, id, s.as_bytes());
}

pub fn put_bytes(out: &mut Vec<u8>, id: u32, data: &[u8]) {
    write_id(out, id);
    write_size(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Append a master element whose children are written by `body`.
pub fn put_master(out: &mut Vec<u8>, id: u32, body: impl FnOnce(&mut Vec<u8>)) {
    let mut inner = Vec::new();
    body(&mut inner);
    put_bytes(out, id, &inner);
}

/// A parsed element header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u32,
    /// Payload size; `None` for the reserved "unknown size".
    pub size: Option<u64>,
    /// Bytes taken by id + size.
    pub header_len: usize,
}

/// Read a vint from the start of `buf`: `(value without marker, length, all_ones)`.
pub fn read_vint(buf: &[u8]) -> Option<(u64, usize, bool)> {
    let first = *buf.first()?;
    if first == 0 {
        return None;
    }
    let len = first.leading_zeros() as usize + 1;
    let bytes = buf.get(..len)?;
    let mut v = u64::from(first) & ((1u64 << (8 - len)) - 1);
    for &b in &bytes[1..] {
        v = (v << 8) | u64::from(b);
    }
    let all_ones = v == (1u64 << (7 * len)) - 1;
    Some((v, len, all_ones))
}

pub fn read_header(buf: &[u8]) -> Option<ElementHeader> {
    let first = *buf.first()?;
    if first == 0 {
        return None;
    }
    let id_len = first.leading_zeros() as usize + 1;
    if id_len > 4 {
        return None;
    }
    let id = buf
        .get(..id_len)?
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
    let (size, size_len, unknown) = read_vint(&buf[id_len..])?;
    Some(ElementHeader {
        id,
        size: (!unknown).then_some(size),
        header_len: id_len + size_len,
    })
}

pub fn read_uint(payload: &[u8]) -> Option<u64> {
    if payload.len() > 8 {
        return None;
    }
    Some(payload.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

pub fn read_float(payload: &[u8]) -> Option<f64> {
    match payload.len() {
        0 => Some(0.0),
        4 => Some(f64::from(f32::from_be_bytes(payload.try_into().ok()?))),
        8 => Some(f64::from_be_bytes(payload.try_into().ok()?)),
        _ => None,
    }
}

/// Iterator over the sibling elements packed in `buf`, yielding `(id, payload)`.
///
/// Stops at the first malformed header; an unknown-size element takes the rest of `buf`.
pub struct Children<'a> {
    buf: &'a [u8],
}

pub fn children(buf: &[u8]) -> Children<'_> {
    Children { buf }
}

impl<'a> Iterator for Children<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let h = read_header(self.buf)?;
        let rest = &self.buf[h.header_len..];
        let size = match h.size {
            Some(s) => usize::try_from(s).ok()?.min(rest.len()),
            None => rest.len(),
        };
        let (payload, tail) = rest.split_at(size);
        self.buf = tail;
        Some((h.id, payload))
    }
}
