//! Big-endian primitives shared by the SFTP message codecs.
//!
//! Readers take a `&mut &[u8]` cursor and advance it past the value they
//! consume, so the slice left behind is always the unread remainder. Every
//! read is bounds-checked: a buffer shorter than the declared length yields
//! [`UsftpError::Malformed`] instead of panicking.
//!
//! Writers append to any [`BufMut`] sink.

use bytes::{Buf, BufMut};
use usftp_platform::{UsftpError, UsftpResult};

fn ensure(buf: &[u8], needed: usize, what: &str) -> UsftpResult<()> {
    if buf.remaining() < needed {
        return Err(UsftpError::Malformed(format!(
            "need {} bytes for {}, have {}",
            needed,
            what,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Reads one byte.
pub fn read_u8(buf: &mut &[u8]) -> UsftpResult<u8> {
    ensure(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

/// Reads a big-endian `u32`.
pub fn read_u32(buf: &mut &[u8]) -> UsftpResult<u32> {
    ensure(buf, 4, "u32")?;
    Ok(buf.get_u32())
}

/// Reads a big-endian `u64`.
pub fn read_u64(buf: &mut &[u8]) -> UsftpResult<u64> {
    ensure(buf, 8, "u64")?;
    Ok(buf.get_u64())
}

/// Reads a `u32` length prefix followed by that many raw bytes.
pub fn read_bytes(buf: &mut &[u8]) -> UsftpResult<Vec<u8>> {
    let len = read_u32(buf)? as usize;
    ensure(buf, len, "string body")?;
    let (value, rest) = buf.split_at(len);
    *buf = rest;
    Ok(value.to_vec())
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string(buf: &mut &[u8]) -> UsftpResult<String> {
    let bytes = read_bytes(buf)?;
    String::from_utf8(bytes)
        .map_err(|_| UsftpError::Malformed("string contains invalid UTF-8".to_string()))
}

/// Writes one byte.
pub fn write_u8<B: BufMut>(buf: &mut B, value: u8) {
    buf.put_u8(value);
}

/// Writes a big-endian `u32`.
pub fn write_u32<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u32(value);
}

/// Writes a big-endian `u64`.
pub fn write_u64<B: BufMut>(buf: &mut B, value: u64) {
    buf.put_u64(value);
}

/// Writes raw bytes with a `u32` length prefix.
pub fn write_bytes<B: BufMut>(buf: &mut B, value: &[u8]) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value);
}

/// Writes a string with a `u32` byte-length prefix.
pub fn write_string<B: BufMut>(buf: &mut B, value: &str) {
    write_bytes(buf, value.as_bytes());
}
