// Copyright 2026 The CHost Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Control-socket verbs and length-prefixed transfers.
//!
//! Strings and files travel as an `i64` little-endian size followed by
//! that many bytes. A size of zero (or less) carries no payload; on the
//! split channel it marks end-of-input.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const CALL_MASTER: u8 = 0x01;
pub const CALL_WORKER: u8 = 0x02;
pub const CALL_POLL: u8 = 0x03;
pub const RES_SUCCESS: u8 = 0x10;
pub const RES_FAIL: u8 = 0x11;

pub fn write_verb<W: Write>(w: &mut W, verb: u8) -> io::Result<()> {
    w.write_u8(verb)
}

pub fn read_verb<R: Read>(r: &mut R) -> io::Result<u8> {
    r.read_u8()
}

pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_i64::<LittleEndian>(bytes.len() as i64)?;
    w.write_all(bytes)
}

pub fn read_bytes<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let size = r.read_i64::<LittleEndian>()?;
    if size <= 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; size as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_text<W: Write>(w: &mut W, text: &str) -> io::Result<()> {
    write_bytes(w, text.as_bytes())
}

pub fn read_text<R: Read>(r: &mut R) -> io::Result<String> {
    String::from_utf8(read_bytes(r)?)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Streams a local file over the socket as one length-prefixed chunk.
pub fn send_file<W: Write>(w: &mut W, path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    w.write_i64::<LittleEndian>(size as i64)?;
    let mut reader = BufReader::new(file);
    io::copy(&mut reader, w)?;
    Ok(())
}

/// Receives a length-prefixed chunk into a local file, replacing it.
pub fn receive_file<R: Read>(r: &mut R, path: &Path) -> io::Result<()> {
    let size = r.read_i64::<LittleEndian>()?;
    let mut writer = BufWriter::new(File::create(path)?);
    if size > 0 {
        io::copy(&mut r.take(size as u64), &mut writer)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn bytes_round_trip() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"split payload").unwrap();
        assert_eq!(read_bytes(&mut Cursor::new(&buf)).unwrap(), b"split payload");
    }

    #[test]
    fn empty_chunk_marks_end() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"").unwrap();
        assert_eq!(buf.len(), 8);
        assert!(read_bytes(&mut Cursor::new(&buf)).unwrap().is_empty());

        // a negative size is also an end marker
        let mut neg = Vec::new();
        neg.write_i64::<LittleEndian>(-1).unwrap();
        assert!(read_bytes(&mut Cursor::new(&neg)).unwrap().is_empty());
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, b"the quick brown fox").unwrap();

        let mut wire = Vec::new();
        send_file(&mut wire, &src).unwrap();
        receive_file(&mut Cursor::new(&wire), &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"the quick brown fox");
    }
}
