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

//! The typed record codec.
//!
//! A closed set of record shapes travels through the shuffle: [`Integer`],
//! [`Text`] and [`Pair`] of the two. Every shape carries a stable one-byte
//! type tag; the same little-endian byte layout is used on peer sockets and
//! in spill files. [`Pair`] hashes, orders and compares on its key only —
//! the value side exists to be accumulated by [`Record::merge`].

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const TAG_INTEGER: u8 = 0x01;
pub const TAG_TEXT: u8 = 0x02;
/// Reserved tag marking end-of-stream on a peer connection.
pub const TAG_SENTINEL: u8 = 0xFF;

const HASH_PRIME: i32 = 31;

/// Contract every record shape fulfils: a compile-time tag, a
/// deterministic hash, a total order on the canonical key, value-side
/// accumulation, and one binary layout for sockets and spill files.
pub trait Record: Clone + Ord + Send + fmt::Display + 'static {
    const TAG: u8;

    fn hash_code(&self) -> i32;

    /// Value-side accumulation: integers add, text concatenates, pairs
    /// merge their value component.
    fn merge(&mut self, other: Self);

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;
}

/// A signed 32-bit record; its own value is its hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Integer(pub i32);

impl Record for Integer {
    const TAG: u8 = TAG_INTEGER;

    fn hash_code(&self) -> i32 {
        self.0
    }

    fn merge(&mut self, other: Self) {
        self.0 = self.0.wrapping_add(other.0);
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.0)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Integer(r.read_i32::<LittleEndian>()?))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTF-8 record. The prime-31 hash is computed lazily and cached until
/// the value mutates; wrapping i32 arithmetic keeps it reproducible
/// across nodes.
#[derive(Debug, Default)]
pub struct Text {
    value: String,
    hash: Cell<Option<i32>>,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Text { value: value.into(), hash: Cell::new(None) }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.hash.set(None);
    }

    pub fn push_str(&mut self, s: &str) {
        self.value.push_str(s);
        self.hash.set(None);
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::new(s)
    }
}

impl Clone for Text {
    fn clone(&self) -> Self {
        Text::new(self.value.clone())
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Text {}

impl PartialOrd for Text {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Text {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Record for Text {
    const TAG: u8 = TAG_TEXT;

    fn hash_code(&self) -> i32 {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let mut h = 0i32;
        for &b in self.value.as_bytes() {
            h = h.wrapping_mul(HASH_PRIME).wrapping_add(b as i32);
        }
        self.hash.set(Some(h));
        h
    }

    fn merge(&mut self, other: Self) {
        self.push_str(&other.value);
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.value.len() as u64)?;
        w.write_all(self.value.as_bytes())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let len = r.read_u64::<LittleEndian>()?;
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf)?;
        let value = String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Text::new(value))
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.value)
    }
}

/// A key/value record. The key drives hashing, ordering and equality;
/// merging accumulates the value side.
#[derive(Debug, Clone, Default)]
pub struct Pair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K: Record, V: Record> Pair<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Pair { key, value }
    }
}

impl<K: Record, V: Record> PartialEq for Pair<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Record, V: Record> Eq for Pair<K, V> {}

impl<K: Record, V: Record> PartialOrd for Pair<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Record, V: Record> Ord for Pair<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<K: Record, V: Record> Record for Pair<K, V> {
    const TAG: u8 = (K::TAG << 4) | V::TAG;

    fn hash_code(&self) -> i32 {
        self.key.hash_code()
    }

    fn merge(&mut self, other: Self) {
        self.value.merge(other.value);
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.key.write_to(w)?;
        self.value.write_to(w)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let key = K::read_from(r)?;
        let value = V::read_from(r)?;
        Ok(Pair { key, value })
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for Pair<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.key, self.value)
    }
}
