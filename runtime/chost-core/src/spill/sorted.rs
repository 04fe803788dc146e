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

//! K-way heap merge over presorted spill files.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::record::Record;

use super::{read_record, remove_spill};

struct Cursor<T: Record> {
    head: T,
    reader: BufReader<File>,
}

impl<T: Record> PartialEq for Cursor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head
    }
}

impl<T: Record> Eq for Cursor<T> {}

impl<T: Record> PartialOrd for Cursor<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Record> Ord for Cursor<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.head.cmp(&other.head)
    }
}

/// Owns a set of presorted spill files and yields their records in
/// non-decreasing key order through a min-heap of per-file cursors.
/// Every file either contributed its head to the heap at construction or
/// was empty and discarded; all of them are deleted when the stream
/// drops.
pub struct SortedStream<T: Record> {
    files: Vec<PathBuf>,
    heap: BinaryHeap<Reverse<Cursor<T>>>,
}

impl<T: Record> SortedStream<T> {
    /// Takes ownership of `files` and primes the heap with each file's
    /// head record.
    pub(crate) fn over(files: Vec<PathBuf>) -> Self {
        let mut heap = BinaryHeap::with_capacity(files.len());
        for path in &files {
            let file = match File::open(path) {
                Ok(f) => f,
                Err(e) => {
                    log::warn!("cannot reopen spill {}: {e}", path.display());
                    continue;
                }
            };
            let mut reader = BufReader::new(file);
            if let Some(head) = read_record::<T, _>(&mut reader) {
                heap.push(Reverse(Cursor { head, reader }));
            }
        }
        SortedStream { files, heap }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T: Record> Iterator for SortedStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let Reverse(Cursor { head, mut reader }) = self.heap.pop()?;
        if let Some(next) = read_record::<T, _>(&mut reader) {
            self.heap.push(Reverse(Cursor { head: next, reader }));
        }
        Some(head)
    }
}

impl<T: Record> Drop for SortedStream<T> {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            remove_spill(&path);
        }
    }
}
