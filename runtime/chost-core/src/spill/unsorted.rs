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

//! Sequential replay of spill files in list order.

use std::fs::File;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::PathBuf;

use crate::record::Record;

use super::{read_record, remove_spill};

/// Owns a set of spill files and reads them back one at a time, in the
/// order they were written. Files are deleted when the stream drops.
pub struct UnsortedStream<T: Record> {
    files: Vec<PathBuf>,
    index: usize,
    current: Option<BufReader<File>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> UnsortedStream<T> {
    pub(crate) fn over(files: Vec<PathBuf>) -> Self {
        UnsortedStream { files, index: 0, current: None, _marker: PhantomData }
    }
}

impl<T: Record> Iterator for UnsortedStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(record) = read_record::<T, _>(reader) {
                    return Some(record);
                }
                self.current = None;
            }
            let path = self.files.get(self.index)?;
            self.index += 1;
            match File::open(path) {
                Ok(f) => self.current = Some(BufReader::new(f)),
                Err(e) => log::warn!("cannot reopen spill {}: {e}", path.display()),
            }
        }
    }
}

impl<T: Record> Drop for UnsortedStream<T> {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            remove_spill(&path);
        }
    }
}
