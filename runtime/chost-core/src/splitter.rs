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

//! Line-aligned input splits.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Mutex;

use crate::config::SPLIT_SIZE;

struct Inner {
    file: Option<File>,
    // carried tail: bytes after the last newline of the previous refill
    buffer: Vec<u8>,
    tail_len: usize,
    aborted: bool,
}

/// Serves splits of at most [`SPLIT_SIZE`] bytes from a local file, each
/// ending on a newline. The refill buffer and file handle sit behind one
/// mutex so any number of mapper threads may poll concurrently.
///
/// A single line longer than the split size is unsupported: the splitter
/// closes the file and reports it as not fully consumed.
pub struct Splitter {
    inner: Mutex<Inner>,
}

impl Splitter {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Splitter {
            inner: Mutex::new(Inner {
                file: Some(file),
                buffer: vec![0u8; SPLIT_SIZE],
                tail_len: 0,
                aborted: false,
            }),
        })
    }

    /// True while the file is open and data may remain.
    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().file.is_some()
    }

    /// True once the file ended cleanly; false while data remains or
    /// after a long-line abort.
    pub fn fully_consumed(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.file.is_none() && !inner.aborted
    }

    /// Next split, or `None` at end of input.
    pub fn next(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.file.as_ref()?;

        // refill behind the carried tail
        let mut filled = inner.tail_len;
        loop {
            if filled == SPLIT_SIZE {
                break;
            }
            // file and buffer live behind the same guard
            let read = {
                let Inner { file, buffer, .. } = &mut *inner;
                match file.as_mut() {
                    Some(f) => f.read(&mut buffer[filled..SPLIT_SIZE]),
                    None => break,
                }
            };
            let n = match read {
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("split read failed: {e}");
                    return inner.abort();
                }
            };
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == inner.tail_len {
            // EOF: emit the tail once, newline-terminated, then close
            inner.file = None;
            if inner.tail_len == 0 {
                return None;
            }
            let mut split = match to_text(&inner.buffer[..inner.tail_len]) {
                Some(s) => s,
                None => return inner.abort(),
            };
            split.push('\n');
            inner.tail_len = 0;
            return Some(split);
        }

        match inner.buffer[..filled].iter().rposition(|&b| b == b'\n') {
            Some(nl) => {
                let split = match to_text(&inner.buffer[..=nl]) {
                    Some(s) => s,
                    None => return inner.abort(),
                };
                inner.buffer.copy_within(nl + 1..filled, 0);
                inner.tail_len = filled - nl - 1;
                Some(split)
            }
            None => {
                log::error!("line exceeds split size; file is not consumed completely");
                inner.abort()
            }
        }
    }
}

impl Inner {
    fn abort(&mut self) -> Option<String> {
        self.file = None;
        self.aborted = true;
        self.tail_len = 0;
        None
    }
}

fn to_text(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s.to_owned()),
        Err(e) => {
            log::error!("input is not valid utf-8: {e}");
            None
        }
    }
}
