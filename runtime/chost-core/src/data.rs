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

//! In-memory record buffer with a spill threshold.

use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::record::Record;
use crate::spill::{SortedStream, SpillManager, UnsortedStream};

struct Buffered<T: Record> {
    data: Vec<T>,
    spills: SpillManager,
}

/// Owns every record the shuffle stores locally. Receive workers and the
/// mapper all write through [`DataManager::store`]; one mutex serialises
/// them, and a full buffer is sorted (while presort is on) and spilled
/// before the lock is released.
pub struct DataManager<T: Record> {
    max_data_size: usize,
    presort: AtomicBool,
    buffered: Mutex<Buffered<T>>,
}

impl<T: Record> DataManager<T> {
    pub fn new(dir: impl Into<PathBuf>, max_data_size: usize) -> Self {
        DataManager {
            max_data_size,
            presort: AtomicBool::new(true),
            buffered: Mutex::new(Buffered {
                data: Vec::new(),
                spills: SpillManager::new(dir),
            }),
        }
    }

    /// Takes ownership of one record. Spills the whole buffer once it
    /// reaches the threshold.
    pub fn store(&self, v: T) -> Result<()> {
        let mut buffered = self.buffered.lock().unwrap();
        buffered.data.push(v);
        if buffered.data.len() >= self.max_data_size {
            let mut batch = mem::take(&mut buffered.data);
            if self.presort.load(Ordering::Relaxed) {
                batch.sort_unstable();
            }
            buffered.spills.dump(batch)?;
        }
        Ok(())
    }

    /// Phase-boundary switch: presort stays on through the map phase and
    /// goes off for reduce aggregation.
    pub fn set_presort(&self, presort: bool) {
        self.presort.store(presort, Ordering::Relaxed);
    }

    /// Spills the residual buffer and merge-sorts everything received so
    /// far. Yields `Ok(None)` when presort is off or nothing was stored;
    /// a failed merge step is an error and fails the job locally.
    pub fn into_sorted_stream(&self) -> Result<Option<SortedStream<T>>> {
        if !self.presort.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let mut buffered = self.buffered.lock().unwrap();
        if !buffered.data.is_empty() {
            let mut batch = mem::take(&mut buffered.data);
            batch.sort_unstable();
            buffered.spills.dump(batch)?;
        }
        buffered.spills.into_sorted_stream()
    }

    /// Spills the residual buffer and replays every spill in write order.
    pub fn into_unsorted_stream(&self) -> Result<UnsortedStream<T>> {
        let mut buffered = self.buffered.lock().unwrap();
        if !buffered.data.is_empty() {
            let batch = mem::take(&mut buffered.data);
            buffered.spills.dump(batch)?;
        }
        Ok(buffered.spills.into_unsorted_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Integer;

    #[test]
    fn spill_forced_external_sort() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataManager::new(dir.path(), 4);
        let values = [7, 3, 1, 9, 12, 0, 5, 5, 2, 8, 11, 4, 6, 10, 13, 1, 15, 14, 3, 9];
        for v in values {
            data.store(Integer(v)).unwrap();
        }

        let sorted: Vec<i32> = data
            .into_sorted_stream()
            .unwrap()
            .unwrap()
            .map(|Integer(v)| v)
            .collect();
        assert_eq!(sorted.len(), values.len());
        assert!(sorted.windows(2).all(|w| w[0] <= w[1]));

        // the consuming stream dropped, nothing may remain on disk
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn no_presort_means_no_sorted_stream() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataManager::new(dir.path(), 10);
        data.store(Integer(1)).unwrap();
        data.set_presort(false);
        assert!(data.into_sorted_stream().unwrap().is_none());

        // the unsorted drain still sees the record
        let rest: Vec<Integer> = data.into_unsorted_stream().unwrap().collect();
        assert_eq!(rest, vec![Integer(1)]);
    }

    #[test]
    fn unsorted_drain_preserves_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataManager::new(dir.path(), 3);
        data.set_presort(false);
        for v in [5, 4, 6, 2, 9, 1, 7] {
            data.store(Integer(v)).unwrap();
        }
        let drained: Vec<i32> = data.into_unsorted_stream().unwrap().map(|Integer(v)| v).collect();
        assert_eq!(drained, vec![5, 4, 6, 2, 9, 1, 7]);
    }

    #[test]
    fn concurrent_stores_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataManager::new(dir.path(), 16);
        std::thread::scope(|s| {
            for t in 0..4 {
                let data = &data;
                s.spawn(move || {
                    for i in 0..250 {
                        data.store(Integer(t * 1000 + i)).unwrap();
                    }
                });
            }
        });
        let total = data.into_sorted_stream().unwrap().unwrap().count();
        assert_eq!(total, 1000);
    }
}
