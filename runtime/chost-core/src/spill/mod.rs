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

//! Spill files and the bounded-fan-in external merge sort.
//!
//! A spill file is a plain sequence of records in wire layout, named by a
//! short random token inside the job working directory. The manager owns
//! every spill it created until the files are handed to a consuming
//! [`SortedStream`] or [`UnsortedStream`]; whoever holds them last deletes
//! them on drop.

mod sorted;
mod unsorted;

pub use sorted::SortedStream;
pub use unsorted::UnsortedStream;

use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::thread;

use crate::config::{
    random_token, MERGE_SORT_WAY, RANDOM_FILE_NAME_LENGTH, SPILL_OPEN_ATTEMPTS,
    SPILL_OPEN_RETRY_INTERVAL,
};
use crate::error::{Error, Result};
use crate::record::Record;

/// Reads one record off a spill reader; end of file (including a
/// truncated trailing record) ends the stream.
pub(crate) fn read_record<T: Record, R: BufRead>(reader: &mut R) -> Option<T> {
    match reader.fill_buf() {
        Ok(buf) if buf.is_empty() => return None,
        Ok(_) => {}
        Err(e) => {
            log::warn!("spill read failed: {e}");
            return None;
        }
    }
    match T::read_from(reader) {
        Ok(v) => Some(v),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(e) => {
            log::warn!("corrupt spill record: {e}");
            None
        }
    }
}

/// Allocates, fills and finally merge-sorts spill files in one working
/// directory.
pub struct SpillManager {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl SpillManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SpillManager { dir: dir.into(), files: Vec::new() }
    }

    /// Number of spill files currently owned.
    pub fn spill_count(&self) -> usize {
        self.files.len()
    }

    /// Opens a fresh spill file, retrying briefly on failure. The path is
    /// registered before the first write so cleanup always sees it.
    fn open_spill(&mut self) -> Option<BufWriter<File>> {
        for attempt in 0.. {
            let name = format!(".{}", random_token(RANDOM_FILE_NAME_LENGTH));
            let path = self.dir.join(name);
            match File::create(&path) {
                Ok(f) => {
                    self.files.push(path);
                    return Some(BufWriter::new(f));
                }
                Err(e) if attempt + 1 < SPILL_OPEN_ATTEMPTS => {
                    log::error!("cannot create spill file in {}: {e}", self.dir.display());
                    thread::sleep(SPILL_OPEN_RETRY_INTERVAL);
                }
                Err(e) => {
                    log::error!("giving up on spill file in {}: {e}", self.dir.display());
                    return None;
                }
            }
        }
        unreachable!()
    }

    /// Writes a batch of records, in the caller's order, to a new spill.
    pub fn dump<T: Record>(&mut self, records: Vec<T>) -> Result<()> {
        let mut writer = match self.open_spill() {
            Some(w) => w,
            None => return Err(Error::Io(io::Error::other("spill open failed"))),
        };
        for record in &records {
            record.write_to(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// K-way merges one window of spill files (fan-in ≤ [`MERGE_SORT_WAY`])
    /// into a fresh spill appended to the list. The window files are
    /// deleted once merged.
    fn unit_merge<T: Record>(&mut self, window: Vec<PathBuf>) -> Result<()> {
        let source = SortedStream::<T>::over(window);
        let mut writer = match self.open_spill() {
            Some(w) => w,
            None => return Err(Error::Io(io::Error::other("spill open failed"))),
        };
        for record in source {
            record.write_to(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// External merge sort over the owned spills, leaving at most
    /// [`MERGE_SORT_WAY`] files for the sorted stream to heap-merge.
    fn merge_sort<T: Record>(&mut self) -> Result<()> {
        let way = MERGE_SORT_WAY;

        // full phase: fold the most recent window while the file count
        // stays quadratic in the fan-in
        while self.files.len() >= way * way {
            let window = self.files.split_off(self.files.len() - way);
            self.unit_merge::<T>(window)?;
        }

        // grid phase: windows from the oldest end, sized so exactly `way`
        // files remain and large prefixes are read only once
        let count = self.files.len();
        if count > way {
            let full = (count - way) / (way - 1);
            let remain = (count - way) % (way - 1) + 1;

            let mut drain = mem::take(&mut self.files).into_iter();
            let merged = (|| -> Result<()> {
                for _ in 0..full {
                    let window: Vec<_> = drain.by_ref().take(way).collect();
                    self.unit_merge::<T>(window)?;
                }
                let window: Vec<_> = drain.by_ref().take(remain).collect();
                if !window.is_empty() {
                    self.unit_merge::<T>(window)?;
                }
                Ok(())
            })();
            // unmerged files stay owned so cleanup still sees them
            self.files.extend(drain);
            merged?;
        }
        Ok(())
    }

    /// Merge-sorts the remaining spills and hands them all to a sorted
    /// stream. `None` when no record was ever spilled.
    pub fn into_sorted_stream<T: Record>(&mut self) -> Result<Option<SortedStream<T>>> {
        self.merge_sort::<T>()?;
        let stream = SortedStream::over(mem::take(&mut self.files));
        Ok(if stream.is_empty() { None } else { Some(stream) })
    }

    /// Hands every spill to an unsorted stream, list order preserved.
    pub fn into_unsorted_stream<T: Record>(&mut self) -> UnsortedStream<T> {
        UnsortedStream::over(mem::take(&mut self.files))
    }

    /// Deletes every spill file still owned.
    pub fn clear(&mut self) {
        for path in self.files.drain(..) {
            remove_spill(&path);
        }
    }
}

impl Drop for SpillManager {
    fn drop(&mut self) {
        self.clear();
    }
}

pub(crate) fn remove_spill(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("cannot remove spill {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Integer, Pair, Text};

    fn remaining_spills(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn spill_round_trips_a_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        let batch: Vec<Integer> = (0..100).map(Integer).collect();
        spills.dump(batch.clone()).unwrap();
        assert_eq!(spills.spill_count(), 1);

        let collected: Vec<Integer> = spills.into_unsorted_stream().collect();
        assert_eq!(collected, batch);
        assert_eq!(remaining_spills(dir.path()), 0);
    }

    #[test]
    fn sorted_stream_merges_presorted_spills() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        spills.dump(vec![Integer(1), Integer(5), Integer(9)]).unwrap();
        spills.dump(vec![Integer(2), Integer(2), Integer(8)]).unwrap();
        spills.dump(vec![Integer(0), Integer(7)]).unwrap();

        let sorted: Vec<Integer> = spills.into_sorted_stream().unwrap().unwrap().collect();
        assert_eq!(
            sorted,
            [0, 1, 2, 2, 5, 7, 8, 9].map(Integer).to_vec()
        );
        assert_eq!(remaining_spills(dir.path()), 0);
    }

    #[test]
    fn grid_phase_kicks_in_above_the_fan_in() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        // way < 20 < way * way with the default fan-in of 16
        for base in 0..20 {
            let mut batch: Vec<Integer> = (0..50).map(|i| Integer(base + i * 20)).collect();
            batch.sort_unstable();
            spills.dump(batch).unwrap();
        }

        let sorted: Vec<Integer> = spills.into_sorted_stream().unwrap().unwrap().collect();
        assert_eq!(sorted.len(), 1000);
        assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(remaining_spills(dir.path()), 0);
    }

    #[test]
    fn full_phase_collapses_hundreds_of_spills() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        for v in (0..300).rev() {
            spills.dump(vec![Integer(v)]).unwrap();
        }
        assert!(spills.spill_count() >= MERGE_SORT_WAY * MERGE_SORT_WAY);

        let sorted: Vec<Integer> = spills.into_sorted_stream().unwrap().unwrap().collect();
        assert_eq!(sorted, (0..300).map(Integer).collect::<Vec<_>>());
        assert_eq!(remaining_spills(dir.path()), 0);
    }

    #[test]
    fn sorting_sorted_output_again_is_a_fixpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        spills.dump(vec![Integer(3), Integer(4)]).unwrap();
        spills.dump(vec![Integer(1), Integer(9)]).unwrap();
        let first: Vec<Integer> = spills.into_sorted_stream().unwrap().unwrap().collect();

        let mut again = SpillManager::new(dir.path());
        again.dump(first.clone()).unwrap();
        let second: Vec<Integer> = again.into_sorted_stream().unwrap().unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn pairs_merge_by_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        spills
            .dump(vec![
                Pair::new(Text::new("ant"), Integer(1)),
                Pair::new(Text::new("fox"), Integer(1)),
            ])
            .unwrap();
        spills
            .dump(vec![
                Pair::new(Text::new("bee"), Integer(1)),
                Pair::new(Text::new("fox"), Integer(1)),
            ])
            .unwrap();

        let keys: Vec<String> = spills
            .into_sorted_stream::<Pair<Text, Integer>>()
            .unwrap()
            .unwrap()
            .map(|p| p.key.into_string())
            .collect();
        assert_eq!(keys, ["ant", "bee", "fox", "fox"]);
    }

    #[test]
    fn empty_manager_yields_no_sorted_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut spills = SpillManager::new(dir.path());
        assert!(spills.into_sorted_stream::<Integer>().unwrap().is_none());
    }

    #[test]
    fn drop_removes_unconsumed_spills() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut spills = SpillManager::new(dir.path());
            spills.dump(vec![Integer(1)]).unwrap();
            spills.dump(vec![Integer(2)]).unwrap();
            assert_eq!(remaining_spills(dir.path()), 2);
        }
        assert_eq!(remaining_spills(dir.path()), 0);
    }
}
