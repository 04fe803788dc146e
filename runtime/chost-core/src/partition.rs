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

//! Maps a record hash to the node that owns it.

/// Pluggable partitioning strategy. Implementations must be pure: the same
/// `(hash, cluster_size)` input yields the same node on every peer.
pub trait Partitioner: Send + Sync {
    fn partition(&self, hash: i32, cluster_size: usize) -> usize;
}

/// Remainder method over the absolute hash; `i32::MIN` pins to node 0
/// since its absolute value does not exist.
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&self, hash: i32, cluster_size: usize) -> usize {
        if hash == i32::MIN {
            return 0;
        }
        hash.unsigned_abs() as usize % cluster_size
    }
}

/// Routes everything to node 0; reduce aggregation lands on the master.
pub struct ZeroPartitioner;

impl Partitioner for ZeroPartitioner {
    fn partition(&self, _hash: i32, _cluster_size: usize) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_partition_is_remainder_of_abs() {
        let p = HashPartitioner;
        assert_eq!(p.partition(7, 4), 3);
        assert_eq!(p.partition(-7, 4), 3);
        assert_eq!(p.partition(0, 4), 0);
        assert_eq!(p.partition(i32::MIN, 4), 0);
        assert_eq!(p.partition(i32::MAX, 1), 0);
    }

    #[test]
    fn zero_partition_pins_to_master() {
        let p = ZeroPartitioner;
        for h in [-3, 0, 12345, i32::MIN] {
            assert_eq!(p.partition(h, 8), 0);
        }
    }
}
