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

//! Core of a small distributed MapReduce runtime.
//!
//! Every node of a fixed-size cluster runs the same job over a full mesh
//! of peer-to-peer record streams. The shuffle core partitions emitted
//! records to their owning node, spills inbound records to local files
//! when the in-memory buffer fills, and drains them back as an
//! externally merge-sorted stream for the reduce phase. Around it sit
//! the input splitter and source pullers, the cluster controller
//! plumbing and a general-purpose thread pool.

pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod net;
pub mod partition;
pub mod pool;
pub mod queue;
pub mod record;
pub mod shuffle;
pub mod source;
pub mod spill;
pub mod splitter;
pub mod stream;

pub use config::Peer;
pub use error::{Error, Result};
pub use job::{run_simple_job, JobContext, JobFn};
pub use partition::{HashPartitioner, Partitioner, ZeroPartitioner};
pub use record::{Integer, Pair, Record, Text};
pub use shuffle::StreamManager;
pub use source::{MasterSource, SplitSource, WorkerSource};
pub use spill::{SortedStream, UnsortedStream};
