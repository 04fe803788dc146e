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

//! Cluster tunables, peer-list handling and the on-disk job layout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::{Error, Result};

/// Per-user root of all job state (`$HOME/.CHost`).
pub const TEMP_DIR: &str = ".CHost";
/// Peer list file name inside a job working directory.
pub const IPCONFIG_FILE: &str = "ipconfig";
/// Serialized job artifact name on workers.
pub const JOB_FILE: &str = "job";

pub const RANDOM_FILE_NAME_LENGTH: usize = 8;
pub const RANDOM_JOB_NAME_LENGTH: usize = 5;

/// Records buffered in memory before the data manager spills.
pub const DEFAULT_MAX_DATA_SIZE: usize = 1_000_000;
/// Fan-in of the external merge sort.
pub const MERGE_SORT_WAY: usize = 16;
/// Upper bound on input split size; splits are line-aligned below this.
pub const SPLIT_SIZE: usize = 65536;

pub const MAX_CONNECTION_ATTEMPT: u32 = 15;
pub const CONNECTION_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);
pub const SPILL_OPEN_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const SPILL_OPEN_ATTEMPTS: u32 = 3;

pub const THREAD_POOL_SIZE: usize = 4;
/// Mapper threads polled against the source when multi-mapper is enabled.
pub const NUM_MAPPER: usize = 4;

/// Shuffle port, identical cluster-wide unless a peer carries an override.
pub const STREAM_PORT: u16 = 8711;
/// Control port for chrun and master/worker RPC.
pub const SERVER_PORT: u16 = 8712;

pub const BUFFER_SIZE: usize = 1024;

/// One cluster member. The address is an IPv4 literal, optionally suffixed
/// with `:port` to override [`STREAM_PORT`] (used when several nodes share
/// a host). The first peer of a node's list is always the node itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: usize,
    pub addr: String,
}

impl Peer {
    pub fn new(id: usize, addr: impl Into<String>) -> Self {
        Peer { id, addr: addr.into() }
    }

    /// Host part without any port override.
    pub fn host(&self) -> &str {
        self.addr.split(':').next().unwrap_or(&self.addr)
    }

    /// Port this peer's shuffle listener binds to.
    pub fn shuffle_port(&self) -> u16 {
        self.addr
            .split_once(':')
            .and_then(|(_, p)| p.parse().ok())
            .unwrap_or(STREAM_PORT)
    }

    /// Address other nodes dial to reach this peer's shuffle listener.
    pub fn shuffle_addr(&self) -> String {
        format!("{}:{}", self.host(), self.shuffle_port())
    }

    /// Address the master dials to reach this peer's control server.
    pub fn control_addr(&self, port: u16) -> String {
        format!("{}:{}", self.host(), port)
    }
}

/// Parses peer lines of the form `"<nodeId> <ipv4>"`, self first.
pub fn parse_peers(text: &str) -> Result<Vec<Peer>> {
    let mut peers = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (id, addr) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::Config(format!("malformed peer line {line:?}")))?;
        let id = id
            .parse()
            .map_err(|_| Error::Config(format!("bad node id in {line:?}")))?;
        peers.push(Peer::new(id, addr.trim()));
    }
    Ok(peers)
}

/// Reads the peer list from an ipconfig file.
pub fn read_peers(path: &Path) -> Result<Vec<Peer>> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_peers(&text)
}

/// Renders a peer list with `head` moved to the front, so the receiving
/// worker sees itself at index 0 of its own view.
pub fn rearranged_peers(peers: &[Peer], head: usize) -> String {
    let mut out = format!("{} {}\n", peers[head].id, peers[head].addr);
    for (i, peer) in peers.iter().enumerate() {
        if i != head {
            out.push_str(&format!("{} {}\n", peer.id, peer.addr));
        }
    }
    out
}

/// True for an IPv4 literal, optionally with a `:port` suffix. Used by
/// chrun when re-indexing the user's configuration file.
pub fn is_valid_ipv4(line: &str) -> bool {
    let line = line.trim();
    let (host, port) = match line.split_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (line, None),
    };
    if let Some(port) = port {
        if port.parse::<u16>().is_err() {
            return false;
        }
    }
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| o.parse::<u8>().is_ok())
}

/// Resolves `$HOME/.CHost/<jobName>/`, creating it if missing.
pub fn working_directory(job_name: &str) -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("$HOME environment variable not set".into()))?;
    let dir = Path::new(&home).join(TEMP_DIR).join(job_name);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Job name for a submitted job artifact: the file stem, or a random
/// token when the path has none.
pub fn job_name_for(job_path: &Path) -> String {
    job_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| random_token(RANDOM_JOB_NAME_LENGTH))
}

/// Random alphanumeric token, used for spill-file and job names.
pub fn random_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
