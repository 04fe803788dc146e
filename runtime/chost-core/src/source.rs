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

//! Input split sources and master-side job distribution.
//!
//! The master serves splits from its local file; each worker polls its
//! control socket for the next one. The master additionally runs one
//! distribution task per worker: invoke the worker, ship the rearranged
//! peer list and the job artifact, answer poll requests until the input
//! dries up, then collect the worker's final status byte.

use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{rearranged_peers, Peer};
use crate::error::{Error, Result};
use crate::net::{
    read_text, read_verb, write_bytes, write_text, write_verb, CALL_POLL, CALL_WORKER,
    RES_SUCCESS,
};
use crate::pool::{Task, ThreadPool};
use crate::splitter::Splitter;

/// Where the next input split comes from. `None` marks end of input;
/// concurrent polls are allowed.
pub trait SplitSource: Send + Sync {
    fn poll(&self) -> Option<String>;
}

struct MasterShared {
    splitter: Splitter,
    job_blob: Vec<u8>,
}

/// Master-side source: a thin wrapper around the local [`Splitter`] that
/// also feeds every worker over the control port.
pub struct MasterSource {
    shared: Arc<MasterShared>,
    deliveries: Vec<(usize, Task<bool>)>,
    started: bool,
}

impl MasterSource {
    /// Opens the input file and caches the job artifact for shipping.
    pub fn new(data_path: &Path, job_path: &Path) -> Result<Self> {
        let job_blob = std::fs::read(job_path)
            .map_err(|e| Error::Config(format!("cannot read job file {}: {e}", job_path.display())))?;
        let splitter = Splitter::open(data_path)
            .map_err(|e| Error::Config(format!("cannot open data file {}: {e}", data_path.display())))?;
        Ok(MasterSource {
            shared: Arc::new(MasterShared { splitter, job_blob }),
            deliveries: Vec::new(),
            started: false,
        })
    }

    /// Launches one distribution task per worker on the pool.
    pub fn start_distribution(&mut self, pool: &ThreadPool, peers: &[Peer], control_port: u16) {
        self.started = true;
        for (index, peer) in peers.iter().enumerate().skip(1) {
            let shared = Arc::clone(&self.shared);
            let addr = peer.control_addr(control_port);
            let config = rearranged_peers(peers, index);
            let id = peer.id;
            self.deliveries.push((
                id,
                pool.submit(move || match deliver(&shared, &addr, &config) {
                    Ok(ok) => ok,
                    Err(e) => {
                        log::error!("distribution to worker {id} at {addr} failed: {e}");
                        false
                    }
                }),
            ));
        }
    }

    /// Joins every distribution task; true only when each worker
    /// reported success. Must be called after the distribution started.
    pub fn join_distribution(&mut self) -> bool {
        if !self.started {
            log::error!("no distribution was started");
            return false;
        }
        let mut all_ok = true;
        for (id, task) in self.deliveries.drain(..) {
            let ok = task.wait().unwrap_or(false);
            if !ok {
                log::error!("worker {id} failed");
                all_ok = false;
            }
        }
        all_ok
    }

    /// True once the whole input was handed out as splits.
    pub fn fully_consumed(&self) -> bool {
        self.shared.splitter.fully_consumed()
    }
}

impl SplitSource for MasterSource {
    fn poll(&self) -> Option<String> {
        self.shared.splitter.next()
    }
}

/// One worker's session on the control socket.
fn deliver(shared: &MasterShared, addr: &str, config: &str) -> Result<bool> {
    let mut stream = TcpStream::connect(addr)?;
    write_verb(&mut stream, CALL_WORKER)?;
    write_text(&mut stream, config)?;
    write_bytes(&mut stream, &shared.job_blob)?;
    stream.flush()?;

    // serve splits until the input dries up
    loop {
        let verb = read_verb(&mut stream)?;
        if verb != CALL_POLL {
            return Err(Error::Protocol("expected a poll request"));
        }
        match shared.splitter.next() {
            Some(split) => write_text(&mut stream, &split)?,
            None => {
                write_bytes(&mut stream, b"")?;
                break;
            }
        }
    }

    let status = read_verb(&mut stream)?;
    Ok(status == RES_SUCCESS)
}

/// Worker-side source: polls the master for splits over the control
/// socket. A mutex serialises concurrent polls in multi-mapper mode.
pub struct WorkerSource {
    stream: Mutex<TcpStream>,
}

impl WorkerSource {
    pub fn new(stream: TcpStream) -> Self {
        WorkerSource { stream: Mutex::new(stream) }
    }
}

impl SplitSource for WorkerSource {
    fn poll(&self) -> Option<String> {
        let mut stream = self.stream.lock().unwrap();
        if let Err(e) = write_verb(&mut *stream, CALL_POLL) {
            log::error!("poll request failed: {e}");
            return None;
        }
        match read_text(&mut *stream) {
            Ok(split) if split.is_empty() => None,
            Ok(split) => Some(split),
            Err(e) => {
                log::error!("poll reply failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::config::THREAD_POOL_SIZE;
    use crate::net::{read_bytes, RES_FAIL};

    fn sources_fixture(input: &str) -> (tempfile::TempDir, MasterSource) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let job = dir.path().join("wordcount.job");
        std::fs::write(&data, input).unwrap();
        std::fs::write(&job, "wordcount\n").unwrap();
        let source = MasterSource::new(&data, &job).unwrap();
        (dir, source)
    }

    #[test]
    fn master_polls_its_own_splitter() {
        let (_dir, source) = sources_fixture("a b c\nd e\n");
        assert_eq!(source.poll().unwrap(), "a b c\nd e\n");
        assert_eq!(source.poll(), None);
        assert!(source.fully_consumed());
    }

    #[test]
    fn distribution_feeds_a_worker_end_to_end() {
        let (_dir, mut source) = sources_fixture("one two\nthree\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // worker half: receive the files, drain the splits, report success
        let worker = thread::spawn(move || {
            let (mut control, _) = listener.accept().unwrap();
            assert_eq!(read_verb(&mut control).unwrap(), CALL_WORKER);
            let config = read_text(&mut control).unwrap();
            let job = read_bytes(&mut control).unwrap();

            let polled = {
                let source = WorkerSource::new(control.try_clone().unwrap());
                let mut polled = Vec::new();
                while let Some(split) = source.poll() {
                    polled.push(split);
                }
                polled
            };

            write_verb(&mut control, RES_SUCCESS).unwrap();
            control.flush().unwrap();
            (config, job, polled)
        });

        let peers = vec![Peer::new(0, "127.0.0.1"), Peer::new(1, "127.0.0.1")];
        let pool = ThreadPool::new(THREAD_POOL_SIZE);
        source.start_distribution(&pool, &peers, port);
        assert!(source.join_distribution());

        let (config, job, polled) = worker.join().unwrap();
        // the worker sees itself at the head of its own view
        assert!(config.starts_with("1 127.0.0.1"));
        assert_eq!(job, b"wordcount\n");
        assert_eq!(polled, vec!["one two\nthree\n".to_owned()]);
        assert!(source.fully_consumed());
    }

    #[test]
    fn failed_worker_fails_the_aggregate() {
        let (_dir, mut source) = sources_fixture("x\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let worker = thread::spawn(move || {
            let (mut control, _) = listener.accept().unwrap();
            assert_eq!(read_verb(&mut control).unwrap(), CALL_WORKER);
            read_text(&mut control).unwrap();
            read_bytes(&mut control).unwrap();
            // drain the input, then report failure
            loop {
                write_verb(&mut control, CALL_POLL).unwrap();
                if read_bytes(&mut control).unwrap().is_empty() {
                    break;
                }
            }
            write_verb(&mut control, RES_FAIL).unwrap();
        });

        let peers = vec![Peer::new(0, "127.0.0.1"), Peer::new(1, "127.0.0.1")];
        let pool = ThreadPool::new(2);
        source.start_distribution(&pool, &peers, port);
        assert!(!source.join_distribution());
        worker.join().unwrap();
    }

    #[test]
    fn join_without_start_reports_failure() {
        let (_dir, mut source) = sources_fixture("x\n");
        assert!(!source.join_distribution());
    }
}
