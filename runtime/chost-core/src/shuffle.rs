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

//! The shuffle core: full-mesh peer streams, partitioned push routing,
//! local storage and the phase barriers.
//!
//! Construction performs connection setup. One listener accepts the N−1
//! inbound streams under a bounded timeout while N−1 dial threads retry
//! towards the other peers; either side failing leaves the manager
//! permanently not connected. Inbound streams are not identity-checked —
//! records are self-describing and partitioning is symmetric, so their
//! order does not matter.
//!
//! A phase ends with `stop_send` (or `finalize_send`) followed by
//! `block_till_recv_end`: once both return, every record any peer pushed
//! in the phase rests in some node's data manager.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{Peer, ACCEPT_TIMEOUT, CONNECTION_RETRY_INTERVAL, MAX_CONNECTION_ATTEMPT};
use crate::data::DataManager;
use crate::error::{Error, Result};
use crate::partition::Partitioner;
use crate::record::Record;
use crate::spill::SortedStream;
use crate::stream::{RecvStream, SendStream};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct StreamManager<T: Record> {
    self_id: usize,
    cluster_size: usize,
    connected: bool,
    data: Arc<DataManager<T>>,
    /// Outbound streams indexed by node id; the self slot stays empty.
    outs: Vec<Option<Mutex<SendStream<T>>>>,
    /// Inbound streams between phases, while no receive thread owns them.
    idle_ins: Vec<RecvStream<T>>,
    /// Running receive threads; each returns its stream when the peer's
    /// sentinel arrives.
    receivers: Vec<JoinHandle<RecvStream<T>>>,
}

impl<T: Record> StreamManager<T> {
    /// Sets up the full mesh. Check [`StreamManager::is_connected`]
    /// before starting a phase.
    pub fn new(peers: &[Peer], dir: impl Into<PathBuf>, max_data_size: usize) -> Self {
        let cluster_size = peers.len();
        let self_id = peers.first().map(|p| p.id).unwrap_or(0);
        let mut manager = StreamManager {
            self_id,
            cluster_size,
            connected: false,
            data: Arc::new(DataManager::new(dir, max_data_size)),
            outs: Vec::new(),
            idle_ins: Vec::new(),
            receivers: Vec::new(),
        };
        if cluster_size == 0 {
            log::error!("empty peer list, shuffle not connected");
            return manager;
        }
        match manager.connect_mesh(peers) {
            Ok(()) => {
                log::info!("shuffle mesh of {cluster_size} node(s) up, self id {self_id}");
                manager.connected = true;
            }
            Err(e) => {
                log::error!("shuffle connection setup failed: {e}");
                manager.outs.clear();
                manager.idle_ins.clear();
            }
        }
        manager
    }

    fn connect_mesh(&mut self, peers: &[Peer]) -> Result<()> {
        if peers.iter().any(|p| p.id >= self.cluster_size) {
            return Err(Error::Config("node ids must be dense and 0-based".into()));
        }

        let listener = TcpListener::bind(("0.0.0.0", peers[0].shuffle_port()))?;
        listener.set_nonblocking(true)?;

        let expected = self.cluster_size - 1;
        let accept_handle = thread::spawn(move || accept_peers::<T>(listener, expected));

        let mut dial_handles = Vec::with_capacity(expected);
        for peer in &peers[1..] {
            let id = peer.id;
            let addr = peer.shuffle_addr();
            dial_handles.push(thread::spawn(move || (id, dial_peer::<T>(&addr))));
        }

        let mut outs: Vec<Option<Mutex<SendStream<T>>>> =
            (0..self.cluster_size).map(|_| None).collect();
        let mut dials_ok = true;
        for handle in dial_handles {
            match handle.join() {
                Ok((id, Some(stream))) => outs[id] = Some(Mutex::new(stream)),
                Ok((_, None)) | Err(_) => dials_ok = false,
            }
        }
        let ins = accept_handle.join().unwrap_or_default();

        if !dials_ok || ins.len() != expected {
            return Err(Error::NotConnected);
        }
        self.outs = outs;
        self.idle_ins = ins;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_receiving(&self) -> bool {
        !self.receivers.is_empty()
    }

    /// Spawns one receive thread per inbound stream. Each pumps records
    /// into the data manager until its peer's sentinel arrives.
    pub fn start_receive(&mut self) {
        if self.is_receiving() {
            log::debug!("receive threads already running");
            return;
        }
        for stream in self.idle_ins.drain(..) {
            let data = Arc::clone(&self.data);
            self.receivers.push(thread::spawn(move || receive_loop(stream, data)));
        }
    }

    /// Joins every receive thread and takes the streams back for the
    /// next phase. Idempotent.
    pub fn block_till_recv_end(&mut self) {
        if self.receivers.is_empty() {
            return;
        }
        for handle in self.receivers.drain(..) {
            match handle.join() {
                Ok(stream) => self.idle_ins.push(stream),
                Err(_) => log::error!("a receive thread panicked"),
            }
        }
        log::info!("receive threads ended");
    }

    /// Routes one record: kept locally when the partitioner picks this
    /// node, sent on the destination's outbound stream otherwise.
    pub fn push(&self, v: T, partitioner: &dyn Partitioner) -> Result<()> {
        let id = partitioner.partition(v.hash_code(), self.cluster_size);
        if id == self.self_id {
            return self.data.store(v);
        }
        match self.outs.get(id).and_then(Option::as_ref) {
            Some(out) => {
                out.lock().unwrap().send(&v)?;
                Ok(())
            }
            None => Err(Error::NotConnected),
        }
    }

    /// Map→reduce barrier half: sentinel on every outbound stream, the
    /// sockets stay open for the reduce phase.
    pub fn stop_send(&self) {
        for out in self.outs.iter().flatten() {
            if let Err(e) = out.lock().unwrap().stop() {
                log::warn!("stop-send failed: {e}");
            }
        }
    }

    /// Job-end barrier half: sentinel plus close on every outbound
    /// stream.
    pub fn finalize_send(&mut self) {
        for slot in &mut self.outs {
            if let Some(out) = slot.take() {
                let mut out = out.into_inner().unwrap();
                if let Err(e) = out.close() {
                    if e.kind() != io::ErrorKind::NotConnected {
                        log::warn!("finalize-send to {} failed: {e}", out.peer());
                    }
                }
            }
        }
    }

    pub fn set_presort(&self, presort: bool) {
        self.data.set_presort(presort);
    }

    /// Sorted drain of everything stored locally; call only after a
    /// barrier.
    pub fn into_sorted_stream(&self) -> Result<Option<SortedStream<T>>> {
        self.data.into_sorted_stream()
    }

    /// Writes every locally stored record as text, one per line. Runs on
    /// the master after the reduce barrier, when the zero partition holds
    /// the whole result.
    pub fn pour_to_text_file(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for record in self.data.into_unsorted_stream()? {
            writeln!(out, "{record}")?;
        }
        out.flush()?;
        Ok(())
    }
}

impl<T: Record> Drop for StreamManager<T> {
    fn drop(&mut self) {
        self.finalize_send();
        self.block_till_recv_end();
    }
}

fn receive_loop<T: Record>(mut stream: RecvStream<T>, data: Arc<DataManager<T>>) -> RecvStream<T> {
    while let Some(v) = stream.recv() {
        if let Err(e) = data.store(v) {
            log::error!("cannot store record from {}: {e}", stream.peer());
            break;
        }
    }
    stream
}

fn dial_peer<T: Record>(addr: &str) -> Option<SendStream<T>> {
    for attempt in 1..=MAX_CONNECTION_ATTEMPT {
        match SendStream::connect(addr) {
            Ok(stream) => {
                log::debug!("connected to shuffle peer {addr}");
                return Some(stream);
            }
            Err(e) => {
                log::debug!("dial {addr} attempt {attempt} failed: {e}");
                if attempt < MAX_CONNECTION_ATTEMPT {
                    thread::sleep(CONNECTION_RETRY_INTERVAL);
                }
            }
        }
    }
    log::error!("cannot connect to shuffle peer {addr}");
    None
}

fn accept_peers<T: Record>(listener: TcpListener, expected: usize) -> Vec<RecvStream<T>> {
    let mut ins = Vec::with_capacity(expected);
    while ins.len() < expected {
        let deadline = Instant::now() + ACCEPT_TIMEOUT;
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if stream.set_nonblocking(false).is_err() {
                        continue;
                    }
                    if let Ok(stream) = RecvStream::new(stream) {
                        log::debug!("accepted shuffle peer {addr}");
                        ins.push(stream);
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        log::error!("timed out accepting shuffle peers ({}/{expected})", ins.len());
                        return ins;
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::error!("accept failed: {e}");
                    return ins;
                }
            }
        }
    }
    ins
}
