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

//! Per-peer object streams.
//!
//! Each record travels as `<tag><payload>`; the reserved [`TAG_SENTINEL`]
//! byte carries no payload and ends one direction of the stream without
//! closing the socket, so a symmetric peer can still deliver its own
//! sentinel. Transport errors surface as failed operations; there are no
//! retries at this layer.

use std::io::{self, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::net::{Shutdown, SocketAddr, TcpStream};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::record::{Record, TAG_SENTINEL};

/// Outbound half of a peer connection. Single-writer: the shuffle core
/// wraps each instance in its own lock.
pub struct SendStream<T: Record> {
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> SendStream<T> {
    /// Dials the peer once; connection retry belongs to the caller.
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let peer = stream.peer_addr()?;
        Ok(SendStream {
            writer: BufWriter::new(stream),
            peer,
            _marker: PhantomData,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn send(&mut self, v: &T) -> io::Result<()> {
        self.writer.write_u8(T::TAG)?;
        v.write_to(&mut self.writer)
    }

    /// Ends this direction: sentinel plus flush, socket stays open.
    pub fn stop(&mut self) -> io::Result<()> {
        self.writer.write_u8(TAG_SENTINEL)?;
        self.writer.flush()
    }

    /// Ends this direction and shuts the connection down.
    pub fn close(&mut self) -> io::Result<()> {
        self.stop()?;
        self.writer.get_ref().shutdown(Shutdown::Both)
    }
}

/// Inbound half of a peer connection. Yields owned records until the
/// sentinel arrives or the peer disconnects.
pub struct RecvStream<T: Record> {
    reader: BufReader<TcpStream>,
    peer: SocketAddr,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecvStream<T> {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(RecvStream {
            reader: BufReader::new(stream),
            peer,
            _marker: PhantomData,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Next record, or `None` once this direction ended. Socket closure
    /// counts as a clean end of stream.
    pub fn recv(&mut self) -> Option<T> {
        let tag = self.reader.read_u8().ok()?;
        if tag == TAG_SENTINEL {
            return None;
        }
        if tag != T::TAG {
            log::warn!("unexpected record tag {tag:#04x} from {}", self.peer);
            return None;
        }
        match T::read_from(&mut self.reader) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("truncated record from {}: {e}", self.peer);
                None
            }
        }
    }
}
