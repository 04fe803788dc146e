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

//! One control-socket request: run as master or as worker, answer with a
//! single status byte.

use std::fs;
use std::net::TcpStream;
use std::path::Path;

use chost_core::config::{self, IPCONFIG_FILE, JOB_FILE, SERVER_PORT, THREAD_POOL_SIZE};
use chost_core::error::{Error, Result};
use chost_core::net::{
    read_bytes, read_text, read_verb, write_verb, CALL_MASTER, CALL_WORKER, RES_FAIL,
    RES_SUCCESS,
};
use chost_core::pool::ThreadPool;
use chost_core::{JobContext, MasterSource, WorkerSource};

use crate::jobs;

pub fn serve(mut control: TcpStream) {
    let verb = match read_verb(&mut control) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("dropped request: {e}");
            return;
        }
    };
    let outcome = match verb {
        CALL_MASTER => {
            log::info!("running as master");
            as_master(&mut control)
        }
        CALL_WORKER => {
            log::info!("running as worker");
            as_worker(&mut control)
        }
        other => {
            log::error!("unsupported call {other:#04x}");
            return;
        }
    };
    let status = match outcome {
        Ok(()) => RES_SUCCESS,
        Err(e) => {
            log::error!("job failed: {e}");
            RES_FAIL
        }
    };
    if let Err(e) = write_verb(&mut control, status) {
        log::warn!("cannot report status: {e}");
    }
}

/// Master side: read the three job paths from chrun, distribute input to
/// every worker and run the job locally. Success requires the local job
/// and every worker to succeed.
fn as_master(control: &mut TcpStream) -> Result<()> {
    let data_path = read_text(control)?;
    let output_path = read_text(control)?;
    let job_path = read_text(control)?;

    let job_name = config::job_name_for(Path::new(&job_path));
    let working_dir = config::working_directory(&job_name)?;
    let peers = config::read_peers(&working_dir.join(IPCONFIG_FILE))?;
    if peers.is_empty() {
        return Err(Error::Config("peer list is empty".into()));
    }

    let job_blob = fs::read(&job_path)
        .map_err(|e| Error::Config(format!("cannot read job file {job_path}: {e}")))?;
    let (_, job) = jobs::resolve(&job_blob)?;

    let mut source = MasterSource::new(Path::new(&data_path), Path::new(&job_path))?;
    // every worker's split service must run for the whole job, so the
    // pool may never be smaller than the worker count
    let pool = ThreadPool::new(THREAD_POOL_SIZE.max(peers.len() - 1));
    source.start_distribution(&pool, &peers, SERVER_PORT);

    let ctx = JobContext {
        peers: &peers,
        source: &source,
        output_path: Path::new(&output_path),
        working_dir: &working_dir,
        job_name: &job_name,
        is_master: true,
        multi_mapper: false,
    };
    let local = job(&ctx);
    let workers_ok = source.join_distribution();
    local?;
    if !workers_ok {
        return Err(Error::Job("one or more workers failed".into()));
    }
    if !source.fully_consumed() {
        return Err(Error::Job("input file was not consumed completely".into()));
    }
    Ok(())
}

/// Worker side: receive the peer list and job artifact from the master,
/// persist them in the job working directory and run the job against the
/// remote split source.
fn as_worker(control: &mut TcpStream) -> Result<()> {
    let config_text = read_text(control)?;
    let job_blob = read_bytes(control)?;
    let (job_name, job) = jobs::resolve(&job_blob)?;

    let working_dir = config::working_directory(&job_name)?;
    fs::write(working_dir.join(IPCONFIG_FILE), &config_text)?;
    fs::write(working_dir.join(JOB_FILE), &job_blob)?;

    let peers = config::parse_peers(&config_text)?;
    if peers.is_empty() {
        return Err(Error::Config("peer list is empty".into()));
    }

    let source = WorkerSource::new(control.try_clone()?);
    let ctx = JobContext {
        peers: &peers,
        source: &source,
        output_path: Path::new(""),
        working_dir: &working_dir,
        job_name: &job_name,
        is_master: false,
        multi_mapper: false,
    };
    job(&ctx)
}
