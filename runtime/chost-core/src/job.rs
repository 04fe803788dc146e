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

//! Job context and the two-phase map/reduce driver.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::{Peer, DEFAULT_MAX_DATA_SIZE, NUM_MAPPER};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::shuffle::StreamManager;
use crate::source::SplitSource;
use crate::spill::SortedStream;

/// Everything a job sees: the peer list (self first), the split source,
/// where the master writes output, the per-job working directory and the
/// role flags.
pub struct JobContext<'a> {
    pub peers: &'a [Peer],
    pub source: &'a dyn SplitSource,
    pub output_path: &'a Path,
    pub working_dir: &'a Path,
    pub job_name: &'a str,
    pub is_master: bool,
    pub multi_mapper: bool,
}

/// Entry point a registered job exposes to the controller.
pub type JobFn = fn(&JobContext<'_>) -> Result<()>;

/// Runs one job whose mapper and reducer share a record type, reusing a
/// single shuffle across both phases.
///
/// Per node: connect the mesh, receive, map every polled split, stop-send
/// and drain, take the sorted stream, receive again with presort off,
/// reduce into the zero partition, finalize and drain. The master then
/// dumps the result as text.
pub fn run_simple_job<T, M, R>(ctx: &JobContext<'_>, mapper: M, reducer: R) -> Result<()>
where
    T: Record,
    M: Fn(&str, &StreamManager<T>) -> Result<()> + Sync,
    R: FnOnce(SortedStream<T>, &StreamManager<T>) -> Result<()>,
{
    let mut stm = StreamManager::<T>::new(ctx.peers, ctx.working_dir, DEFAULT_MAX_DATA_SIZE);
    if !stm.is_connected() {
        return Err(Error::NotConnected);
    }

    stm.start_receive();
    log::info!("job {:?}: map phase starting", ctx.job_name);
    run_map_phase(ctx, &mapper, &stm)?;
    stm.stop_send();
    stm.block_till_recv_end();

    let sorted = stm.into_sorted_stream()?;

    stm.set_presort(false);
    stm.start_receive();
    log::info!("job {:?}: reduce phase starting", ctx.job_name);
    if let Some(sorted) = sorted {
        reducer(sorted, &stm)?;
    }
    stm.finalize_send();
    stm.block_till_recv_end();

    if ctx.is_master {
        stm.pour_to_text_file(ctx.output_path)?;
        log::info!("job {:?}: output written to {}", ctx.job_name, ctx.output_path.display());
    }
    Ok(())
}

fn run_map_phase<T, M>(ctx: &JobContext<'_>, mapper: &M, stm: &StreamManager<T>) -> Result<()>
where
    T: Record,
    M: Fn(&str, &StreamManager<T>) -> Result<()> + Sync,
{
    if !ctx.multi_mapper {
        while let Some(split) = ctx.source.poll() {
            mapper(&split, stm)?;
        }
        return Ok(());
    }

    let failed = AtomicBool::new(false);
    thread::scope(|scope| {
        for _ in 0..NUM_MAPPER {
            scope.spawn(|| {
                while let Some(split) = ctx.source.poll() {
                    if let Err(e) = mapper(&split, stm) {
                        log::error!("mapper failed: {e}");
                        failed.store(true, Ordering::Relaxed);
                        return;
                    }
                }
            });
        }
    });
    if failed.load(Ordering::Relaxed) {
        return Err(Error::Job("map phase failed".into()));
    }
    Ok(())
}
