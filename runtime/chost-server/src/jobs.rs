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

//! Built-in job registry.
//!
//! A job artifact names the job to run on its first line; the rest of
//! the file is reserved for future loadable payloads. The artifact
//! bytes still travel master → worker unchanged, so every node resolves
//! the same job.

use chost_core::error::{Error, Result};
use chost_core::{
    run_simple_job, HashPartitioner, Integer, JobContext, JobFn, Pair, Record, SortedStream,
    StreamManager, Text, ZeroPartitioner,
};

const BUILTIN_JOBS: &[(&str, JobFn)] = &[("wordcount", word_count)];

/// Resolves a job artifact to its registered entry point.
pub fn resolve(blob: &[u8]) -> Result<(String, JobFn)> {
    let name = blob
        .split(|&b| b == b'\n')
        .next()
        .and_then(|line| std::str::from_utf8(line).ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(Error::Protocol("job artifact does not name a job"))?;
    match BUILTIN_JOBS.iter().find(|(known, _)| *known == name) {
        Some((_, job)) => Ok((name.to_owned(), *job)),
        None => Err(Error::Job(format!("no job named {name:?} is registered"))),
    }
}

type WordCount = Pair<Text, Integer>;

/// The demo job: counts whitespace-separated tokens.
fn word_count(ctx: &JobContext<'_>) -> Result<()> {
    run_simple_job(ctx, map_words, reduce_counts)
}

fn map_words(split: &str, stm: &StreamManager<WordCount>) -> Result<()> {
    for word in split.split_whitespace() {
        stm.push(Pair::new(Text::new(word), Integer(1)), &HashPartitioner)?;
    }
    Ok(())
}

fn reduce_counts(sorted: SortedStream<WordCount>, stm: &StreamManager<WordCount>) -> Result<()> {
    let mut acc: Option<WordCount> = None;
    for record in sorted {
        acc = Some(match acc.take() {
            None => record,
            Some(mut current) => {
                if current.key == record.key {
                    current.merge(record);
                    current
                } else {
                    stm.push(current, &ZeroPartitioner)?;
                    record
                }
            }
        });
    }
    if let Some(current) = acc {
        stm.push(current, &ZeroPartitioner)?;
    }
    Ok(())
}
