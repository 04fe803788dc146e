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

//! End-to-end word-count jobs over the library surface.

use std::collections::HashMap;
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use chost_core::{
    run_simple_job, HashPartitioner, Integer, JobContext, MasterSource, Pair, Peer, Record,
    Result, SortedStream, SplitSource, StreamManager, Text, ZeroPartitioner,
};

type WordCount = Pair<Text, Integer>;

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

/// Worker-side stand-in when all input lives on the master.
struct NoInput;

impl SplitSource for NoInput {
    fn poll(&self) -> Option<String> {
        None
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn counts_from(output: &Path) -> HashMap<String, i64> {
    let text = std::fs::read_to_string(output).unwrap();
    text.lines()
        .map(|line| {
            let (word, count) = line
                .strip_prefix("(\"")
                .and_then(|rest| rest.split_once("\", "))
                .unwrap_or_else(|| panic!("unparsable output line {line:?}"));
            let count = count.strip_suffix(')').unwrap().parse().unwrap();
            (word.to_owned(), count)
        })
        .collect()
}

#[test]
fn single_node_word_count() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let job = dir.path().join("wordcount.job");
    let output = dir.path().join("output");
    std::fs::write(&data, "the quick the brown the fox").unwrap();
    std::fs::write(&job, "wordcount\n").unwrap();

    let peers = vec![Peer::new(0, format!("127.0.0.1:{}", free_port()))];
    let source = MasterSource::new(&data, &job).unwrap();
    let ctx = JobContext {
        peers: &peers,
        source: &source,
        output_path: &output,
        working_dir: dir.path(),
        job_name: "wordcount",
        is_master: true,
        multi_mapper: false,
    };
    run_simple_job(&ctx, map_words, reduce_counts).unwrap();

    let counts = counts_from(&output);
    let expected: HashMap<String, i64> =
        [("the", 3), ("quick", 1), ("brown", 1), ("fox", 1)]
            .into_iter()
            .map(|(w, c)| (w.to_owned(), c))
            .collect();
    assert_eq!(counts, expected);
}

#[test]
fn two_node_word_count() {
    let master_dir = tempfile::tempdir().unwrap();
    let worker_dir = tempfile::tempdir().unwrap();
    let data = master_dir.path().join("data");
    let job = master_dir.path().join("wordcount.job");
    let output = master_dir.path().join("output");
    std::fs::write(
        &data,
        "the quick brown fox jumps over the lazy dog\nthe fox sleeps\n",
    )
    .unwrap();
    std::fs::write(&job, "wordcount\n").unwrap();

    let (p0, p1) = (free_port(), free_port());
    let node0 = Peer::new(0, format!("127.0.0.1:{p0}"));
    let node1 = Peer::new(1, format!("127.0.0.1:{p1}"));
    let master_view = vec![node0.clone(), node1.clone()];
    let worker_view = vec![node1, node0];

    let worker = thread::spawn(move || {
        let ctx = JobContext {
            peers: &worker_view,
            source: &NoInput,
            output_path: Path::new("unused"),
            working_dir: worker_dir.path(),
            job_name: "wordcount",
            is_master: false,
            multi_mapper: false,
        };
        run_simple_job(&ctx, map_words, reduce_counts)
    });

    let source = MasterSource::new(&data, &job).unwrap();
    let ctx = JobContext {
        peers: &master_view,
        source: &source,
        output_path: &output,
        working_dir: master_dir.path(),
        job_name: "wordcount",
        is_master: true,
        multi_mapper: false,
    };
    run_simple_job(&ctx, map_words, reduce_counts).unwrap();
    worker.join().unwrap().unwrap();

    // every unique token exactly once, with full-cluster counts
    let counts = counts_from(&output);
    let expected: HashMap<String, i64> = [
        ("the", 3),
        ("quick", 1),
        ("brown", 1),
        ("fox", 2),
        ("jumps", 1),
        ("over", 1),
        ("lazy", 1),
        ("dog", 1),
        ("sleeps", 1),
    ]
    .into_iter()
    .map(|(w, c)| (w.to_owned(), c))
    .collect();
    assert_eq!(counts, expected);
}

#[test]
fn multi_mapper_single_node_word_count() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let job = dir.path().join("wordcount.job");
    let output = dir.path().join("output");

    let mut input = String::new();
    for i in 0..2000 {
        input.push_str(&format!("alpha beta gamma token{} \n", i % 7));
    }
    std::fs::write(&data, &input).unwrap();
    std::fs::write(&job, "wordcount\n").unwrap();

    let peers = vec![Peer::new(0, format!("127.0.0.1:{}", free_port()))];
    let source = MasterSource::new(&data, &job).unwrap();
    let ctx = JobContext {
        peers: &peers,
        source: &source,
        output_path: &output,
        working_dir: dir.path(),
        job_name: "wordcount",
        is_master: true,
        multi_mapper: true,
    };
    run_simple_job(&ctx, map_words, reduce_counts).unwrap();

    let counts = counts_from(&output);
    assert_eq!(counts["alpha"], 2000);
    assert_eq!(counts["beta"], 2000);
    assert_eq!(counts["gamma"], 2000);
    for i in 0..7 {
        assert_eq!(counts[&format!("token{i}")], if i < 5 { 286 } else { 285 });
    }
}
