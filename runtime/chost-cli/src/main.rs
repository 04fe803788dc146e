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

//! `chrun`: submits one job to the local chserver and waits for the
//! verdict.

use std::fs;
use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use chost_core::config::{
    self, is_valid_ipv4, IPCONFIG_FILE, SERVER_PORT,
};
use chost_core::error::{Error, Result};
use chost_core::net::{read_verb, write_text, write_verb, CALL_MASTER, RES_SUCCESS};

#[derive(Parser)]
#[command(name = "chrun", about = "Run a MapReduce job on the configured cluster")]
struct Args {
    /// Cluster configuration file, one IPv4 address per line
    #[arg(short = 'c', value_name = "FILE")]
    conf: PathBuf,

    /// Input data file on the master
    #[arg(short = 'i', value_name = "FILE")]
    input: PathBuf,

    /// Output file, must not exist yet
    #[arg(short = 'o', value_name = "FILE")]
    output: PathBuf,

    /// Job artifact to distribute
    #[arg(short = 'j', value_name = "FILE")]
    job: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match submit(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chrun: {e}");
            ExitCode::FAILURE
        }
    }
}

fn submit(args: Args) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let input = absolute(&cwd, &args.input);
    let output = absolute(&cwd, &args.output);
    let job = absolute(&cwd, &args.job);

    if output.exists() {
        return Err(Error::Config(format!(
            "the output file {} exists",
            output.display()
        )));
    }

    let job_name = config::job_name_for(&job);
    let working_dir = config::working_directory(&job_name)?;
    reindex_configuration(&args.conf, &working_dir.join(IPCONFIG_FILE))?;

    let mut control = TcpStream::connect(("127.0.0.1", SERVER_PORT))
        .map_err(|e| Error::Config(format!("cannot connect to chserver: {e}")))?;
    write_verb(&mut control, CALL_MASTER)?;
    write_text(&mut control, &input.to_string_lossy())?;
    write_text(&mut control, &output.to_string_lossy())?;
    write_text(&mut control, &job.to_string_lossy())?;
    control.flush()?;

    let started = Instant::now();
    println!("Started.");
    match read_verb(&mut control) {
        Ok(status) if status == RES_SUCCESS => println!("chrun: Succeed."),
        Ok(_) => println!("chrun: Fail."),
        Err(_) => println!("chrun: No response from the server."),
    }
    println!("In {:.0} seconds.", started.elapsed().as_secs_f64());
    Ok(())
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        cwd.join(path)
    }
}

/// Rewrites the user's configuration as `"<id> <addr>"` lines with dense
/// 0-based ids, dropping anything that is not an IPv4 address. The first
/// kept line becomes node 0, the master.
fn reindex_configuration(conf: &Path, target: &Path) -> Result<()> {
    let text = fs::read_to_string(conf)
        .map_err(|e| Error::Config(format!("cannot open configuration file: {e}")))?;
    let mut out = String::new();
    let mut next_id = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_valid_ipv4(line) {
            out.push_str(&format!("{next_id} {line}\n"));
            next_id += 1;
        } else {
            log::warn!("skipping invalid peer line {line:?}");
        }
    }
    if next_id == 0 {
        return Err(Error::Config("configuration contains no peers".into()));
    }
    fs::write(target, out)?;
    Ok(())
}
