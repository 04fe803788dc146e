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

//! `chserver`: per-node daemon accepting master and worker invocations
//! on the control port.

mod jobs;
mod service;

use std::net::TcpListener;
use std::process::ExitCode;
use std::thread;

use chost_core::config::SERVER_PORT;

fn main() -> ExitCode {
    env_logger::init();

    let listener = match TcpListener::bind(("0.0.0.0", SERVER_PORT)) {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("port {SERVER_PORT} occupied, close the duplicate server: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Accepting requests on port {SERVER_PORT}.");

    for conn in listener.incoming() {
        match conn {
            Ok(control) => {
                thread::spawn(move || service::serve(control));
            }
            Err(e) => log::warn!("accept failed: {e}"),
        }
    }
    ExitCode::SUCCESS
}
