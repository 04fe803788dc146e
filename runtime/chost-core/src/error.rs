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

use std::io;

/// Errors surfaced by the runtime. Components never panic on a failed
/// operation; they return one of these and the caller skips the next phase.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("shuffle connection setup failed")]
    NotConnected,

    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error("job failed: {0}")]
    Job(String),
}

pub type Result<T> = std::result::Result<T, Error>;
