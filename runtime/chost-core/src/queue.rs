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

//! Mutex-guarded FIFO used by the thread pool. Popping never blocks;
//! sleeping on an empty queue is the pool's job.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct BlockedQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> BlockedQueue<T> {
    pub fn new() -> Self {
        BlockedQueue { inner: Mutex::new(VecDeque::new()) }
    }

    pub fn push(&self, v: T) {
        self.inner.lock().unwrap().push_back(v);
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

impl<T> Default for BlockedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = BlockedQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn clear_drops_pending_items() {
        let q = BlockedQueue::new();
        q.push("a");
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }
}
