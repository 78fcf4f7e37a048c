//! Thread ledger - the set of callback threads for one episode.

use serde::{Deserialize, Serialize};

use super::CallbackThread;

/// All callback threads, in the order they were opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadLedger {
    threads: Vec<CallbackThread>,
}

impl ThreadLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a thread, or touch it if an open thread with the same token exists.
    pub fn open(&mut self, token: &str, exchange: u64) -> &CallbackThread {
        let index = match self
            .threads
            .iter()
            .position(|t| t.is_open() && t.matches(token))
        {
            Some(index) => {
                self.threads[index].last_touched = exchange;
                index
            }
            None => {
                self.threads.push(CallbackThread::new(token, exchange));
                self.threads.len() - 1
            }
        };
        &self.threads[index]
    }

    /// Record a recall. Returns false if no open thread matches.
    pub fn recall(&mut self, token: &str, exchange: u64) -> bool {
        match self
            .threads
            .iter_mut()
            .find(|t| t.is_open() && t.matches(token))
        {
            Some(thread) => {
                thread.recall(exchange);
                true
            }
            None => false,
        }
    }

    /// Mark a thread as paid off. Returns false if no open thread matches.
    pub fn resolve(&mut self, token: &str) -> bool {
        match self
            .threads
            .iter_mut()
            .find(|t| t.is_open() && t.matches(token))
        {
            Some(thread) => {
                thread.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Get an open thread by token.
    pub fn get(&self, token: &str) -> Option<&CallbackThread> {
        self.threads.iter().find(|t| t.is_open() && t.matches(token))
    }

    /// Iterate over open threads.
    pub fn open_threads(&self) -> impl Iterator<Item = &CallbackThread> {
        self.threads.iter().filter(|t| t.is_open())
    }

    pub fn open_tokens(&self) -> Vec<String> {
        self.open_threads().map(|t| t.token.clone()).collect()
    }

    pub fn open_count(&self) -> usize {
        self.open_threads().count()
    }

    /// Get all threads, open and resolved.
    pub fn all(&self) -> &[CallbackThread] {
        &self.threads
    }
}
