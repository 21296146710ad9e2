//! Server list parsing and per-attempt failover cursors.
//!
//! Every logical attempt (one push open, one full pull) takes a fresh
//! [`SelectionCursor`], which hands out each configured server at most once in
//! random order. Cursors are never shared between attempts.

use rand::seq::SliceRandom;
use std::sync::Arc;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Ordered, de-duplicated set of server base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerList {
    servers: Arc<[String]>,
}

impl ServerList {
    /// Parse a comma-separated server string.
    pub fn parse(nodes: &str) -> ClientResult<Self> {
        let mut servers: Vec<String> = Vec::new();
        for entry in nodes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let url = Url::parse(entry).map_err(|e| {
                ClientError::Configuration(format!("invalid server url '{}': {}", entry, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ClientError::Configuration(format!(
                    "server url '{}' must use http or https",
                    entry
                )));
            }
            if !servers.iter().any(|s| s == entry) {
                servers.push(entry.to_string());
            }
        }

        let list = Self { servers: servers.into() };
        if list.is_empty() {
            return Err(ClientError::Configuration("server list is empty".to_string()));
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Fresh random permutation for one attempt.
    pub fn cursor(&self) -> SelectionCursor {
        let mut remaining = self.servers.to_vec();
        remaining.shuffle(&mut rand::thread_rng());
        SelectionCursor { remaining, total: self.servers.len() }
    }
}

/// One-shot, without-replacement iterator over a [`ServerList`].
#[derive(Debug)]
pub struct SelectionCursor {
    remaining: Vec<String>,
    total: usize,
}

impl SelectionCursor {
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Number of servers already handed out.
    pub fn tried(&self) -> usize {
        self.total - self.remaining.len()
    }
}

impl Iterator for SelectionCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.remaining.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.len(), Some(self.remaining.len()))
    }
}
