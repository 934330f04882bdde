//! Per-user dialogue state: the last-N hypercube vertices a conversation
//! visited, plus a short token context. Optionally persisted as JSON with
//! load-or-default startup.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DialogueFile {
    states: HashMap<String, Vec<u32>>,
    tokens: HashMap<String, Vec<String>>,
}

/// Bounded per-user vertex paths and token context.
#[derive(Debug)]
pub struct DialogueState {
    capacity: usize,
    states: HashMap<String, VecDeque<u32>>,
    token_context: HashMap<String, VecDeque<String>>,
    persist_path: Option<PathBuf>,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, None)
    }
}

impl DialogueState {
    /// In-memory state; pass a path to enable persistence. An existing file
    /// is loaded when valid, otherwise the state starts empty (the file is
    /// advisory context, not a source of truth).
    pub fn new(capacity: usize, persist_path: Option<PathBuf>) -> Self {
        let mut state = DialogueState {
            capacity,
            states: HashMap::new(),
            token_context: HashMap::new(),
            persist_path,
        };
        if let Some(path) = state.persist_path.clone() {
            if let Ok(raw) = fs::read_to_string(&path) {
                if let Ok(file) = serde_json::from_str::<DialogueFile>(&raw) {
                    state.load_file(file);
                }
            }
        }
        state
    }

    fn load_file(&mut self, file: DialogueFile) {
        for (uid, seq) in file.states {
            let mut dq: VecDeque<u32> = seq.into();
            while dq.len() > self.capacity {
                dq.pop_front();
            }
            self.states.insert(uid, dq);
        }
        for (uid, seq) in file.tokens {
            let mut dq: VecDeque<String> = seq.into();
            while dq.len() > self.capacity {
                dq.pop_front();
            }
            self.token_context.insert(uid, dq);
        }
    }

    /// Append a visited vertex to the user's path, evicting the oldest
    /// entry at capacity.
    pub fn push_vertex(&mut self, user_id: &str, vertex_id: u32) {
        let dq = self.states.entry(user_id.to_string()).or_default();
        if dq.len() == self.capacity {
            dq.pop_front();
        }
        dq.push_back(vertex_id);
    }

    /// The user's vertex path, oldest first; `last_k` trims to the tail.
    pub fn get_path(&self, user_id: &str, last_k: Option<usize>) -> Vec<u32> {
        let seq: Vec<u32> = self
            .states
            .get(user_id)
            .map(|dq| dq.iter().copied().collect())
            .unwrap_or_default();
        match last_k {
            Some(k) if k < seq.len() => seq[seq.len() - k..].to_vec(),
            _ => seq,
        }
    }

    /// Append recent tokens to the user's context window.
    pub fn push_tokens(&mut self, user_id: &str, tokens: &[String]) {
        let dq = self.token_context.entry(user_id.to_string()).or_default();
        for t in tokens {
            if dq.len() == self.capacity {
                dq.pop_front();
            }
            dq.push_back(t.clone());
        }
    }

    /// The user's recent tokens, oldest first; `last_k` trims to the tail.
    pub fn get_tokens(&self, user_id: &str, last_k: Option<usize>) -> Vec<String> {
        let seq: Vec<String> = self
            .token_context
            .get(user_id)
            .map(|dq| dq.iter().cloned().collect())
            .unwrap_or_default();
        match last_k {
            Some(k) if k < seq.len() => seq[seq.len() - k..].to_vec(),
            _ => seq,
        }
    }

    /// Forget one user entirely.
    pub fn clear_user(&mut self, user_id: &str) {
        self.states.remove(user_id);
        self.token_context.remove(user_id);
    }

    /// Persist to the configured (or given) path.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(PathBuf::from)
            .or_else(|| self.persist_path.clone())
            .context("no persist path configured")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        let file = DialogueFile {
            states: self
                .states
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
                .collect(),
            tokens: self
                .token_context
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
        };
        fs::write(&path, serde_json::to_string(&file)?)
            .with_context(|| format!("failed to write {:?}", path))?;
        Ok(())
    }
}
