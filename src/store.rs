/*!
Persistence seam for channels, boards, and budget state.

[`Store`] is the contract the engine persists through; it deliberately says
nothing about durability internals. Two backends ship with the crate:
[`InMemoryStore`] for tests and development, and [`JsonFileStore`] writing
one JSON document per entity.
*/

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;

use crate::budget::PersistedBudgetState;
use crate::conversations::{Board, Channel};

/// Errors surfaced by store backends.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("storage I/O failure at {path}: {source}")]
    #[diagnostic(
        code(huddle::store::io),
        help("Check that the data directory exists and is writable.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt record at {path}: {source}")]
    #[diagnostic(
        code(huddle::store::corrupt),
        help("The JSON on disk no longer matches the persisted shape.")
    )]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable home for conversation and budget state.
///
/// Loading a name the store has never seen yields `Ok(None)`, never an
/// error; callers create fresh entities in that case. Saves replace the
/// whole entity.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_channel(&self, name: &str) -> Result<Option<Channel>, StoreError>;
    async fn save_channel(&self, channel: &Channel) -> Result<(), StoreError>;
    async fn load_board(&self, name: &str) -> Result<Option<Board>, StoreError>;
    async fn save_board(&self, board: &Board) -> Result<(), StoreError>;
    /// Names of every board the store knows about.
    async fn list_boards(&self) -> Result<Vec<String>, StoreError>;
    async fn load_budget_state(&self) -> Result<Option<PersistedBudgetState>, StoreError>;
    async fn save_budget_state(&self, state: &PersistedBudgetState) -> Result<(), StoreError>;
}

/// Volatile store for tests and development. Contents vanish on drop.
#[derive(Default)]
pub struct InMemoryStore {
    channels: Mutex<FxHashMap<String, Channel>>,
    boards: Mutex<FxHashMap<String, Board>>,
    budget: Mutex<Option<PersistedBudgetState>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn load_channel(&self, name: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self
            .channels
            .lock()
            .expect("store poisoned")
            .get(name)
            .cloned())
    }

    async fn save_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        self.channels
            .lock()
            .expect("store poisoned")
            .insert(channel.name.clone(), channel.clone());
        Ok(())
    }

    async fn load_board(&self, name: &str) -> Result<Option<Board>, StoreError> {
        Ok(self
            .boards
            .lock()
            .expect("store poisoned")
            .get(name)
            .cloned())
    }

    async fn save_board(&self, board: &Board) -> Result<(), StoreError> {
        self.boards
            .lock()
            .expect("store poisoned")
            .insert(board.name.clone(), board.clone());
        Ok(())
    }

    async fn list_boards(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .boards
            .lock()
            .expect("store poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn load_budget_state(&self) -> Result<Option<PersistedBudgetState>, StoreError> {
        Ok(self.budget.lock().expect("store poisoned").clone())
    }

    async fn save_budget_state(&self, state: &PersistedBudgetState) -> Result<(), StoreError> {
        *self.budget.lock().expect("store poisoned") = Some(state.clone());
        Ok(())
    }
}

/// File-backed store: one pretty-printed JSON document per entity.
///
/// Layout under the data directory:
/// - `channels/<name>.json`
/// - `boards/<name>.json`
/// - `token_budget.json`
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn channel_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("channels").join(format!("{name}.json"))
    }

    fn board_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("boards").join(format!("{name}.json"))
    }

    fn budget_path(&self) -> PathBuf {
        self.data_dir.join("token_budget.json")
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, bytes).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load_channel(&self, name: &str) -> Result<Option<Channel>, StoreError> {
        Self::read_json(&self.channel_path(name)).await
    }

    async fn save_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        Self::write_json(&self.channel_path(&channel.name), channel).await
    }

    async fn load_board(&self, name: &str) -> Result<Option<Board>, StoreError> {
        Self::read_json(&self.board_path(name)).await
    }

    async fn save_board(&self, board: &Board) -> Result<(), StoreError> {
        Self::write_json(&self.board_path(&board.name), board).await
    }

    async fn list_boards(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.data_dir.join("boards");
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir,
                    source,
                });
            }
        };

        let mut names = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn load_budget_state(&self) -> Result<Option<PersistedBudgetState>, StoreError> {
        Self::read_json(&self.budget_path()).await
    }

    async fn save_budget_state(&self, state: &PersistedBudgetState) -> Result<(), StoreError> {
        Self::write_json(&self.budget_path(), state).await
    }
}
