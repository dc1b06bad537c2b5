use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::book::BudgetBook;

/// File-backed storage: one `users.json` credential map plus one budget
/// document per user under `books/`. Every write is a full-document
/// replace, pretty-printed UTF-8.
///
/// Directory creation happens once here in `open`, never as a side effect
/// of a load.
pub struct Storage {
    users_path: PathBuf,
    books_dir: PathBuf,
    // Per-user write locks so two requests for the same user cannot
    // interleave their load-mutate-save cycles.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Debug)]
pub enum StorageError {
    UserExists(String),
    Io(io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UserExists(name) => write!(f, "user '{}' already exists", name),
            StorageError::Io(err) => write!(f, "storage I/O error: {}", err),
            StorageError::Serde(err) => write!(f, "storage encoding error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serde(err)
    }
}

impl Storage {
    /// Open the storage rooted at `root`, creating the directory layout.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let books_dir = root.join("books");
        fs::create_dir_all(&books_dir)?;
        Ok(Self {
            users_path: root.join("users.json"),
            books_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Credential map (username -> bcrypt hash). An absent, empty or
    /// malformed file means "no users", never an error.
    pub fn load_users(&self) -> HashMap<String, String> {
        let Ok(contents) = fs::read_to_string(&self.users_path) else {
            return HashMap::new();
        };
        serde_json::from_str(contents.trim()).unwrap_or_default()
    }

    pub fn save_users(&self, users: &HashMap<String, String>) -> Result<(), StorageError> {
        write_pretty(&self.users_path, users)
    }

    /// Insert a new credential and persist. The caller hashes the password.
    pub fn register_user(&self, username: &str, password_hash: &str) -> Result<(), StorageError> {
        let mut users = self.load_users();
        if users.contains_key(username) {
            return Err(StorageError::UserExists(username.to_string()));
        }
        users.insert(username.to_string(), password_hash.to_string());
        self.save_users(&users)
    }

    /// The user's budget document, or the empty default when no file exists.
    pub fn load_book(&self, username: &str) -> Result<BudgetBook, StorageError> {
        let path = self.book_path(username);
        if !path.exists() {
            return Ok(BudgetBook::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save_book(&self, username: &str, book: &BudgetBook) -> Result<(), StorageError> {
        write_pretty(&self.book_path(username), book)
    }

    /// The write lock for one user. Mutating handlers hold it across their
    /// whole load-mutate-save cycle.
    pub fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn book_path(&self, username: &str) -> PathBuf {
        self.books_dir.join(format!("{}.json", username))
    }
}

/// Full-document replace: write to a sibling temp file, then rename over
/// the target.
fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}
