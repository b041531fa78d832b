//! Account store abstraction and the local implementation.

use crate::account::{mask_card_number, Account, AccountId, OneTimeCode};
use crate::error::StorageError;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Operations the server performs against persisted accounts.
///
/// Every method is a single atomic step: no caller ever observes a partially
/// applied update. Implementations must be safe to share across connection
/// tasks.
pub trait AccountStore: Send + Sync {
    /// Looks up the account owning a card number.
    fn find_account_by_card_number(
        &self,
        card_number: &str,
    ) -> Result<Option<AccountId>, StorageError>;

    /// Returns the PIN secret of an account.
    fn get_pin(&self, id: AccountId) -> Result<Option<String>, StorageError>;

    /// Returns the current balance.
    fn get_balance(&self, id: AccountId) -> Result<i64, StorageError>;

    /// Overwrites the balance unconditionally.
    fn set_balance(&self, id: AccountId, balance: i64) -> Result<(), StorageError>;

    /// Sets the balance to `new` only if it is currently `expected`.
    ///
    /// Returns `false` without writing when another writer got there first.
    fn compare_and_set_balance(
        &self,
        id: AccountId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StorageError>;

    /// Deletes exactly one matching code. Returns `false` if none matched.
    fn consume_one_time_code(&self, id: AccountId, code: &str) -> Result<bool, StorageError>;
}

/// On-disk layout of the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    accounts: Vec<Account>,
    codes: Vec<OneTimeCode>,
}

#[derive(Debug, Clone)]
struct State {
    next_id: u64,
    accounts: HashMap<AccountId, Account>,
    by_card: HashMap<String, AccountId>,
    codes: Vec<OneTimeCode>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: 1,
            accounts: HashMap::new(),
            by_card: HashMap::new(),
            codes: Vec::new(),
        }
    }
}

impl State {
    fn from_file(file: StoreFile) -> Result<Self, StorageError> {
        let mut state = State {
            next_id: file.next_id,
            codes: file.codes,
            ..Default::default()
        };

        for account in file.accounts {
            if account.id.0 >= state.next_id {
                state.next_id = account.id.0 + 1;
            }
            if state
                .by_card
                .insert(account.card_number.clone(), account.id)
                .is_some()
            {
                return Err(StorageError::Corruption(format!(
                    "card number {} registered twice",
                    mask_card_number(&account.card_number)
                )));
            }
            if let Some(previous) = state.accounts.insert(account.id, account) {
                return Err(StorageError::Corruption(format!(
                    "account id {} registered twice",
                    previous.id
                )));
            }
        }

        Ok(state)
    }

    fn to_file(&self) -> StoreFile {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        StoreFile {
            next_id: self.next_id,
            accounts,
            codes: self.codes.clone(),
        }
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, StorageError> {
        self.accounts
            .get_mut(&id)
            .ok_or(StorageError::AccountNotFound(id))
    }
}

/// In-memory account store with optional JSON file persistence.
///
/// Mutations are applied to a copy of the state, written to disk, and only
/// then published, so a failed write changes neither the file nor memory.
///
/// A file-backed store holds an exclusive advisory lock on `<file>.lock` for
/// its whole lifetime. A second process opening the same file gets
/// [`StorageError::Locked`] instead of a stale copy it would later overwrite.
pub struct LocalStore {
    state: RwLock<State>,
    persist_path: Option<PathBuf>,
    /// Released on drop.
    _lock: Option<File>,
}

impl LocalStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            persist_path: None,
            _lock: None,
        }
    }

    /// Opens a store file, creating an empty one if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let lock = acquire_lock(&path)?;

        let state = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let stored: StoreFile = serde_json::from_reader(reader)?;
            let state = State::from_file(stored)?;
            tracing::debug!(
                "Loaded {} account(s) and {} code(s) from {}",
                state.accounts.len(),
                state.codes.len(),
                path.display()
            );
            state
        } else {
            tracing::info!("Store not found, creating {}", path.display());
            let state = State::default();
            write_file(&path, &state)?;
            state
        };

        Ok(Self {
            state: RwLock::new(state),
            persist_path: Some(path),
            _lock: Some(lock),
        })
    }

    /// Returns the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Registers a new account.
    pub fn create_account(
        &self,
        card_number: &str,
        pin: &str,
        balance: i64,
    ) -> Result<AccountId, StorageError> {
        self.mutate(|state| {
            if state.by_card.contains_key(card_number) {
                return Err(StorageError::DuplicateCard);
            }
            let id = AccountId(state.next_id);
            state.next_id += 1;
            state.by_card.insert(card_number.to_string(), id);
            state.accounts.insert(
                id,
                Account {
                    id,
                    card_number: card_number.to_string(),
                    pin: pin.to_string(),
                    balance,
                },
            );
            Ok((id, true))
        })
    }

    /// Issues a one-time withdrawal code for an account.
    ///
    /// The same value may be issued more than once; each issue is consumed
    /// separately.
    pub fn issue_one_time_code(&self, owner: AccountId, code: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            if !state.accounts.contains_key(&owner) {
                return Err(StorageError::AccountNotFound(owner));
            }
            state.codes.push(OneTimeCode {
                owner,
                code: code.to_string(),
            });
            Ok(((), true))
        })
    }

    /// Returns all accounts ordered by id.
    pub fn accounts(&self) -> Vec<Account> {
        self.state.read().to_file().accounts
    }

    /// Returns the number of unused codes held by an account.
    pub fn code_count(&self, owner: AccountId) -> usize {
        self.state
            .read()
            .codes
            .iter()
            .filter(|c| c.owner == owner)
            .count()
    }

    /// Writes the current state to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        if let Some(path) = &self.persist_path {
            write_file(path, &self.state.read())?;
        }
        Ok(())
    }

    /// Applies `f` to a copy of the state and publishes it if `f` reports a
    /// change and the copy was persisted.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<(T, bool), StorageError>,
    ) -> Result<T, StorageError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let (value, changed) = f(&mut next)?;
        if changed {
            if let Some(path) = &self.persist_path {
                write_file(path, &next)?;
            }
            *state = next;
        }
        Ok(value)
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for LocalStore {
    fn find_account_by_card_number(
        &self,
        card_number: &str,
    ) -> Result<Option<AccountId>, StorageError> {
        Ok(self.state.read().by_card.get(card_number).copied())
    }

    fn get_pin(&self, id: AccountId) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().accounts.get(&id).map(|a| a.pin.clone()))
    }

    fn get_balance(&self, id: AccountId) -> Result<i64, StorageError> {
        self.state
            .read()
            .accounts
            .get(&id)
            .map(|a| a.balance)
            .ok_or(StorageError::AccountNotFound(id))
    }

    fn set_balance(&self, id: AccountId, balance: i64) -> Result<(), StorageError> {
        self.mutate(|state| {
            state.account_mut(id)?.balance = balance;
            Ok(((), true))
        })
    }

    fn compare_and_set_balance(
        &self,
        id: AccountId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StorageError> {
        self.mutate(|state| {
            let account = state.account_mut(id)?;
            if account.balance != expected {
                return Ok((false, false));
            }
            account.balance = new;
            Ok((true, true))
        })
    }

    fn consume_one_time_code(&self, id: AccountId, code: &str) -> Result<bool, StorageError> {
        self.mutate(|state| {
            match state
                .codes
                .iter()
                .position(|c| c.owner == id && c.code == code)
            {
                Some(index) => {
                    state.codes.swap_remove(index);
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }
}

/// Writes the state next to `path` and renames it into place.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn acquire_lock(path: &Path) -> Result<File, StorageError> {
    let lock_path = sibling(path, ".lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    if file.try_lock_exclusive().is_err() {
        tracing::warn!("Store {} is in use by another process", path.display());
        return Err(StorageError::Locked(path.to_path_buf()));
    }
    Ok(file)
}

fn write_file(path: &Path, state: &State) -> Result<(), StorageError> {
    let tmp_path = sibling(path, ".tmp");

    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &state.to_file())?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))?
        .sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
