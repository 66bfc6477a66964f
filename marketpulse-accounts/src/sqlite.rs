/*!
SQLite-backed account store
*/

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result as SqliteResult, Row};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::account::{Account, AccountId, AccountStatus, OwnedResource, ResourceKind};
use crate::error::StoreError;
use crate::store::AccountStore;

/// Persistent account store backed by a SQLite database.
///
/// The connection lives behind an async mutex, so every operation is
/// atomic with respect to other callers of this store instance.
pub struct SqliteAccountStore {
    conn: Mutex<Connection>,
}

impl SqliteAccountStore {
    /// Open (and if necessary create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(&path)?;
        initialize_schema(&conn)?;
        info!("opened account database at {:?}", path.as_ref());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS owned_resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            path TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_status ON accounts(status);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_live_username
            ON accounts(username) WHERE status != 'deleted';
        CREATE INDEX IF NOT EXISTS idx_resources_account ON owned_resources(account_id);
    "#,
    )
}

fn row_to_account(row: &Row) -> SqliteResult<Account> {
    let status_raw: String = row.get(7)?;
    let status = AccountStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown account status: {status_raw}").into(),
        )
    })?;

    Ok(Account {
        id: AccountId::new(row.get::<_, String>(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        password_hash: row.get(6)?,
        status,
        created_at: parse_timestamp(&row.get::<_, String>(8)?, 8)?,
        updated_at: parse_timestamp(&row.get::<_, String>(9)?, 9)?,
    })
}

fn parse_timestamp(raw: &str, column: usize) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                e.to_string().into(),
            )
        })
}

const ACCOUNT_COLUMNS: &str = "id, username, email, phone, first_name, last_name, \
                               password_hash, status, created_at, updated_at";

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
        ))?;

        match stmt.query_row([id.as_str()], row_to_account) {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 AND status != 'deleted'"
        ))?;

        match stmt.query_row([username], row_to_account) {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let live_username: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE username = ?1 AND status != 'deleted'",
            [&account.username],
            |row| row.get(0),
        )?;
        if live_username > 0 {
            return Err(StoreError::UsernameTaken(account.username.clone()));
        }

        conn.execute(
            "INSERT INTO accounts \
             (id, username, email, phone, first_name, last_name, password_hash, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            (
                account.id.as_str(),
                &account.username,
                &account.email,
                &account.phone,
                &account.first_name,
                &account.last_name,
                &account.password_hash,
                account.status.as_str(),
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ),
        )?;

        debug!("stored account {}", account.id);
        Ok(())
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let conflict: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts \
             WHERE username = ?1 AND status != 'deleted' AND id != ?2",
            (&account.username, account.id.as_str()),
            |row| row.get(0),
        )?;
        if conflict > 0 {
            return Err(StoreError::UsernameTaken(account.username.clone()));
        }

        let changed = conn.execute(
            "UPDATE accounts SET username = ?2, email = ?3, phone = ?4, first_name = ?5, \
             last_name = ?6, password_hash = ?7, status = ?8, updated_at = ?9 \
             WHERE id = ?1",
            (
                account.id.as_str(),
                &account.username,
                &account.email,
                &account.phone,
                &account.first_name,
                &account.last_name,
                &account.password_hash,
                account.status.as_str(),
                account.updated_at.to_rfc3339(),
            ),
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(account.id.clone()));
        }
        Ok(())
    }

    async fn set_status(&self, id: &AccountId, status: AccountStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let current_raw: String = match conn.query_row(
            "SELECT status FROM accounts WHERE id = ?1",
            [id.as_str()],
            |row| row.get(0),
        ) {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let current = AccountStatus::parse(&current_raw)
            .ok_or_else(|| StoreError::Backend(format!("unknown account status: {current_raw}")))?;
        if !current.can_become(status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        conn.execute(
            "UPDATE accounts SET status = ?2, updated_at = ?3 WHERE id = ?1",
            (id.as_str(), status.as_str(), Utc::now().to_rfc3339()),
        )?;

        debug!("account {} is now {}", id, status);
        Ok(())
    }

    async fn add_owned_resource(&self, resource: &OwnedResource) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO owned_resources (account_id, kind, path, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            (
                resource.account_id.as_str(),
                resource.kind.as_str(),
                &resource.path,
                resource.created_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    async fn delete_owned_resources(&self, id: &AccountId) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM owned_resources WHERE account_id = ?1",
            [id.as_str()],
        )?;
        debug!("removed {} owned resources for account {}", removed, id);
        Ok(removed as u64)
    }

    async fn list_by_status(
        &self,
        status: AccountStatus,
        limit: usize,
    ) -> Result<Vec<AccountId>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id FROM accounts WHERE status = ?1 ORDER BY id LIMIT ?2",
        )?;

        let id_iter = stmt.query_map((status.as_str(), limit as i64), |row| {
            Ok(AccountId::new(row.get::<_, String>(0)?))
        })?;

        let mut ids = Vec::new();
        for id in id_iter {
            ids.push(id?);
        }
        Ok(ids)
    }
}
