use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, SqlitePool};
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::error::{Error, QueryError};

/// Schema for the central account store. Holds identity and credentials
/// only; all recipe data lives in the per-tenant stores.
const CENTRAL_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        is_verified INTEGER NOT NULL DEFAULT 0,
        role TEXT NOT NULL DEFAULT 'user',
        created_at TEXT NOT NULL,
        updated_at TEXT,
        reset_token TEXT,
        reset_token_expires TEXT
    );
";

/// Full schema applied to every tenant store. Note the uniqueness
/// constraints backing the atomic insert-if-absent operations
/// (tags.name, favorites.recipe_id, and both join tables).
const TENANT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS recipes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        image_url TEXT,
        prep_time INTEGER,
        cook_time INTEGER,
        servings INTEGER,
        difficulty TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS ingredients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        quantity REAL,
        unit TEXT,
        notes TEXT,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS instructions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        step_number INTEGER NOT NULL,
        content TEXT NOT NULL,
        timer_minutes INTEGER,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        parent_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS recipe_folder (
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
        UNIQUE (recipe_id, folder_id)
    );

    CREATE TABLE IF NOT EXISTS recipe_tag (
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        UNIQUE (recipe_id, tag_id)
    );

    CREATE TABLE IF NOT EXISTS favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipe_id INTEGER NOT NULL UNIQUE REFERENCES recipes(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes (created_at);
    CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients (recipe_id);
    CREATE INDEX IF NOT EXISTS idx_instructions_recipe ON instructions (recipe_id);
";

/// Registry of per-tenant stores: one SQLite database plus one upload
/// directory per tenant, with cached pool handles. The lock serializes
/// first-open per process so two concurrent callers can never construct
/// duplicate engines for the same tenant; steady-state calls clone the
/// cached pool.
pub struct StoreRegistry {
    data_dir: PathBuf,
    upload_root: PathBuf,
    pools: Mutex<HashMap<String, SqlitePool>>,
    central: Mutex<Option<SqlitePool>>,
}

impl StoreRegistry {
    pub fn new(settings: &Settings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            upload_root: settings.upload_dir.clone(),
            pools: Mutex::new(HashMap::new()),
            central: Mutex::new(None),
        }
    }

    pub fn db_path(&self, tenant: &str) -> PathBuf {
        self.data_dir.join(format!("{tenant}.db"))
    }

    pub fn upload_dir(&self, tenant: &str) -> PathBuf {
        self.upload_root.join(tenant)
    }

    /// Pool over the central account store, created on first use.
    pub async fn central(&self) -> Result<SqlitePool, Error> {
        let mut guard = self.central.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let pool = connect(&self.data_dir.join("users.db")).await?;
        pool.execute(CENTRAL_SCHEMA)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;

        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Idempotently creates the tenant's database (with the full schema)
    /// and its upload directory.
    pub async fn provision(&self, tenant: &str) -> Result<(), Error> {
        self.open(tenant).await?;
        Ok(())
    }

    /// Returns the cached pool for a tenant, provisioning lazily on first
    /// use. The handle is always selected from the authenticated identity;
    /// no client-supplied tenant parameter ever reaches this call.
    pub async fn open(&self, tenant: &str) -> Result<SqlitePool, Error> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(tenant) {
            return Ok(pool.clone());
        }

        let pool = connect(&self.db_path(tenant)).await?;
        pool.execute(TENANT_SCHEMA)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        fs::create_dir_all(self.upload_dir(tenant)).await?;

        pools.insert(tenant.to_string(), pool.clone());
        Ok(pool)
    }

    /// Closes and evicts the cached handle, then deletes the database file
    /// and the entire upload directory tree. Safe to call for a tenant
    /// that was never provisioned.
    pub async fn teardown(&self, tenant: &str) -> Result<(), Error> {
        let pool = self.pools.lock().await.remove(tenant);
        if let Some(pool) = pool {
            pool.close().await;
        }

        let db_path = self.db_path(tenant);
        remove_file_if_present(&db_path).await?;
        // SQLite leaves journal side files next to the database.
        remove_file_if_present(&db_path.with_extension("db-wal")).await?;
        remove_file_if_present(&db_path.with_extension("db-shm")).await?;

        let upload_dir = self.upload_dir(tenant);
        match fs::remove_dir_all(&upload_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn connect(path: &Path) -> Result<SqlitePool, Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| QueryError::from(e).into())
}

async fn remove_file_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
