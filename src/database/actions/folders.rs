use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::{
    error::{Error, QueryError},
    schema::{Folder, FolderChanges, FolderNode, FolderRow, Id, NewFolder, CLEAR_PARENT},
};

use chrono::Utc;

const FOLDER_ROW_COLUMNS: &str = "
    f.id, f.name, f.description, f.parent_id, f.created_at,
    (SELECT COUNT(*) FROM recipe_folder rf WHERE rf.folder_id = f.id) AS recipe_count
";

pub async fn create_folder(data: NewFolder, pool: &SqlitePool) -> Result<Folder, Error> {
    data.validate()?;

    if let Some(parent_id) = data.parent_id {
        ensure_folder_exists(parent_id, pool).await?;
    }

    let folder: Folder = sqlx::query_as(
        "
        INSERT INTO folders (name, description, parent_id, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, description, parent_id, created_at
    ",
    )
    .bind(data.name)
    .bind(data.description)
    .bind(data.parent_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(folder)
}

pub async fn list_folders(pool: &SqlitePool) -> Result<Vec<FolderRow>, Error> {
    let rows: Vec<FolderRow> = sqlx::query_as(&format!(
        "SELECT {FOLDER_ROW_COLUMNS} FROM folders f ORDER BY f.name"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(rows)
}

pub async fn get_folder(id: Id, pool: &SqlitePool) -> Result<FolderRow, Error> {
    let row: Option<FolderRow> = sqlx::query_as(&format!(
        "SELECT {FOLDER_ROW_COLUMNS} FROM folders f WHERE f.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    row.ok_or(Error::NotFound("folder"))
}

/// Applies a partial update. `parent_id` is tri-state: omitted keeps the
/// current placement, `CLEAR_PARENT` moves the folder to the root, any
/// other value re-parents under that folder. All checks run before the
/// single UPDATE so a failed move never leaves a half-applied rename.
pub async fn update_folder(
    id: Id,
    changes: FolderChanges,
    pool: &SqlitePool,
) -> Result<FolderRow, Error> {
    changes.validate()?;

    let current = get_folder(id, pool).await?;

    let parent_id = match changes.parent_id {
        None => current.parent_id,
        Some(CLEAR_PARENT) => None,
        Some(parent_id) => {
            if parent_id == id {
                return Err(Error::Validation(String::from(
                    "a folder cannot be its own parent",
                )));
            }
            ensure_folder_exists(parent_id, pool).await?;
            Some(parent_id)
        }
    };

    let name = changes.name.unwrap_or(current.name);
    let description = changes.description.or(current.description);

    sqlx::query("UPDATE folders SET name = $1, description = $2, parent_id = $3 WHERE id = $4")
        .bind(&name)
        .bind(&description)
        .bind(parent_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    get_folder(id, pool).await
}

/// Deletes a folder, promoting its children one level up (to the deleted
/// folder's own parent) and dropping recipe memberships. Recipes placed
/// in the folder are untouched.
pub async fn delete_folder(id: Id, pool: &SqlitePool) -> Result<(), Error> {
    let folder = get_folder(id, pool).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    sqlx::query("UPDATE folders SET parent_id = $1 WHERE parent_id = $2")
        .bind(folder.parent_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    sqlx::query("DELETE FROM recipe_folder WHERE folder_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    sqlx::query("DELETE FROM folders WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    tx.commit()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(())
}

/// Materializes the whole folder forest in two passes: one query for every
/// row, then in-memory grouping on `parent_id`. Roots and siblings keep
/// the query's name ordering.
pub async fn folder_tree(pool: &SqlitePool) -> Result<Vec<FolderNode>, Error> {
    let rows = list_folders(pool).await?;

    let mut children: HashMap<Option<Id>, Vec<FolderRow>> = HashMap::new();
    for row in rows {
        children.entry(row.parent_id).or_default().push(row);
    }

    Ok(build_forest(None, &mut children))
}

fn build_forest(
    parent: Option<Id>,
    children: &mut HashMap<Option<Id>, Vec<FolderRow>>,
) -> Vec<FolderNode> {
    let rows = children.remove(&parent).unwrap_or_default();

    rows.into_iter()
        .map(|row| {
            let nested = build_forest(Some(row.id), children);
            FolderNode {
                id: row.id,
                name: row.name,
                description: row.description,
                parent_id: row.parent_id,
                created_at: row.created_at,
                recipe_count: row.recipe_count,
                children: nested,
            }
        })
        .collect()
}

async fn ensure_folder_exists(id: Id, pool: &SqlitePool) -> Result<(), Error> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM folders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if row.is_none() {
        return Err(Error::NotFound("parent folder"));
    }
    Ok(())
}
