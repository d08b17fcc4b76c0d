use sqlx::{Sqlite, SqlitePool};

use crate::{
    error::{Error, QueryError},
    schema::Tag,
};

/// Case-folds the name and inserts it if absent, in one statement. The
/// no-op `DO UPDATE` makes `RETURNING` yield the surviving row whether
/// the insert happened or an equal tag already existed, so concurrent
/// callers always converge on a single row.
pub async fn get_or_create_tag<'e, E>(name: &str, executor: E) -> Result<Tag, Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::Validation(String::from("tag name is required")));
    }

    let tag: Tag = sqlx::query_as(
        "
        INSERT INTO tags (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = excluded.name
        RETURNING id, name
    ",
    )
    .bind(name)
    .fetch_one(executor)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(tag)
}

pub async fn list_tags(pool: &SqlitePool) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(rows)
}
