use std::path::Path;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};

use crate::{
    constants::{MAX_RECENT_RECIPE_COUNT, RECENT_RECIPE_COUNT},
    error::{Error, QueryError},
    pagination::{Page, PageQuery},
    schema::{
        FavoriteStatus, Folder, Id, Ingredient, Instruction, NewIngredient, NewInstruction,
        NewRecipe, Recipe, RecipeChanges, RecipeDetails, RecipeFilters, RecipeRow, Tag,
    },
    uploads::images,
};

use super::tags::get_or_create_tag;

const RECIPE_ROW_COLUMNS: &str = "
    r.id, r.title, r.description, r.image_url, r.prep_time, r.cook_time,
    r.difficulty, r.created_at,
    EXISTS (SELECT 1 FROM favorites fav WHERE fav.recipe_id = r.id) AS is_favorite
";

/// Appends every active filter as an `AND` clause. Shared between the
/// count and the page query so the two can never disagree on which rows
/// qualify. Membership filters go through EXISTS subqueries, which keeps
/// one output row per recipe regardless of how many folders or tags it
/// belongs to.
fn push_filters(builder: &mut QueryBuilder<Sqlite>, filters: &RecipeFilters) {
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search.trim().to_lowercase());
        builder
            .push(" AND (LOWER(r.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(r.description, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM ingredients i WHERE i.recipe_id = r.id AND LOWER(i.name) LIKE ")
            .push_bind(pattern)
            .push("))");
    }

    if let Some(folder_id) = filters.folder_id {
        builder
            .push(" AND EXISTS (SELECT 1 FROM recipe_folder rf WHERE rf.recipe_id = r.id AND rf.folder_id = ")
            .push_bind(folder_id)
            .push(")");
    }

    if let Some(tag) = &filters.tag {
        builder
            .push(" AND EXISTS (SELECT 1 FROM recipe_tag rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.name = ")
            .push_bind(tag.trim().to_lowercase())
            .push(")");
    }

    if let Some(difficulty) = filters.difficulty {
        builder
            .push(" AND r.difficulty = ")
            .push_bind(difficulty);
    }

    if filters.favorites_only {
        builder.push(" AND EXISTS (SELECT 1 FROM favorites fav WHERE fav.recipe_id = r.id)");
    }
}

pub async fn fetch_recipes(
    filters: &RecipeFilters,
    query: PageQuery,
    pool: &SqlitePool,
) -> Result<Page<RecipeRow>, Error> {
    let query = query.clamped();

    let mut count_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE 1 = 1");
    push_filters(&mut count_builder, filters);

    let total: (i64,) = count_builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {RECIPE_ROW_COLUMNS} FROM recipes r WHERE 1 = 1"));
    push_filters(&mut builder, filters);
    builder
        .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
        .push_bind(query.per_page)
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(Page::from_rows(rows, total.0, query.page, query.per_page))
}

pub async fn fetch_recent_recipes(
    limit: Option<i64>,
    pool: &SqlitePool,
) -> Result<Vec<RecipeRow>, Error> {
    let limit = limit
        .unwrap_or(RECENT_RECIPE_COUNT)
        .clamp(1, MAX_RECENT_RECIPE_COUNT);

    let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
        "SELECT {RECIPE_ROW_COLUMNS} FROM recipes r ORDER BY r.created_at DESC, r.id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(rows)
}

pub async fn get_recipe(id: Id, pool: &SqlitePool) -> Result<Recipe, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    row.ok_or(Error::NotFound("recipe"))
}

pub async fn get_recipe_details(id: Id, pool: &SqlitePool) -> Result<RecipeDetails, Error> {
    let recipe = get_recipe(id, pool).await?;

    let ingredients: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE recipe_id = $1 ORDER BY id")
            .bind(id)
            .fetch_all(pool)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let instructions: Vec<Instruction> =
        sqlx::query_as("SELECT * FROM instructions WHERE recipe_id = $1 ORDER BY step_number")
            .bind(id)
            .fetch_all(pool)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let tags: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.id, t.name FROM tags t
        INNER JOIN recipe_tag rt ON rt.tag_id = t.id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let folders: Vec<Folder> = sqlx::query_as(
        "
        SELECT f.id, f.name, f.description, f.parent_id, f.created_at FROM folders f
        INNER JOIN recipe_folder rf ON rf.folder_id = f.id
        WHERE rf.recipe_id = $1
        ORDER BY f.name
    ",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let is_favorite = is_favorite(id, pool).await?;

    Ok(RecipeDetails {
        id: recipe.id,
        title: recipe.title,
        description: recipe.description,
        image_url: recipe.image_url,
        prep_time: recipe.prep_time,
        cook_time: recipe.cook_time,
        servings: recipe.servings,
        difficulty: recipe.difficulty,
        created_at: recipe.created_at,
        updated_at: recipe.updated_at,
        ingredients,
        instructions,
        tags,
        folders,
        is_favorite,
    })
}

pub async fn create_recipe(data: NewRecipe, pool: &SqlitePool) -> Result<RecipeDetails, Error> {
    data.validate()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let recipe: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (title, description, prep_time, cook_time, servings, difficulty, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
    ",
    )
    .bind(&data.title)
    .bind(&data.description)
    .bind(data.prep_time)
    .bind(data.cook_time)
    .bind(data.servings)
    .bind(data.difficulty)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let recipe_id = recipe.0;

    insert_ingredients(recipe_id, &data.ingredients, &mut tx).await?;
    insert_instructions(recipe_id, &data.instructions, &mut tx).await?;
    replace_tags(recipe_id, &data.tags, &mut tx).await?;
    replace_folders(recipe_id, &data.folder_ids, &mut tx).await?;

    tx.commit()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    get_recipe_details(recipe_id, pool).await
}

/// Partial update: absent scalars stay untouched, a present collection
/// (even an empty one) replaces the stored collection wholesale. All of
/// it commits atomically.
pub async fn update_recipe(
    id: Id,
    changes: RecipeChanges,
    pool: &SqlitePool,
) -> Result<RecipeDetails, Error> {
    changes.validate()?;
    get_recipe(id, pool).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE recipes SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(title) = &changes.title {
        builder.push(", title = ").push_bind(title);
    }
    if let Some(description) = &changes.description {
        builder.push(", description = ").push_bind(description);
    }
    if let Some(prep_time) = changes.prep_time {
        builder.push(", prep_time = ").push_bind(prep_time);
    }
    if let Some(cook_time) = changes.cook_time {
        builder.push(", cook_time = ").push_bind(cook_time);
    }
    if let Some(servings) = changes.servings {
        builder.push(", servings = ").push_bind(servings);
    }
    if let Some(difficulty) = changes.difficulty {
        builder.push(", difficulty = ").push_bind(difficulty);
    }
    builder.push(" WHERE id = ").push_bind(id);

    builder
        .build()
        .execute(&mut *tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if let Some(ingredients) = &changes.ingredients {
        sqlx::query("DELETE FROM ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        insert_ingredients(id, ingredients, &mut tx).await?;
    }

    if let Some(instructions) = &changes.instructions {
        sqlx::query("DELETE FROM instructions WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        insert_instructions(id, instructions, &mut tx).await?;
    }

    if let Some(tags) = &changes.tags {
        sqlx::query("DELETE FROM recipe_tag WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        replace_tags(id, tags, &mut tx).await?;
    }

    if let Some(folder_ids) = &changes.folder_ids {
        sqlx::query("DELETE FROM recipe_folder WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        replace_folders(id, folder_ids, &mut tx).await?;
    }

    tx.commit()
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    get_recipe_details(id, pool).await
}

/// Deletes the recipe row (children go with it via cascade), then removes
/// the stored image if one existed. The database is authoritative; a
/// failed file removal is logged and swallowed.
pub async fn delete_recipe(id: Id, upload_dir: &Path, pool: &SqlitePool) -> Result<(), Error> {
    let recipe = get_recipe(id, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if let Some(image_url) = &recipe.image_url {
        images::remove_image(upload_dir, image_url).await;
    }

    Ok(())
}

/// Flips favorite state off the row's presence. The UNIQUE constraint on
/// `favorites.recipe_id` makes the insert race-free; when it is a no-op
/// the row already existed and gets deleted instead.
pub async fn toggle_favorite(recipe_id: Id, pool: &SqlitePool) -> Result<FavoriteStatus, Error> {
    get_recipe(recipe_id, pool).await?;

    let inserted = sqlx::query(
        "INSERT INTO favorites (recipe_id, created_at) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(recipe_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if inserted.rows_affected() > 0 {
        return Ok(FavoriteStatus::Added);
    }

    sqlx::query("DELETE FROM favorites WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(FavoriteStatus::Removed)
}

pub async fn is_favorite(recipe_id: Id, pool: &SqlitePool) -> Result<bool, Error> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM favorites WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(row.is_some())
}

/// Returns whether a new membership row was created; attaching an already
/// placed recipe is a no-op, not an error.
pub async fn attach_to_folder(
    recipe_id: Id,
    folder_id: Id,
    pool: &SqlitePool,
) -> Result<bool, Error> {
    get_recipe(recipe_id, pool).await?;
    super::folders::get_folder(folder_id, pool).await?;

    let result = sqlx::query(
        "INSERT INTO recipe_folder (recipe_id, folder_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(recipe_id)
    .bind(folder_id)
    .execute(pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(result.rows_affected() > 0)
}

pub async fn detach_from_folder(
    recipe_id: Id,
    folder_id: Id,
    pool: &SqlitePool,
) -> Result<bool, Error> {
    get_recipe(recipe_id, pool).await?;
    super::folders::get_folder(folder_id, pool).await?;

    let result = sqlx::query("DELETE FROM recipe_folder WHERE recipe_id = $1 AND folder_id = $2")
        .bind(recipe_id)
        .bind(folder_id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(result.rows_affected() > 0)
}

/// Points the recipe at a freshly stored image and removes the superseded
/// file, if any. The row update is authoritative; removal of the old file
/// is best-effort like the rest of the image cleanup.
pub async fn set_recipe_image(
    id: Id,
    image_url: &str,
    upload_dir: &Path,
    pool: &SqlitePool,
) -> Result<(), Error> {
    let recipe = get_recipe(id, pool).await?;

    sqlx::query("UPDATE recipes SET image_url = $1, updated_at = $2 WHERE id = $3")
        .bind(image_url)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if let Some(displaced) = &recipe.image_url {
        if displaced != image_url {
            images::remove_image(upload_dir, displaced).await;
        }
    }

    Ok(())
}

async fn insert_ingredients(
    recipe_id: Id,
    ingredients: &[NewIngredient],
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO ingredients (name, quantity, unit, notes, recipe_id) ");
    builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(&ingredient.name)
            .push_bind(ingredient.quantity)
            .push_bind(&ingredient.unit)
            .push_bind(&ingredient.notes)
            .push_bind(recipe_id);
    });

    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(())
}

async fn insert_instructions(
    recipe_id: Id,
    instructions: &[NewInstruction],
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<(), Error> {
    if instructions.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO instructions (step_number, content, timer_minutes, recipe_id) ");
    builder.push_values(instructions, |mut b, instruction| {
        b.push_bind(instruction.step_number)
            .push_bind(&instruction.content)
            .push_bind(instruction.timer_minutes)
            .push_bind(recipe_id);
    });

    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(())
}

async fn replace_tags(
    recipe_id: Id,
    names: &[String],
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<(), Error> {
    for name in names {
        let tag = get_or_create_tag(name, &mut **tx).await?;

        sqlx::query(
            "INSERT INTO recipe_tag (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag.id)
        .execute(&mut **tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;
    }

    Ok(())
}

/// Unknown folder ids are skipped rather than failing the whole payload,
/// so a stale id in a saved client form cannot block an otherwise valid
/// recipe.
async fn replace_folders(
    recipe_id: Id,
    folder_ids: &[Id],
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<(), Error> {
    for folder_id in folder_ids {
        let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM folders WHERE id = $1")
            .bind(folder_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| -> Error { QueryError::from(e).into() })?;
        if row.is_none() {
            log::debug!("skipping unknown folder {folder_id} for recipe {recipe_id}");
            continue;
        }

        sqlx::query(
            "INSERT INTO recipe_folder (recipe_id, folder_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(folder_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;
    }

    Ok(())
}
