use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FOLDER_NAME_LENGTH, MAX_TITLE_LENGTH};
use crate::error::Error;

pub type Id = i64;

/// Sentinel value accepted in folder updates: setting `parent_id` to
/// `CLEAR_PARENT` moves the folder back to the root of the forest, while an
/// omitted `parent_id` leaves the placement untouched.
pub const CLEAR_PARENT: Id = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
}

impl User {
    /// Key under which this account's isolated store lives. Derived from the
    /// immutable id so profile renames never orphan the store.
    pub fn tenant_key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Compact list-view projection, without child collections.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub recipe_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Instruction {
    pub id: Id,
    pub step_number: i64,
    pub content: String,
    pub timer_minutes: Option<i64>,
    pub recipe_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Folder {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct FolderRow {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub recipe_count: i64,
}

/// One node of the folder forest, built by grouping rows on `parent_id`.
#[derive(Debug, Clone, Serialize)]
pub struct FolderNode {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub recipe_count: i64,
    pub children: Vec<FolderNode>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetails {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
    pub tags: Vec<Tag>,
    pub folders: Vec<Folder>,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteStatus {
    Added,
    Removed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilters {
    pub search: Option<String>,
    pub folder_id: Option<Id>,
    pub tag: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub favorites_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInstruction {
    pub step_number: i64,
    pub content: String,
    pub timer_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub ingredients: Vec<NewIngredient>,
    #[serde(default)]
    pub instructions: Vec<NewInstruction>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_ids: Vec<Id>,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<(), Error> {
        validate_title(&self.title)?;
        validate_timings(self.prep_time, self.cook_time, self.servings)?;
        validate_ingredients(&self.ingredients)?;
        validate_instructions(&self.instructions)?;
        Ok(())
    }
}

/// Partial update payload. Fields left as `None` are untouched; a present
/// collection (even an empty one) replaces the stored collection wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub ingredients: Option<Vec<NewIngredient>>,
    pub instructions: Option<Vec<NewInstruction>>,
    pub tags: Option<Vec<String>>,
    pub folder_ids: Option<Vec<Id>>,
}

impl RecipeChanges {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_timings(self.prep_time, self.cook_time, self.servings)?;
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        if let Some(instructions) = &self.instructions {
            validate_instructions(instructions)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFolder {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Id>,
}

impl NewFolder {
    pub fn validate(&self) -> Result<(), Error> {
        validate_folder_name(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(CLEAR_PARENT)` moves the folder to the root; `None` leaves the
    /// parent unchanged.
    pub parent_id: Option<Id>,
}

impl FolderChanges {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            validate_folder_name(name)?;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), Error> {
    if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::Validation(format!(
            "title must be between 1 and {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_folder_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "folder name must be between 1 and {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_timings(
    prep_time: Option<i64>,
    cook_time: Option<i64>,
    servings: Option<i64>,
) -> Result<(), Error> {
    if prep_time.is_some_and(|v| v < 0) || cook_time.is_some_and(|v| v < 0) {
        return Err(Error::Validation(String::from(
            "prep_time and cook_time must be non-negative",
        )));
    }
    if servings.is_some_and(|v| v < 1) {
        return Err(Error::Validation(String::from("servings must be at least 1")));
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[NewIngredient]) -> Result<(), Error> {
    if ingredients.iter().any(|i| i.name.is_empty()) {
        return Err(Error::Validation(String::from("ingredient name is required")));
    }
    Ok(())
}

fn validate_instructions(instructions: &[NewInstruction]) -> Result<(), Error> {
    for instruction in instructions {
        if instruction.step_number < 1 {
            return Err(Error::Validation(String::from("step_number must be at least 1")));
        }
        if instruction.content.is_empty() {
            return Err(Error::Validation(String::from("instruction content is required")));
        }
        if instruction.timer_minutes.is_some_and(|v| v < 0) {
            return Err(Error::Validation(String::from(
                "timer_minutes must be non-negative",
            )));
        }
    }
    Ok(())
}
