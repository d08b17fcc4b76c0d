use recipe_shelf_sdk::schema::NewRecipe;
use recipe_shelf_sdk::{registry::StoreRegistry, Settings};
use tempfile::TempDir;

/// Fresh registry rooted in a throwaway directory. The `TempDir` guard
/// must stay alive for the duration of the test.
pub fn setup() -> (StoreRegistry, Settings, TempDir) {
    let dir = TempDir::new().expect("could not create temp dir");

    let settings = Settings {
        secret_key: String::from("integration-test-secret-0123456789abcdef"),
        data_dir: dir.path().join("data"),
        upload_dir: dir.path().join("uploads"),
        ..Settings::default()
    };

    let registry = StoreRegistry::new(&settings);
    (registry, settings, dir)
}

/// Bare recipe payload with no children, for tests that only care about
/// the parent row.
#[allow(dead_code)]
pub fn minimal_recipe(title: &str) -> NewRecipe {
    NewRecipe {
        title: title.to_string(),
        description: None,
        prep_time: None,
        cook_time: None,
        servings: None,
        difficulty: None,
        ingredients: vec![],
        instructions: vec![],
        tags: vec![],
        folder_ids: vec![],
    }
}
