mod common;

use recipe_shelf_sdk::actions::recipes;
use recipe_shelf_sdk::pagination::PageQuery;
use recipe_shelf_sdk::schema::RecipeFilters;

use common::minimal_recipe;

#[tokio::test]
async fn tenants_cannot_see_each_others_recipes() {
    let (registry, _settings, _guard) = common::setup();

    let pool_a = registry.open("11").await.unwrap();
    let pool_b = registry.open("22").await.unwrap();

    recipes::create_recipe(minimal_recipe("karjalanpaisti"), &pool_a)
        .await
        .unwrap();

    let page_a = recipes::fetch_recipes(&RecipeFilters::default(), PageQuery::default(), &pool_a)
        .await
        .unwrap();
    let page_b = recipes::fetch_recipes(&RecipeFilters::default(), PageQuery::default(), &pool_b)
        .await
        .unwrap();

    assert_eq!(page_a.total, 1);
    assert_eq!(page_b.total, 0);
    assert!(page_b.items.is_empty());
}

#[tokio::test]
async fn provisioning_creates_store_and_upload_dir() {
    let (registry, _settings, _guard) = common::setup();

    registry.provision("11").await.unwrap();

    assert!(registry.db_path("11").is_file());
    assert!(registry.upload_dir("11").is_dir());
}

#[tokio::test]
async fn teardown_removes_database_and_uploads() {
    let (registry, _settings, _guard) = common::setup();

    let pool = registry.open("11").await.unwrap();
    recipes::create_recipe(minimal_recipe("lohikeitto"), &pool)
        .await
        .unwrap();
    std::fs::write(registry.upload_dir("11").join("img.png"), b"bytes").unwrap();

    registry.teardown("11").await.unwrap();

    assert!(!registry.db_path("11").exists());
    assert!(!registry.upload_dir("11").exists());
}

#[tokio::test]
async fn reprovision_after_teardown_yields_an_empty_store() {
    let (registry, _settings, _guard) = common::setup();

    let pool = registry.open("11").await.unwrap();
    recipes::create_recipe(minimal_recipe("makaronilaatikko"), &pool)
        .await
        .unwrap();

    registry.teardown("11").await.unwrap();

    let pool = registry.open("11").await.unwrap();
    let page = recipes::fetch_recipes(&RecipeFilters::default(), PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn teardown_of_unknown_tenant_is_a_noop() {
    let (registry, _settings, _guard) = common::setup();

    registry.teardown("never-provisioned").await.unwrap();
}

#[tokio::test]
async fn reopening_a_store_keeps_existing_data() {
    let (registry, _settings, _guard) = common::setup();

    let pool = registry.open("11").await.unwrap();
    recipes::create_recipe(minimal_recipe("hernekeitto"), &pool)
        .await
        .unwrap();

    let pool_again = registry.open("11").await.unwrap();
    let page =
        recipes::fetch_recipes(&RecipeFilters::default(), PageQuery::default(), &pool_again)
            .await
            .unwrap();

    assert_eq!(page.total, 1);
}
