pub const RECIPE_COUNT_PER_PAGE: i64 = 12;
pub const MAX_RECIPE_COUNT_PER_PAGE: i64 = 50;

pub const RECENT_RECIPE_COUNT: i64 = 6;
pub const MAX_RECENT_RECIPE_COUNT: i64 = 20;

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;
pub const MAX_IMAGE_DIMENSION: u32 = 1200;

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_FOLDER_NAME_LENGTH: usize = 255;
