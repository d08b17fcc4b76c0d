use serde::{Deserialize, Serialize};

use crate::constants::{MAX_RECIPE_COUNT_PER_PAGE, RECIPE_COUNT_PER_PAGE};

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn from_rows(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };

        Self {
            items,
            total,
            page,
            per_page,
            pages,
        }
    }
}

/// 1-indexed page query. Out-of-range values are clamped rather than
/// rejected, mirroring the transport defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    RECIPE_COUNT_PER_PAGE
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageQuery {
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_RECIPE_COUNT_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        // The page number is client-supplied and only bounded from below,
        // so the multiply must saturate instead of overflowing.
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}
