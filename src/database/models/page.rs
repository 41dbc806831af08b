use serde::Serialize;

/// Requested page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Parse raw query values. Missing, zero or unparseable values take the
    /// defaults; `page` is at least 1 and `limit` is clamped to `1..=max_limit`.
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: u32, max_limit: u32) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v != 0);

        let page = parse(page).unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = parse(limit)
            .unwrap_or(default_limit as i64)
            .clamp(1, max_limit.max(1) as i64) as u32;

        Self { page, limit }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        let total = total.max(0);
        let limit = self.limit.max(1) as i64;
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 25 }
    }
}

/// One page of rows plus the total row count across all pages
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}
