//! Service configuration loaded from environment variables.

use store::PageRequest;

/// Tunables for [`OrderLifecycleService`](crate::OrderLifecycleService).
///
/// Reads from environment variables:
/// - `ORDER_DEFAULT_PAGE_SIZE` — page size when none is requested (default: `20`)
/// - `ORDER_MAX_PAGE_SIZE` — upper bound on requested page sizes (default: `100`)
/// - `ORDER_NUMBER_MAX_ATTEMPTS` — inserts tried before an order number
///   collision is surfaced (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub order_number_max_attempts: u32,
}

impl LifecycleConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_page_size: env_u32("ORDER_DEFAULT_PAGE_SIZE")
                .unwrap_or(defaults.default_page_size),
            max_page_size: env_u32("ORDER_MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size),
            order_number_max_attempts: env_u32("ORDER_NUMBER_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.order_number_max_attempts),
        }
    }

    /// Normalizes a caller's paging input against these limits.
    pub fn page(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest::normalized(page, page_size, self.default_page_size, self.max_page_size)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_page_size: PageRequest::DEFAULT_PAGE_SIZE,
            max_page_size: PageRequest::MAX_PAGE_SIZE,
            order_number_max_attempts: 3,
        }
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
