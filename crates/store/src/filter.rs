use domain::{BuyerId, OrderStatus};

/// A normalized page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Default page size when the caller does not ask for one.
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// Upper bound on the page size.
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Normalizes raw caller input using the built-in defaults.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self::normalized(page, page_size, Self::DEFAULT_PAGE_SIZE, Self::MAX_PAGE_SIZE)
    }

    /// Normalizes raw caller input.
    ///
    /// A missing or zero page becomes 1. A missing or zero page size becomes
    /// `default_size`; anything above `max_size` is clamped to it.
    pub fn normalized(
        page: Option<u32>,
        page_size: Option<u32>,
        default_size: u32,
        max_size: u32,
    ) -> Self {
        let max_size = max_size.max(1);
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(default_size)
            .clamp(1, max_size);
        Self { page, page_size }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Number of rows to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Criteria for listing orders. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub buyer_id: Option<BuyerId>,
    pub status: Option<OrderStatus>,
    pub page: PageRequest,
}

impl OrderFilter {
    /// Creates a filter matching every order, first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by buyer.
    pub fn buyer(mut self, buyer_id: impl Into<BuyerId>) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Selects a page.
    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}
