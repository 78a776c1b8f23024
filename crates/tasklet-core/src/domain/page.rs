/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A normalized page window.
///
/// Construction never fails: `page_number` is raised to at least 1 and
/// `page_size` is clamped into `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: i64,
    page_size: i64,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_number(&self) -> i64 {
        self.page_number
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Rows to skip before this page starts.
    pub fn offset(&self) -> i64 {
        (self.page_number - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}
