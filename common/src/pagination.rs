//! Abstractions for offset pagination.

/// One page of `T` items.
#[derive(Clone, Debug)]
pub struct Page<T> {
    /// Items on this [`Page`].
    pub items: Vec<T>,

    /// Total number of items across all pages.
    pub total_count: u64,

    /// [`Arguments`] this [`Page`] has been selected with.
    pub arguments: Arguments,
}

impl<T> Page<T> {
    /// Creates a new [`Page`] out of the provided items.
    #[must_use]
    pub fn new(
        arguments: Arguments,
        items: impl IntoIterator<Item = impl Into<T>>,
        total_count: u64,
    ) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            total_count,
            arguments,
        }
    }

    /// Indicates whether there is a page following this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        let Arguments { number, per_page } = self.arguments;
        u64::from(number) * u64::from(per_page) < self.total_count
    }

    /// Indicates whether there is a page preceding this one.
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.arguments.number > 1
    }

    /// Maps items of this [`Page`] with the provided function.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            arguments: self.arguments,
        }
    }
}

/// Pagination arguments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Arguments {
    /// 1-based number of the requested page.
    number: u32,

    /// Maximum number of items on a page.
    per_page: u32,
}

impl Arguments {
    /// Default number of items on a page.
    pub const DEFAULT_PER_PAGE: u32 = 5;

    /// Creates new [`Arguments`].
    ///
    /// [`None`] is returned if any of the provided values is zero.
    #[must_use]
    pub fn new(number: u32, per_page: u32) -> Option<Self> {
        (number > 0 && per_page > 0).then_some(Self { number, per_page })
    }

    /// Returns [`Arguments`] of the first page.
    #[must_use]
    pub fn first(per_page: u32) -> Option<Self> {
        Self::new(1, per_page)
    }

    /// Returns 1-based page number of these [`Arguments`].
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns maximum number of items on a page.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.per_page
    }

    /// Returns number of items to skip before the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.per_page)
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            number: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// Pagination selector.
#[derive(Clone, Copy, Debug)]
pub struct Selector<F> {
    /// Pagination [`Arguments`].
    pub arguments: Arguments,

    /// Additional filter being applied to the result.
    pub filter: F,
}
