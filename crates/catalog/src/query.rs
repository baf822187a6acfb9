//! Browse/search query model for the battery listing.
//!
//! Stores fetch candidate rows; `BatteryQuery` decides which ones match and in
//! which order they appear, so every backend filters the same way.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Serialize;

use exactmatch_core::{BrandId, CategoryId, DomainError, DomainResult, Money};

use crate::battery::{Battery, Condition};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Price,
    Name,
    AmpHours,
    ColdCrankingAmps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// `ordering` parameter, e.g. `-price` or `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl core::str::FromStr for Sort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (order, name) = match s.strip_prefix('-') {
            Some(rest) => (SortOrder::Desc, rest),
            None => (SortOrder::Asc, s),
        };
        let field = match name {
            "created_at" => SortField::CreatedAt,
            "price" => SortField::Price,
            "name" => SortField::Name,
            "amp_hours" => SortField::AmpHours,
            "cold_cranking_amps" => SortField::ColdCrankingAmps,
            other => {
                return Err(DomainError::validation(format!(
                    "cannot order by '{other}'"
                )));
            }
        };
        Ok(Self { field, order })
    }
}

/// Filters applied to the battery listing. Every field is optional; the
/// default query lists all active batteries, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryQuery {
    /// Substring over name, model number, brand name and description.
    pub search: Option<String>,
    /// Substring over the compatibility notes.
    pub vehicle_search: Option<String>,
    pub categories: Vec<CategoryId>,
    pub brands: Vec<BrandId>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub min_amp_hours: Option<Decimal>,
    pub max_amp_hours: Option<Decimal>,
    pub min_cca: Option<u32>,
    pub max_cca: Option<u32>,
    pub condition: Option<Condition>,
    pub voltage: Option<Decimal>,
    pub in_stock: bool,
    pub featured_only: bool,
    pub popular_only: bool,
    /// Administrative views also see delisted batteries.
    pub include_inactive: bool,
    pub sort: Sort,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

impl BatteryQuery {
    pub fn matches(&self, battery: &Battery, brand_name: &str) -> bool {
        if !self.include_inactive && !battery.is_active {
            return false;
        }
        if self.featured_only && !battery.is_featured {
            return false;
        }
        if self.popular_only && !battery.is_popular {
            return false;
        }
        if self.in_stock && !battery.is_in_stock() {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&battery.category_id) {
            return false;
        }
        if !self.brands.is_empty() && !self.brands.contains(&battery.brand_id) {
            return false;
        }
        if self.condition.is_some_and(|c| c != battery.condition) {
            return false;
        }
        if self.voltage.is_some_and(|v| v != battery.voltage) {
            return false;
        }
        if !within(battery.price, self.min_price, self.max_price) {
            return false;
        }
        if !within(battery.amp_hours, self.min_amp_hours, self.max_amp_hours) {
            return false;
        }
        if self.min_cca.is_some() || self.max_cca.is_some() {
            match battery.cold_cranking_amps {
                Some(cca) if within(cca, self.min_cca, self.max_cca) => {}
                _ => return false,
            }
        }

        if let Some(term) = non_blank(&self.search) {
            let term = term.to_lowercase();
            let hit = battery
                .search_haystack()
                .iter()
                .chain(std::iter::once(&brand_name))
                .any(|field| contains_ci(field, &term));
            if !hit {
                return false;
            }
        }

        if let Some(term) = non_blank(&self.vehicle_search) {
            if !contains_ci(&battery.compatibility, &term.to_lowercase()) {
                return false;
            }
        }

        true
    }

    /// Total order for the listing; ties fall back to id so pages are stable.
    pub fn compare(&self, a: &Battery, b: &Battery) -> Ordering {
        let primary = match self.sort.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Price => a.price.cmp(&b.price),
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::AmpHours => a.amp_hours.cmp(&b.amp_hours),
            SortField::ColdCrankingAmps => a.cold_cranking_amps.cmp(&b.cold_cranking_amps),
        };
        let primary = match self.sort.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filter and sort `(battery, brand name)` rows.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a Battery>
    where
        I: IntoIterator<Item = (&'a Battery, &'a str)>,
    {
        let mut hits: Vec<&Battery> = rows
            .into_iter()
            .filter(|(b, brand)| self.matches(b, brand))
            .map(|(b, _)| b)
            .collect();
        hits.sort_by(|a, b| self.compare(a, b));
        hits
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    pub fn new(number: Option<u32>, size: Option<u32>) -> DomainResult<Self> {
        let number = number.unwrap_or(1);
        if number == 0 {
            return Err(DomainError::validation("page numbers start at 1"));
        }
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { number, size })
    }

    pub fn offset(&self) -> usize {
        (self.number as usize - 1) * self.size as usize
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Slice an already filtered and sorted list.
    pub fn slice(items: Vec<T>, page: Page) -> Self {
        let count = items.len();
        let results = items
            .into_iter()
            .skip(page.offset())
            .take(page.size as usize)
            .collect();
        Self { count, results }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
