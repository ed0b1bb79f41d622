//! Page window selection for multi-page and animated sources.

use tracing::debug;

use crate::query::QueryStore;

/// Requested page index meaning "the largest page".
pub const PAGE_LARGEST: i32 = -1;

/// Requested page index meaning "the smallest page".
pub const PAGE_SMALLEST: i32 = -2;

/// Pages to decode: `n` pages starting at `page`.
///
/// Before [`select_page`] runs, `page` may still be [`PAGE_LARGEST`] or
/// [`PAGE_SMALLEST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub n: i32,
    pub page: i32,
}

impl PageWindow {
    /// First page only.
    pub const FIRST: PageWindow = PageWindow { n: 1, page: 0 };

    pub fn is_first(&self) -> bool {
        *self == Self::FIRST
    }

    /// The page heuristic requested by `page`, if any.
    pub fn pick(&self) -> Option<PagePick> {
        match self.page {
            PAGE_LARGEST => Some(PagePick::Largest),
            PAGE_SMALLEST => Some(PagePick::Smallest),
            _ => None,
        }
    }
}

/// Resolve the requested page window against the page count of the source.
///
/// Single-page sources always get [`PageWindow::FIRST`]. Invalid `page` or
/// `n` values fall back to 0 and 1.
pub fn page_load_options(query: &QueryStore, n_pages: i32) -> PageWindow {
    if n_pages == 1 {
        return PageWindow::FIRST;
    }

    let page = query.get_if(
        "page",
        |p: &i32| *p == PAGE_LARGEST || *p == PAGE_SMALLEST || (0..=n_pages).contains(p),
        0,
    );

    // Largest/smallest selects exactly one page
    if page == PAGE_LARGEST || page == PAGE_SMALLEST {
        return PageWindow { n: 1, page };
    }

    let n = query.get_if(
        "n",
        |n: &i32| *n == -1 || (1..=n_pages).contains(n),
        1,
    );

    let n = if n == -1 { n_pages - page } else { n };

    PageWindow { n, page }
}

// =============================================================================
// Page Scan
// =============================================================================

/// Which page a scan keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePick {
    Largest,
    Smallest,
}

impl PagePick {
    /// Whether `candidate` replaces `current`. Strict, so ties keep the
    /// earlier page.
    pub fn prefers(self, candidate: u64, current: u64) -> bool {
        match self {
            PagePick::Largest => candidate > current,
            PagePick::Smallest => candidate < current,
        }
    }
}

fn area(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height)
}

/// Load pages `1..n_pages` and return the index of the largest or smallest
/// one, starting from page 0 with dimensions `first`.
///
/// `measure` loads a single page and returns its dimensions. Errors abort the
/// scan.
pub fn select_page<F, E>(
    first: (u32, u32),
    n_pages: i32,
    pick: PagePick,
    mut measure: F,
) -> Result<i32, E>
where
    F: FnMut(i32) -> Result<(u32, u32), E>,
{
    let mut best_page = 0;
    let mut best_size = area(first.0, first.1);

    for page in 1..n_pages {
        let (width, height) = measure(page)?;
        let size = area(width, height);
        if pick.prefers(size, best_size) {
            best_page = page;
            best_size = size;
        }
    }

    debug!(?pick, page = best_page, size = best_size, "Selected page");

    Ok(best_page)
}
