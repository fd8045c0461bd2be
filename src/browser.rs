//! # Paginated Browser
//!
//! Stable forward/backward/random-access paging over an
//! [`OrderedResultProvider`]. The browser keeps nothing but a [`Cursor`];
//! every page is re-fetched from the provider when rendered.
//!
//! ## Cursor model
//!
//! The cursor position is the 1-based absolute position of the first row of
//! the current page. It is always page-aligned (1, 1 + page_size, ...), so a
//! forward step followed by a backward step lands exactly where it started.
//!
//! `total_rows` is counted once in [`Browser::open`] and never refreshed.
//! Mutations that change set membership (removing a song from the playlist
//! being browsed) are visible on the next render but the page count stays
//! as it was.

use crate::error::{DotifyError, Result};
use crate::provider::OrderedResultProvider;
use log::{debug, trace};

/// Where the current page sits in the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePosition {
    /// Single page: no navigation possible.
    Only,
    First,
    Middle,
    Last,
}

/// Number of pages needed for `total_rows`.
#[must_use]
pub const fn page_count(total_rows: usize, page_size: usize) -> usize {
    total_rows.div_ceil(page_size)
}

/// 1-based page number holding absolute row `position` (1-based).
#[must_use]
pub const fn page_of(position: usize, page_size: usize) -> usize {
    if position == 0 {
        0
    } else {
        (position - 1) / page_size + 1
    }
}

/// Classify the page holding `position`.
#[must_use]
pub const fn page_position(position: usize, page_size: usize, total_rows: usize) -> PagePosition {
    let pages = page_count(total_rows, page_size);
    let page = page_of(position, page_size);
    if pages <= 1 {
        PagePosition::Only
    } else if page <= 1 {
        PagePosition::First
    } else if page >= pages {
        PagePosition::Last
    } else {
        PagePosition::Middle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    page_size: usize,
    total_rows: usize,
}

impl Cursor {
    /// A page size of 0 is treated as 1.
    #[must_use]
    pub fn new(page_size: usize, total_rows: usize) -> Self {
        Self { position: total_rows.min(1), page_size: page_size.max(1), total_rows }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub const fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// 0-based offset of the first row on the current page.
    #[must_use]
    pub const fn page_start(&self) -> usize {
        self.position.saturating_sub(1)
    }

    /// Rows on the current page: full pages except possibly the last.
    #[must_use]
    pub fn page_len(&self) -> usize {
        self.page_size.min(self.total_rows - self.page_start())
    }

    #[must_use]
    pub const fn page_number(&self) -> usize {
        page_of(self.position, self.page_size)
    }

    #[must_use]
    pub const fn page_count(&self) -> usize {
        page_count(self.total_rows, self.page_size)
    }

    #[must_use]
    pub const fn page_position(&self) -> PagePosition {
        page_position(self.position, self.page_size, self.total_rows)
    }

    /// Move one page forward. Returns `false` (and stays put) on the last page.
    pub fn forward(&mut self) -> bool {
        let next = self.position + self.page_size;
        if next > self.total_rows {
            return false;
        }
        self.position = next;
        true
    }

    /// Move one page back. Returns `false` (and stays put) on the first page.
    pub fn backward(&mut self) -> bool {
        if self.position <= self.page_size {
            return false;
        }
        self.position -= self.page_size;
        true
    }

    /// Move to the page containing absolute row `row` (1-based).
    ///
    /// # Errors
    ///
    /// [`DotifyError::OutOfRange`] unless `1 <= row <= total_rows`.
    pub fn jump_to(&mut self, row: usize) -> Result<()> {
        if row == 0 || row > self.total_rows {
            return Err(DotifyError::OutOfRange { index: row, len: self.total_rows });
        }
        self.position = (page_of(row, self.page_size) - 1) * self.page_size + 1;
        Ok(())
    }
}

/// One rendered page. `start` is the absolute position of `rows[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub start: usize,
    pub number: usize,
    pub count: usize,
    pub rows: Vec<R>,
}

impl<R> Page<R> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(index_in_page, absolute_position, row)`, both 1-based.
    pub fn positioned(&self) -> impl Iterator<Item = (usize, usize, &R)> {
        self.rows.iter().enumerate().map(move |(i, row)| (i + 1, self.start + i, row))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
    /// Page containing this 1-based absolute row.
    Absolute(usize),
}

/// Result of [`Browser::apply`]: the row as it was selected, and whether the
/// mutation changed anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<R> {
    pub row: R,
    pub changed: bool,
}

/// A browse session: a provider plus a cursor over it.
#[derive(Debug)]
pub struct Browser<P: OrderedResultProvider> {
    provider: P,
    cursor: Cursor,
}

impl<P: OrderedResultProvider> Browser<P> {
    /// Count the provider's rows and position on the first page.
    ///
    /// # Errors
    ///
    /// [`DotifyError::EmptyResult`] when nothing matches, or whatever the
    /// count query fails with.
    pub fn open(provider: P, page_size: usize) -> Result<Self> {
        let total_rows = provider.count()?;
        if total_rows == 0 {
            return Err(DotifyError::EmptyResult);
        }
        let cursor = Cursor::new(page_size, total_rows);
        debug!("Opened browse session over {total_rows} rows ({} pages)", cursor.page_count());
        Ok(Self { provider, cursor })
    }

    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub const fn total_rows(&self) -> usize {
        self.cursor.total_rows()
    }

    pub fn page_forward(&mut self) -> bool {
        self.cursor.forward()
    }

    pub fn page_backward(&mut self) -> bool {
        self.cursor.backward()
    }

    pub fn jump_to(&mut self, row: usize) -> Result<()> {
        self.cursor.jump_to(row)
    }

    /// Move, then render the page the cursor ends up on.
    pub fn navigate(&mut self, direction: Direction) -> Result<Page<P::Row>> {
        let moved = match direction {
            Direction::Next => self.page_forward(),
            Direction::Previous => self.page_backward(),
            Direction::Absolute(row) => self.jump_to(row).map(|()| true)?,
        };
        if !moved {
            trace!("{direction:?} is a no-op on page {}", self.cursor.page_number());
        }
        self.render_current_page()
    }

    /// Fetch the current page's rows.
    pub fn render_current_page(&self) -> Result<Page<P::Row>> {
        let rows = self
            .provider
            .fetch_range(self.cursor.page_start(), self.cursor.page_len())?;
        Ok(Page {
            start: self.cursor.position(),
            number: self.cursor.page_number(),
            count: self.cursor.page_count(),
            rows,
        })
    }

    /// Row `index` (1-based) of the current page, re-read from the provider.
    ///
    /// # Errors
    ///
    /// [`DotifyError::OutOfRange`] unless `1 <= index <= page_len`.
    pub fn select(&self, index: usize) -> Result<P::Row> {
        let len = self.cursor.page_len();
        if index == 0 || index > len {
            return Err(DotifyError::OutOfRange { index, len });
        }
        self.provider
            .fetch_by_absolute_position(self.cursor.position() + index - 1)
    }

    /// Select row `index` and apply `mutation` to it.
    pub fn apply(&self, index: usize, mutation: &P::Mutation) -> Result<Applied<P::Row>> {
        let row = self.select(index)?;
        let changed = self.provider.mutate(&row, mutation)?;
        if !changed {
            trace!("Mutation on row {index} left the store unchanged");
        }
        Ok(Applied { row, changed })
    }
}
