//! Checked handles to resident pages.
//!
//! A [`PageHandle`] is what `fetch_page` and `new_page` hand out instead of
//! a pointer into the frame store. It names a frame and the generation that
//! frame was on when the handle was issued. Content is reached through
//! [`PageHandle::read`] / [`PageHandle::write`], which fail with
//! [`Error::StaleHandle`] once the frame has moved on to another page.
//!
//! Holding a handle does not pin anything; the pin belongs to the
//! fetch/unpin pair. Content guards may be held across pool calls on other
//! pages, such as fetching a child while the parent is locked. Drop a
//! page's guard before unpinning it, and do not flush a page whose guard
//! the same thread holds.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::Frame;
use crate::common::{Error, FrameId, PageId, Result};
use crate::recovery::Lsn;
use crate::storage::Page;

/// Handle to a page that was resident (and pinned) when it was issued.
#[derive(Clone, Copy)]
pub struct PageHandle<'a> {
    frame: &'a Frame,
    frame_id: FrameId,
    page_id: PageId,
    generation: u64,
}

impl<'a> PageHandle<'a> {
    pub(crate) fn new(frame: &'a Frame, frame_id: FrameId, page_id: PageId, generation: u64) -> Self {
        Self {
            frame,
            frame_id,
            page_id,
            generation,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Whether the frame still holds this handle's page.
    ///
    /// Only a hint unless the page is pinned: the answer can change as soon
    /// as it is returned.
    pub fn is_current(&self) -> bool {
        self.frame.generation() == self.generation
    }

    fn check(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(Error::StaleHandle {
                page_id: self.page_id,
                frame_id: self.frame_id,
            })
        }
    }

    /// Shared access to the page content.
    ///
    /// # Errors
    /// `Error::StaleHandle` if the frame has been reassigned.
    pub fn read(&self) -> Result<PageReadGuard<'a>> {
        let lock = self.frame.page();
        self.check()?;
        Ok(PageReadGuard {
            page_id: self.page_id,
            lock,
        })
    }

    /// Exclusive access to the page content.
    ///
    /// Writing does not mark the page dirty; report it on unpin.
    ///
    /// # Errors
    /// `Error::StaleHandle` if the frame has been reassigned.
    pub fn write(&self) -> Result<PageWriteGuard<'a>> {
        let lock = self.frame.page_mut();
        self.check()?;
        Ok(PageWriteGuard {
            page_id: self.page_id,
            lock,
        })
    }

    /// LSN stamped on the page, opaque to the pool.
    pub fn lsn(&self) -> Result<Lsn> {
        let _lock = self.frame.page();
        self.check()?;
        Ok(self.frame.lsn())
    }

    /// Stamp the page with the LSN of the log record describing its change.
    pub fn set_lsn(&self, lsn: Lsn) -> Result<()> {
        let _lock = self.frame.page_mut();
        self.check()?;
        self.frame.set_lsn(lsn);
        Ok(())
    }
}

impl fmt::Debug for PageHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Shared access to a page's content.
pub struct PageReadGuard<'a> {
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl PageReadGuard<'_> {
    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive access to a page's content.
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl PageWriteGuard<'_> {
    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
