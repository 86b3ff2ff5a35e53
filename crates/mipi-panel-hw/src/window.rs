//! Cache of the controller's last programmed address window.

/// Column and page ranges last sent to the controller, offsets applied.
///
/// A range is `None` until it has been programmed, or after something
/// changed the controller's window without going through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressWindow {
    columns: Option<(u16, u16)>,
    pages: Option<(u16, u16)>,
}

impl AddressWindow {
    /// Returns an empty window that matches no range.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Forgets both ranges so the next window set reprograms them.
    pub fn invalidate(&mut self) {
        *self = Self::unknown();
    }

    /// Inclusive column range `(x0, x1)`.
    pub fn columns(&self) -> Option<(u16, u16)> {
        self.columns
    }

    /// Inclusive page range `(y0, y1)`.
    pub fn pages(&self) -> Option<(u16, u16)> {
        self.pages
    }

    /// Records a new column range. Returns false if it was already current.
    pub fn update_columns(&mut self, x0: u16, x1: u16) -> bool {
        Self::update(&mut self.columns, (x0, x1))
    }

    /// Records a new page range. Returns false if it was already current.
    pub fn update_pages(&mut self, y0: u16, y1: u16) -> bool {
        Self::update(&mut self.pages, (y0, y1))
    }

    fn update(slot: &mut Option<(u16, u16)>, range: (u16, u16)) -> bool {
        if *slot == Some(range) {
            return false;
        }
        *slot = Some(range);
        true
    }
}
