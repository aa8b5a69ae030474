use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::trace;

/// How long `show_details` keeps looking for a marker after moving the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupChange<T> {
    pub opened: T,
    pub closed: Option<T>,
}

/// Live markers of the current frame plus the single open popup.
///
/// The popup is keyed by item rather than by marker, so it survives the marker
/// being torn down and rebuilt when clustering changes. While its marker is
/// absent the popup is kept but not shown.
#[derive(Debug, Clone)]
pub struct PopupState<T> {
    markers: HashSet<T>,
    generation: u64,
    open: Option<T>,
}

impl<T> Default for PopupState<T> {
    fn default() -> Self {
        Self {
            markers: HashSet::new(),
            generation: 0,
            open: None,
        }
    }
}

impl<T: Clone + Eq + Hash + Debug> PopupState<T> {
    /// Replaces the live marker set with the leaves of a new frame.
    pub fn sync_markers<'a>(&mut self, leaves: impl IntoIterator<Item = &'a T>)
    where
        T: 'a,
    {
        self.markers = leaves.into_iter().cloned().collect();
        self.generation += 1;

        trace!(
            generation = self.generation,
            markers = self.markers.len(),
            "Markers rebuilt"
        );
    }

    /// Incremented on every marker rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_marker(&self, item: &T) -> bool {
        self.markers.contains(item)
    }

    /// Opens the popup for `item`, closing any other one. `None` when `item` has no marker.
    pub fn open(&mut self, item: &T) -> Option<PopupChange<T>> {
        if !self.has_marker(item) {
            return None;
        }

        let closed = self.open.replace(item.clone()).filter(|previous| previous != item);

        if let Some(previous) = &closed {
            trace!("Closed popup for {:?}", previous);
        }

        Some(PopupChange {
            opened: item.clone(),
            closed,
        })
    }

    pub fn close(&mut self) -> Option<T> {
        self.open.take()
    }

    pub fn open_item(&self) -> Option<&T> {
        self.open.as_ref()
    }

    /// The open popup, only while its marker is on screen.
    pub fn visible_popup(&self) -> Option<&T> {
        self.open.as_ref().filter(|item| self.markers.contains(item))
    }
}
