//! Row cache with a selection/scroll fast path

use std::collections::HashMap;

use super::item::{content_hash, ListItem};
use crate::store::{AppState, View};

/// Drawing backend for list rows
pub trait RowRenderer {
    type Item: ListItem;
    type Handle;

    /// Build the row for `item` at `index`
    fn create_row(&mut self, index: usize, item: &Self::Item, selected: bool) -> Self::Handle;

    /// Release a row
    fn destroy_row(&mut self, handle: Self::Handle);

    /// Restyle an existing row
    fn set_selected(&mut self, handle: &mut Self::Handle, selected: bool);

    /// Move the viewport to the given first visible row
    fn set_scroll(&mut self, offset: usize);
}

/// How the next frame is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Restyle the selected rows and apply the scroll offset
    FastPath,
    /// Rebuild (or reuse when the content hash still matches)
    FullRebuild,
}

/// Identity of one built list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListHandle {
    /// Bumped on every real rebuild
    pub generation: u64,
    pub len: usize,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rows_built: u64,
    pub rows_destroyed: u64,
    pub fast_updates: u64,
    pub full_rebuilds: u64,
    pub cache_hits: u64,
}

pub struct RenderCache<R: RowRenderer> {
    renderer: R,
    rows: HashMap<String, R::Handle>,
    /// Row keys by position
    order: Vec<String>,
    hash: Option<String>,
    handle: Option<ListHandle>,
    generation: u64,
    selected: Option<usize>,
    scroll: usize,
    stats: RenderStats,
}

impl<R: RowRenderer> RenderCache<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            rows: HashMap::new(),
            order: Vec::new(),
            hash: None,
            handle: None,
            generation: 0,
            selected: None,
            scroll: 0,
            stats: RenderStats::default(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn has_cached_list(&self) -> bool {
        self.hash.is_some()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Cached row handles in display order
    pub fn rows(&self) -> impl Iterator<Item = &R::Handle> + '_ {
        self.order.iter().filter_map(move |key| self.rows.get(key))
    }

    /// Pick the strategy for `state`
    ///
    /// The fast path needs an existing cache built from the conversation list
    /// currently in `state`, the list view, and a change that only moved the
    /// highlight or the viewport.
    pub fn decide(&self, state: &AppState, force_rebuild: bool) -> RenderStrategy {
        if force_rebuild
            || state.navigation.view != View::ConversationList
            || !state.last_change.is_view_only()
        {
            return RenderStrategy::FullRebuild;
        }
        match &self.hash {
            Some(cached) if *cached == content_hash(&state.conversations.conversations) => {
                RenderStrategy::FastPath
            }
            Some(_) => {
                tracing::debug!("Render cache out of date, rebuilding");
                RenderStrategy::FullRebuild
            }
            None => RenderStrategy::FullRebuild,
        }
    }

    /// Decide and apply; returns the strategy used
    pub fn render(&mut self, state: &AppState, items: &[R::Item], force_rebuild: bool) -> RenderStrategy {
        let strategy = self.decide(state, force_rebuild);
        let selected = state.navigation.selected_index;
        let scroll = state.navigation.scroll_offset;

        match strategy {
            RenderStrategy::FastPath => {
                self.update_selection(selected);
                self.update_scroll(scroll);
            }
            RenderStrategy::FullRebuild => {
                self.build_list(items);
                if selected < self.order.len() {
                    self.restyle_selection(selected);
                }
                if self.scroll != scroll && self.scroll_in_range(scroll) {
                    self.renderer.set_scroll(scroll);
                    self.scroll = scroll;
                }
            }
        }
        strategy
    }

    /// Build rows for `items` unless the cached rows already match
    pub fn build_list(&mut self, items: &[R::Item]) -> ListHandle {
        let hash = content_hash(items);
        if self.hash.as_deref() == Some(hash.as_str()) {
            if let Some(handle) = &self.handle {
                self.stats.cache_hits += 1;
                return handle.clone();
            }
        }

        self.release_rows();

        for (index, item) in items.iter().enumerate() {
            let mut key = item.key().to_string();
            if self.rows.contains_key(&key) {
                tracing::debug!("Duplicate row key {:?} at {}", key, index);
                key = self.unused_key(&key, index);
            }
            let row = self.renderer.create_row(index, item, self.selected == Some(index));
            self.rows.insert(key.clone(), row);
            self.order.push(key);
        }
        self.stats.rows_built += items.len() as u64;
        self.stats.full_rebuilds += 1;

        if self.selected.is_some_and(|s| s >= items.len()) {
            self.selected = None;
        }

        self.generation += 1;
        let handle = ListHandle {
            generation: self.generation,
            len: items.len(),
            hash: hash.clone(),
        };
        self.hash = Some(hash);
        self.handle = Some(handle.clone());
        tracing::trace!("Rebuilt {} rows (generation {})", handle.len, handle.generation);
        handle
    }

    /// Move the highlight, restyling only the old and new rows
    pub fn update_selection(&mut self, index: usize) {
        if index >= self.order.len() {
            tracing::debug!("Ignoring selection {} outside {} rows", index, self.order.len());
            return;
        }
        if self.selected == Some(index) {
            return;
        }
        self.restyle_selection(index);
        self.stats.fast_updates += 1;
    }

    pub fn update_scroll(&mut self, offset: usize) {
        if !self.scroll_in_range(offset) {
            tracing::debug!("Ignoring scroll offset {} outside {} rows", offset, self.order.len());
            return;
        }
        if self.scroll == offset {
            return;
        }
        self.renderer.set_scroll(offset);
        self.scroll = offset;
        self.stats.fast_updates += 1;
    }

    /// Release every row and forget the hash
    pub fn destroy(&mut self) {
        self.release_rows();
        self.hash = None;
        self.handle = None;
        self.selected = None;
        if self.scroll != 0 {
            self.renderer.set_scroll(0);
            self.scroll = 0;
        }
    }

    fn scroll_in_range(&self, offset: usize) -> bool {
        offset == 0 || offset < self.order.len()
    }

    fn restyle_selection(&mut self, index: usize) {
        if self.selected == Some(index) {
            return;
        }
        if let Some(old) = self.selected.take() {
            self.set_row_selected(old, false);
        }
        self.set_row_selected(index, true);
        self.selected = Some(index);
    }

    /// First `base#n` (n from `start`) not naming a live row
    fn unused_key(&self, base: &str, start: usize) -> String {
        let mut n = start;
        loop {
            let key = format!("{}#{}", base, n);
            if !self.rows.contains_key(&key) {
                return key;
            }
            n += 1;
        }
    }

    fn set_row_selected(&mut self, index: usize, selected: bool) {
        let Some(key) = self.order.get(index) else {
            return;
        };
        if let Some(row) = self.rows.get_mut(key) {
            self.renderer.set_selected(row, selected);
        }
    }

    fn release_rows(&mut self) {
        for key in self.order.drain(..) {
            if let Some(row) = self.rows.remove(&key) {
                self.renderer.destroy_row(row);
                self.stats.rows_destroyed += 1;
            }
        }
        self.rows.clear();
    }
}

impl<R: RowRenderer> Drop for RenderCache<R> {
    fn drop(&mut self) {
        self.release_rows();
    }
}
