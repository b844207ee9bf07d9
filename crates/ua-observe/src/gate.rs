//! Runtime level/keyword filter for an attached listener.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::event::{EventLevel, Keywords};

/// The enablement state of a listener, changeable at runtime.
///
/// Every read goes to the atomics, so callers see attach/detach and level
/// changes made from other threads on their next check.
#[derive(Debug)]
pub struct ListenerFilter {
    enabled: AtomicBool,
    level: AtomicU8,
    keywords: AtomicU64,
}

impl ListenerFilter {
    /// Creates a detached filter; nothing is enabled until [`enable`](Self::enable).
    pub fn disabled() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            level: AtomicU8::new(EventLevel::LogAlways as u8),
            keywords: AtomicU64::new(0),
        }
    }

    /// Creates an attached filter.
    pub fn new(level: EventLevel, keywords: Keywords) -> Self {
        let filter = Self::disabled();
        filter.enable(level, keywords);
        filter
    }

    /// Attaches the listener at `level` for `keywords` (empty = all).
    pub fn enable(&self, level: EventLevel, keywords: Keywords) {
        self.level.store(level as u8, Ordering::Relaxed);
        self.keywords.store(keywords.bits(), Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
    }

    /// Detaches the listener.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// The most verbose level currently delivered.
    pub fn level(&self) -> EventLevel {
        EventLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// The keyword set currently delivered; empty means all.
    pub fn keywords(&self) -> Keywords {
        Keywords(self.keywords.load(Ordering::Relaxed))
    }

    /// Returns `true` if an event with `level` and `keywords` would be consumed.
    pub fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        // A listener at LogAlways takes every level.
        let listener_level = self.level();
        let level_ok = listener_level == EventLevel::LogAlways
            || level == EventLevel::LogAlways
            || level <= listener_level;
        let listener_keywords = self.keywords();
        let keywords_ok = listener_keywords.is_empty() || listener_keywords.intersects(keywords);
        level_ok && keywords_ok
    }
}

impl Default for ListenerFilter {
    /// All levels, all keywords.
    fn default() -> Self {
        Self::new(EventLevel::Verbose, Keywords::NONE)
    }
}
