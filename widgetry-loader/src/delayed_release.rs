use std::time::Instant;
use widgetry_base::{WidgetClassPath, WidgetInstance, WidgetInstanceId};

/// A widget waiting to go back to its pool.
#[derive(Debug)]
pub struct DelayedRelease {
    pub widget: WidgetInstance,
    pub class_path: WidgetClassPath,
    pub release_at: Instant,
}

/// Widgets released with `immediate = false`, kept in the order they were released. Entries are
/// only matured by the sweep.
#[derive(Default, Debug)]
pub struct DelayedReleaseQueue {
    entries: Vec<DelayedRelease>,
}

impl DelayedReleaseQueue {
    /// Queues a widget. A widget that is already queued keeps its original deadline.
    pub fn push(
        &mut self,
        widget: WidgetInstance,
        class_path: WidgetClassPath,
        release_at: Instant,
    ) -> bool {
        if self.contains(widget.id()) {
            log::debug!("{:?} is already waiting to be released", widget.id());
            return false;
        }

        self.entries.push(DelayedRelease {
            widget,
            class_path,
            release_at,
        });
        true
    }

    /// Removes and returns every entry whose deadline is at or before `now`, oldest first. The
    /// queue is split before anything is handed back, so callers may push while processing.
    pub fn take_matured(
        &mut self,
        now: Instant,
    ) -> Vec<DelayedRelease> {
        if !self.entries.iter().any(|entry| entry.release_at <= now) {
            return Vec::default();
        }

        let (matured, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.release_at <= now);
        self.entries = pending;
        matured
    }

    pub fn remove_instance(
        &mut self,
        instance_id: WidgetInstanceId,
    ) -> bool {
        let len_before = self.entries.len();
        self.entries.retain(|entry| entry.widget.id() != instance_id);
        self.entries.len() != len_before
    }

    pub fn contains(
        &self,
        instance_id: WidgetInstanceId,
    ) -> bool {
        self.entries.iter().any(|entry| entry.widget.id() == instance_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
