use crate::ClassLoadHandle;
use std::rc::Weak;
use std::time::{Duration, Instant};
use widgetry_base::hashing::HashMap;
use widgetry_base::lru_cache::LruCache;
use widgetry_base::{RequestId, Requester, Widget, WidgetClassPath, WidgetClassRef, WidgetInstance};

/// Called once with the constructed widget when a request succeeds.
pub type WidgetLoadedCallback = Box<dyn FnOnce(RequestId, &WidgetInstance)>;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RequestStatus {
    // Never issued, or reaped because it was cancelled or its requester went away
    NotStarted,
    Loading,
    Completed,
    Failed,
    Cancelled,
}

// What to do with the class once it's loaded
pub(crate) enum RequestPurpose {
    Widget {
        callback: Option<WidgetLoadedCallback>,
        add_to_pool: bool,
    },
    // Construct a widget straight into the pool's inactive set
    Preallocate,
}

impl RequestPurpose {
    fn name(&self) -> &'static str {
        match self {
            RequestPurpose::Widget { .. } => "Widget",
            RequestPurpose::Preallocate => "Preallocate",
        }
    }
}

pub(crate) struct RequestRecord {
    pub(crate) request_id: RequestId,
    pub(crate) class_ref: WidgetClassRef,
    pub(crate) class_path: WidgetClassPath,
    // Never keeps the requester alive
    pub(crate) requester: Requester,
    // Present for as long as the record is Loading
    pub(crate) load_handle: Option<Box<dyn ClassLoadHandle>>,
    pub(crate) purpose: RequestPurpose,
    pub(crate) placeholder: Option<Weak<dyn Widget>>,
    pub(crate) priority: f32,
    pub(crate) user_data: i32,
    pub(crate) created_at: Instant,
    pub(crate) status: RequestStatus,
}

impl RequestRecord {
    /// Cancels the load if it is still running and lets go of the handle and placeholder.
    pub(crate) fn cancel(&mut self) {
        if let Some(load_handle) = self.load_handle.take() {
            if !load_handle.has_completed() && !load_handle.was_canceled() {
                load_handle.cancel();
            }
        }

        // Released, not destroyed. Whoever shows the placeholder still owns it.
        self.placeholder = None;
        self.status = RequestStatus::Cancelled;
    }

    pub(crate) fn info(
        &self,
        now: Instant,
    ) -> RequestInfo {
        RequestInfo {
            request_id: self.request_id,
            class_path: self.class_path.clone(),
            status: self.status,
            priority: self.priority,
            user_data: self.user_data,
            age: now.saturating_duration_since(self.created_at),
            requester_alive: self.requester.is_alive(),
            has_placeholder: self
                .placeholder
                .as_ref()
                .map(|placeholder| placeholder.strong_count() > 0)
                .unwrap_or(false),
            is_preallocation: matches!(self.purpose, RequestPurpose::Preallocate),
        }
    }
}

impl std::fmt::Debug for RequestRecord {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RequestRecord")
            .field("request_id", &self.request_id)
            .field("class_path", &self.class_path)
            .field("requester", &self.requester)
            .field("purpose", &self.purpose.name())
            .field("priority", &self.priority)
            .field("status", &self.status)
            .finish()
    }
}

/// Diagnostic snapshot of a pending request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub request_id: RequestId,
    pub class_path: WidgetClassPath,
    pub status: RequestStatus,
    pub priority: f32,
    pub user_data: i32,
    pub age: Duration,
    pub requester_alive: bool,
    pub has_placeholder: bool,
    pub is_preallocation: bool,
}

/// Pending requests by id, plus enough history to answer status queries about ids that are no
/// longer pending.
pub(crate) struct RequestTable {
    // Starts at 1 because 0 is RequestId::NONE
    next_request_id: u64,
    records: HashMap<RequestId, RequestRecord>,
    // Ids removed by cancellation or because the requester went away. Bounded, ids that age out
    // of here fall back to reading as Completed.
    reclaimed: LruCache<RequestId, ()>,
}

impl RequestTable {
    pub(crate) fn new(reclaimed_capacity: u32) -> Self {
        RequestTable {
            next_request_id: 1,
            records: Default::default(),
            reclaimed: LruCache::new(reclaimed_capacity.max(3)),
        }
    }

    pub(crate) fn allocate_id(&mut self) -> RequestId {
        let request_id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        request_id
    }

    #[cfg(test)]
    pub(crate) fn next_request_id(&self) -> RequestId {
        RequestId(self.next_request_id)
    }

    /// True if the id was handed out at some point, pending or not.
    pub(crate) fn is_issued(
        &self,
        request_id: RequestId,
    ) -> bool {
        request_id.0 > 0 && request_id.0 < self.next_request_id
    }

    pub(crate) fn insert(
        &mut self,
        record: RequestRecord,
    ) {
        debug_assert!(self.is_issued(record.request_id));
        let old = self.records.insert(record.request_id, record);
        assert!(old.is_none());
    }

    pub(crate) fn get(
        &self,
        request_id: RequestId,
    ) -> Option<&RequestRecord> {
        self.records.get(&request_id)
    }

    pub(crate) fn get_mut(
        &mut self,
        request_id: RequestId,
    ) -> Option<&mut RequestRecord> {
        self.records.get_mut(&request_id)
    }

    /// Removes a record that reached Completed or Failed.
    pub(crate) fn remove(
        &mut self,
        request_id: RequestId,
    ) -> Option<RequestRecord> {
        self.records.remove(&request_id)
    }

    /// Removes a record that was cancelled or abandoned, remembering the id so its status reads
    /// NotStarted afterwards.
    pub(crate) fn remove_reclaimed(
        &mut self,
        request_id: RequestId,
    ) -> Option<RequestRecord> {
        let record = self.records.remove(&request_id)?;
        self.reclaimed.insert(request_id, ());
        Some(record)
    }

    pub(crate) fn status(
        &self,
        request_id: RequestId,
    ) -> RequestStatus {
        if let Some(record) = self.records.get(&request_id) {
            record.status
        } else if !self.is_issued(request_id) || self.reclaimed.contains(&request_id) {
            RequestStatus::NotStarted
        } else {
            RequestStatus::Completed
        }
    }

    /// Pending ids in issue order.
    pub(crate) fn ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<_> = self.records.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RequestRecord> {
        self.records.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
