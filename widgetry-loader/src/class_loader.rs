use crossbeam_channel::Sender;
use std::sync::Arc;
use widgetry_base::{RequestId, WidgetClass, WidgetClassPath};

//
// Events that drive request state changes. They are produced by class loaders, possibly on other
// threads, and consumed by LoadCoordinator::update() on the thread that owns the coordinator.
//
#[derive(Debug)]
pub enum LoaderEvent {
    // Sent when a class loader finished the load for a request. The result (or lack of one) is
    // read back from the request's ClassLoadHandle.
    ClassLoaded(RequestId),
    // Sent when a class loader dropped a completion without calling complete(). A canceled load is
    // left for the sweep, anything else fails the request.
    CompletionDropped(RequestId),
}

/// Lets a class loader signal that the load for one request has finished. Calling `complete()` is
/// safe from any thread; the coordinator picks the event up on its next `update()`.
///
/// Dropping a `LoadCompletion` without completing it is allowed for canceled loads, the request is
/// reclaimed once its handle reports the cancellation. If the handle was not canceled the request
/// fails, since nothing is left that could finish it.
pub struct LoadCompletion {
    sender: Option<Sender<LoaderEvent>>,
    request_id: RequestId,
}

impl LoadCompletion {
    pub(crate) fn new(
        sender: Sender<LoaderEvent>,
        request_id: RequestId,
    ) -> Self {
        LoadCompletion {
            sender: Some(sender),
            request_id,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Signals that the load finished, successfully or not.
    pub fn complete(mut self) {
        log::trace!("LoadCompletion for {} complete", self.request_id);
        if let Some(sender) = self.sender.take() {
            // If the coordinator is gone there is nobody left to tell
            let _ = sender.send(LoaderEvent::ClassLoaded(self.request_id));
        }
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(LoaderEvent::CompletionDropped(self.request_id));
        }
    }
}

impl std::fmt::Debug for LoadCompletion {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("request_id", &self.request_id)
            .field("completed", &self.sender.is_none())
            .finish()
    }
}

/// One outstanding asynchronous class load.
pub trait ClassLoadHandle {
    /// Best effort and idempotent. Never blocks waiting for the load to stop.
    fn cancel(&self);

    fn has_completed(&self) -> bool;

    fn was_canceled(&self) -> bool;

    /// The loaded class, or None if the load failed or hasn't finished.
    fn loaded_class(&self) -> Option<Arc<WidgetClass>>;
}

/// The service that brings widget classes into memory.
///
/// Loaders may do their work on any thread, but they must never call into the coordinator
/// directly. Completion is reported through the `LoadCompletion` passed to `request_async_load`.
pub trait ClassLoader {
    /// Returns the class if it is already resident. Used by the synchronous fast path.
    fn resident_class(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<Arc<WidgetClass>>;

    /// Starts loading a class. Higher priorities should be serviced sooner, but this is only a
    /// hint. `completion` must be completed exactly once unless the load is canceled first.
    fn request_async_load(
        &self,
        class_path: &WidgetClassPath,
        priority: f32,
        completion: LoadCompletion,
    ) -> Box<dyn ClassLoadHandle>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn complete_sends_one_event() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let completion = LoadCompletion::new(tx, RequestId(4));
        assert_eq!(completion.request_id(), RequestId(4));
        completion.complete();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LoaderEvent::ClassLoaded(RequestId(4))));
    }

    #[test]
    fn dropping_unfinished_completion_is_reported() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(LoadCompletion::new(tx, RequestId(9)));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            LoaderEvent::CompletionDropped(RequestId(9))
        ));
    }

    #[test]
    fn completion_can_finish_on_another_thread() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let completion = LoadCompletion::new(tx, RequestId(2));
        std::thread::spawn(move || completion.complete())
            .join()
            .unwrap();
        assert!(matches!(
            rx.recv().unwrap(),
            LoaderEvent::ClassLoaded(RequestId(2))
        ));
    }
}
