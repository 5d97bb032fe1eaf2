use crate::{RequestId, WidgetClassRef, WidgetInstance};
use std::fmt;
use std::rc::{Rc, Weak};

/// Notifications sent to whoever issued a widget request. Every hook is optional, implement the
/// ones you care about.
///
/// For every accepted request exactly one terminal hook is called, unless the requester has been
/// dropped by then: `on_widget_loaded` (or `on_widget_preallocated` for preallocation requests),
/// `on_widget_load_failed` or `on_widget_load_cancelled`.
pub trait WidgetRequestHandler {
    fn on_widget_requested(
        &self,
        _request_id: RequestId,
        _class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
    }

    fn on_widget_loaded(
        &self,
        _request_id: RequestId,
        _widget: &WidgetInstance,
        _user_data: i32,
    ) {
    }

    /// A preallocation request finished and its widget is parked in the pool. No widget is handed
    /// to the requester, check one out of the pool when it is needed.
    fn on_widget_preallocated(
        &self,
        _request_id: RequestId,
        _class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
    }

    fn on_widget_load_failed(
        &self,
        _request_id: RequestId,
        _class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
    }

    fn on_widget_load_cancelled(
        &self,
        _request_id: RequestId,
        _class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
    }
}

/// A non-owning reference to the object that issued a request. The coordinator only ever holds
/// one of these, so a pending request never keeps its requester alive.
#[derive(Clone, Default)]
pub struct Requester {
    handler: Option<Weak<dyn WidgetRequestHandler>>,
}

impl Requester {
    pub fn new<T: WidgetRequestHandler + 'static>(handler: &Rc<T>) -> Self {
        let handler: Rc<dyn WidgetRequestHandler> = handler.clone();
        Requester {
            handler: Some(Rc::downgrade(&handler)),
        }
    }

    pub fn from_dyn(handler: &Rc<dyn WidgetRequestHandler>) -> Self {
        Requester {
            handler: Some(Rc::downgrade(handler)),
        }
    }

    /// A requester that refers to nothing. Requests made with it are rejected.
    pub fn null() -> Self {
        Requester { handler: None }
    }

    pub fn is_null(&self) -> bool {
        self.handler.is_none()
    }

    /// True while the requesting object still exists.
    pub fn is_alive(&self) -> bool {
        self.handler
            .as_ref()
            .map(|handler| handler.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Returns the handler if the requester is still alive.
    pub fn upgrade(&self) -> Option<Rc<dyn WidgetRequestHandler>> {
        self.handler.as_ref().and_then(|handler| handler.upgrade())
    }
}

impl fmt::Debug for Requester {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_null() {
            write!(f, "Requester(null)")
        } else if self.is_alive() {
            write!(f, "Requester(alive)")
        } else {
            write!(f, "Requester(dropped)")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Listener;
    impl WidgetRequestHandler for Listener {}

    #[test]
    fn requester_does_not_keep_handler_alive() {
        let listener = Rc::new(Listener);
        let requester = Requester::new(&listener);
        assert!(requester.is_alive());
        assert!(requester.upgrade().is_some());

        drop(listener);
        assert!(!requester.is_null());
        assert!(!requester.is_alive());
        assert!(requester.upgrade().is_none());
    }

    #[test]
    fn null_requester_is_never_alive() {
        let requester = Requester::null();
        assert!(requester.is_null());
        assert!(!requester.is_alive());
    }
}
