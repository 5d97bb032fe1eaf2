use crate::{WidgetClassPath, WidgetInstance};
use crossbeam_channel::Sender;
use std::fmt::{Debug, Formatter};

/// Operations posted by handles back to the coordinator. They are applied on the coordinator's
/// thread the next time it updates.
#[derive(Debug)]
pub enum ReleaseOp {
    Release {
        widget: WidgetInstance,
        class_path: WidgetClassPath,
        immediate: bool,
    },
}

/// Owns a pooled widget on behalf of the caller and returns it to its pool when released or
/// dropped, whichever comes first. The widget is released at most once.
pub struct WidgetHandle {
    widget: Option<WidgetInstance>,
    class_path: WidgetClassPath,
    sender: Sender<ReleaseOp>,
}

impl WidgetHandle {
    pub fn new(
        sender: Sender<ReleaseOp>,
        widget: WidgetInstance,
        class_path: WidgetClassPath,
    ) -> Self {
        WidgetHandle {
            widget: Some(widget),
            class_path,
            sender,
        }
    }

    pub fn widget(&self) -> Option<&WidgetInstance> {
        self.widget.as_ref()
    }

    pub fn class_path(&self) -> &WidgetClassPath {
        &self.class_path
    }

    pub fn is_valid(&self) -> bool {
        self.widget.is_some()
    }

    /// Sends the widget back to its pool. Calling this more than once does nothing.
    pub fn release(&mut self) {
        self.release_with(true);
    }

    /// Like `release` but lets the coordinator hold the widget back for its release delay first.
    pub fn release_delayed(&mut self) {
        self.release_with(false);
    }

    fn release_with(
        &mut self,
        immediate: bool,
    ) {
        if let Some(widget) = self.widget.take() {
            log::trace!("WidgetHandle release {:?} immediate: {}", widget, immediate);
            // The coordinator may already be gone, in which case there's no pool to return to
            let _ = self.sender.send(ReleaseOp::Release {
                widget,
                class_path: self.class_path.clone(),
                immediate,
            });
        }
    }
}

impl Drop for WidgetHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl Debug for WidgetHandle {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WidgetHandle")
            .field("widget", &self.widget)
            .field("class_path", &self.class_path)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Widget;
    use std::rc::Rc;

    struct Panel;
    impl Widget for Panel {}

    fn panel_instance() -> WidgetInstance {
        WidgetInstance::new("/Game/UI/Panel.Panel_C".into(), Rc::new(Panel))
    }

    #[test]
    fn release_sends_once() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let instance = panel_instance();
        let mut handle = WidgetHandle::new(tx, instance.clone(), instance.class_path().clone());
        assert!(handle.is_valid());

        handle.release();
        handle.release();
        assert!(!handle.is_valid());
        drop(handle);

        let ops: Vec<ReleaseOp> = rx.try_iter().collect();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            ReleaseOp::Release {
                widget, immediate, ..
            } => {
                assert_eq!(*widget, instance);
                assert!(*immediate);
            }
        }
    }

    #[test]
    fn drop_releases_widget() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let instance = panel_instance();
        {
            let _handle = WidgetHandle::new(tx, instance.clone(), instance.class_path().clone());
        }
        assert_eq!(rx.try_iter().count(), 1);
    }
}
