use crate::{WidgetClassPath, WidgetClassRef};
use downcast_rs::{impl_downcast, Downcast};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

create_uuid_newtype!(WidgetInstanceId, "WidgetInstanceId");

/// A constructed UI widget. The loader only needs identity and the optional placeholder
/// capability, everything else is up to the game. Use `downcast_rc`/`downcast_ref` to get the
/// concrete type back.
pub trait Widget: Downcast {
    /// Widgets that can stand in for a loading widget return themselves here.
    fn as_placeholder(&self) -> Option<&dyn LoadingPlaceholder> {
        None
    }
}

impl_downcast!(Widget);

/// Optional capability of widgets shown while the real widget is loading.
pub trait LoadingPlaceholder {
    /// Called once when the placeholder is created for a pending class.
    fn initialize_placeholder(
        &self,
        _class_ref: &WidgetClassRef,
        _loading_context: Option<&dyn Any>,
    ) {
    }

    /// Progress in 0..=1. The coordinator never calls this, it's for whoever drives the placeholder.
    fn on_loading_progress(
        &self,
        _progress: f32,
    ) {
    }

    /// Called right before the loaded widget is handed to the requester, e.g. to start a fade out.
    fn prepare_for_replacement(&self) {}

    fn desired_size(&self) -> (f32, f32) {
        (256.0, 256.0)
    }
}

/// A widget class that is resident in memory and can be used to construct instances.
///
/// Produced by a class loader (possibly on a worker thread) and shared as `Arc<WidgetClass>`.
#[derive(Debug)]
pub struct WidgetClass {
    path: WidgetClassPath,
    // for debugging/convenience, not actually required
    debug_name: Option<Arc<String>>,
}

impl WidgetClass {
    pub fn new(
        path: WidgetClassPath,
        debug_name: Option<Arc<String>>,
    ) -> Self {
        WidgetClass { path, debug_name }
    }

    pub fn path(&self) -> &WidgetClassPath {
        &self.path
    }

    pub fn debug_name(&self) -> Option<&Arc<String>> {
        self.debug_name.as_ref()
    }

    pub fn class_ref(&self) -> WidgetClassRef {
        WidgetClassRef::new(self.path.clone())
    }
}

/// One widget handed out by the coordinator or a pool. Clones refer to the same widget and compare
/// equal; two separately constructed widgets never compare equal.
#[derive(Clone)]
pub struct WidgetInstance {
    id: WidgetInstanceId,
    class_path: WidgetClassPath,
    widget: Rc<dyn Widget>,
}

impl WidgetInstance {
    pub fn new(
        class_path: WidgetClassPath,
        widget: Rc<dyn Widget>,
    ) -> Self {
        WidgetInstance {
            id: WidgetInstanceId::new_random(),
            class_path,
            widget,
        }
    }

    pub fn id(&self) -> WidgetInstanceId {
        self.id
    }

    pub fn class_path(&self) -> &WidgetClassPath {
        &self.class_path
    }

    pub fn widget(&self) -> &Rc<dyn Widget> {
        &self.widget
    }

    pub fn downcast_ref<T: Widget>(&self) -> Option<&T> {
        self.widget.downcast_ref::<T>()
    }

    pub fn downgrade(&self) -> Weak<dyn Widget> {
        Rc::downgrade(&self.widget)
    }
}

impl PartialEq for WidgetInstance {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for WidgetInstance {}

impl Hash for WidgetInstance {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id.hash(state)
    }
}

impl fmt::Debug for WidgetInstance {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("id", &self.id)
            .field("class_path", &self.class_path)
            .finish()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct WorldId(pub u64);

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PlayerId(pub u64);

/// Everything a factory needs to construct a widget: the world it lives in and, optionally, the
/// player that owns it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CreationContext {
    pub world: WorldId,
    pub owning_player: Option<PlayerId>,
}

impl CreationContext {
    pub fn new(
        world: WorldId,
        owning_player: Option<PlayerId>,
    ) -> Self {
        CreationContext {
            world,
            owning_player,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Label;
    impl Widget for Label {}

    #[test]
    fn instances_compare_by_identity() {
        let path = WidgetClassPath::new("/Game/UI/Label.Label_C");
        let a = WidgetInstance::new(path.clone(), Rc::new(Label));
        let b = WidgetInstance::new(path, Rc::new(Label));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(!a.id().is_null());
    }

    #[test]
    fn instances_downcast_to_concrete_widget() {
        let instance = WidgetInstance::new("/Game/UI/Label.Label_C".into(), Rc::new(Label));
        assert!(instance.downcast_ref::<Label>().is_some());
        assert!(instance.widget().as_placeholder().is_none());
    }
}
