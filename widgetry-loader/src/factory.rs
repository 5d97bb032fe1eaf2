use crate::{WidgetLoaderError, WidgetLoaderResult};
use std::rc::Rc;
use widgetry_base::hashing::HashMap;
use widgetry_base::{CreationContext, Widget, WidgetClass, WidgetClassPath, WidgetInstance};

/// Constructs widgets from loaded classes. Implemented by the game.
pub trait WidgetFactory {
    fn create_widget(
        &self,
        class: &WidgetClass,
        creation_context: &CreationContext,
    ) -> WidgetLoaderResult<Rc<dyn Widget>>;
}

/// Creates a widget and wraps it into a new `WidgetInstance` with a fresh id.
pub(crate) fn create_instance(
    factory: &dyn WidgetFactory,
    class: &WidgetClass,
    creation_context: &CreationContext,
) -> WidgetLoaderResult<WidgetInstance> {
    let widget = factory.create_widget(class, creation_context)?;
    let instance = WidgetInstance::new(class.path().clone(), widget);
    log::trace!("Constructed {:?}", instance);
    Ok(instance)
}

type WidgetConstructor =
    Box<dyn Fn(&WidgetClass, &CreationContext) -> WidgetLoaderResult<Rc<dyn Widget>>>;

/// A `WidgetFactory` that looks constructors up by class path.
#[derive(Default)]
pub struct WidgetFactoryRegistry {
    constructors: HashMap<WidgetClassPath, WidgetConstructor>,
}

impl WidgetFactoryRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the constructor for a class. Registering the same class twice is a bug.
    pub fn register<F>(
        &mut self,
        class_path: impl Into<WidgetClassPath>,
        constructor: F,
    ) where
        F: Fn(&WidgetClass, &CreationContext) -> WidgetLoaderResult<Rc<dyn Widget>> + 'static,
    {
        let class_path = class_path.into();
        log::debug!("Registered widget constructor for {}", class_path);
        let old = self.constructors.insert(class_path, Box::new(constructor));
        assert!(old.is_none());
    }

    /// Shorthand for widgets that don't care about the class or the creation context.
    pub fn register_simple<T, F>(
        &mut self,
        class_path: impl Into<WidgetClassPath>,
        constructor: F,
    ) where
        T: Widget,
        F: Fn() -> T + 'static,
    {
        self.register(class_path, move |_, _| {
            let widget: Rc<dyn Widget> = Rc::new(constructor());
            Ok(widget)
        });
    }

    pub fn contains(
        &self,
        class_path: &WidgetClassPath,
    ) -> bool {
        self.constructors.contains_key(class_path)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl WidgetFactory for WidgetFactoryRegistry {
    fn create_widget(
        &self,
        class: &WidgetClass,
        creation_context: &CreationContext,
    ) -> WidgetLoaderResult<Rc<dyn Widget>> {
        let constructor = self.constructors.get(class.path()).ok_or_else(|| {
            WidgetLoaderError::LoadFailure(format!(
                "No widget constructor registered for {}",
                class.path()
            ))
        })?;

        (constructor)(class, creation_context)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use widgetry_base::WorldId;

    struct Button {
        world: WorldId,
    }
    impl Widget for Button {}

    #[test]
    fn registry_uses_class_and_context() {
        let mut registry = WidgetFactoryRegistry::new();
        registry.register("/Game/UI/Button.Button_C", |_class, context| {
            let widget: Rc<dyn Widget> = Rc::new(Button {
                world: context.world,
            });
            Ok(widget)
        });
        assert_eq!(registry.len(), 1);

        let class = WidgetClass::new("/Game/UI/Button.Button_C".into(), None);
        let context = CreationContext::new(WorldId(7), None);
        let instance = create_instance(&registry, &class, &context).unwrap();
        assert_eq!(instance.class_path(), class.path());
        assert_eq!(instance.downcast_ref::<Button>().unwrap().world, WorldId(7));
    }

    #[test]
    fn unknown_class_is_a_load_failure() {
        let registry = WidgetFactoryRegistry::new();
        let class = WidgetClass::new("/Game/UI/Missing.Missing_C".into(), None);
        let result = registry.create_widget(&class, &CreationContext::new(WorldId(1), None));
        assert!(matches!(result, Err(WidgetLoaderError::LoadFailure(_))));
    }
}
