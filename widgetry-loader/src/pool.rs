use crate::factory::{create_instance, WidgetFactory};
use crate::{WidgetLoaderError, WidgetLoaderResult};
use widgetry_base::hashing::HashMap;
use widgetry_base::{CreationContext, WidgetClass, WidgetClassPath, WidgetInstance, WidgetInstanceId};

/// Snapshot of a pool's occupancy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub active: usize,
    pub inactive: usize,
    pub max_size: Option<usize>,
}

/// What happened to a widget handed back to a pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReleaseResult {
    // Moved from active to inactive, it will be handed out again
    Parked,
    // Was checked out, but the inactive set was full so the pool let go of it
    Discarded,
    // Not checked out from this pool, nothing changed
    NotActive,
}

/// Pool of widgets of a single class.
///
/// Every pool-owned widget is in exactly one of `active` (checked out) or `inactive` (available).
/// Inactive widgets are handed out most-recently-released first.
pub struct ClassPool {
    class_path: WidgetClassPath,
    active: HashMap<WidgetInstanceId, WidgetInstance>,
    inactive: Vec<WidgetInstance>,
    creation_context: Option<CreationContext>,
    // Caps the inactive set, enforced when widgets are released
    max_size: Option<usize>,
}

impl ClassPool {
    pub fn new(
        class_path: WidgetClassPath,
        creation_context: Option<CreationContext>,
        max_size: Option<usize>,
    ) -> Self {
        ClassPool {
            class_path,
            active: Default::default(),
            inactive: Default::default(),
            creation_context,
            max_size,
        }
    }

    pub fn class_path(&self) -> &WidgetClassPath {
        &self.class_path
    }

    pub fn creation_context(&self) -> Option<&CreationContext> {
        self.creation_context.as_ref()
    }

    pub fn set_creation_context(
        &mut self,
        creation_context: CreationContext,
    ) {
        self.creation_context = Some(creation_context);
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn set_max_size(
        &mut self,
        max_size: Option<usize>,
    ) {
        self.max_size = max_size;
        if let Some(max_size) = max_size {
            if self.inactive.len() > max_size {
                log::debug!(
                    "Pool {} trimming {} inactive widgets to new max size",
                    self.class_path,
                    self.inactive.len() - max_size
                );
                // Keep the most recently released ones
                let excess = self.inactive.len() - max_size;
                self.inactive.drain(0..excess);
            }
        }
    }

    /// Checks out an inactive widget, or constructs a new one if none are available.
    pub fn get_or_create_instance(
        &mut self,
        class: &WidgetClass,
        factory: &dyn WidgetFactory,
    ) -> WidgetLoaderResult<WidgetInstance> {
        debug_assert_eq!(class.path(), &self.class_path);
        if let Some(instance) = self.inactive.pop() {
            log::trace!("Pool {} reusing {:?}", self.class_path, instance.id());
            let old = self.active.insert(instance.id(), instance.clone());
            assert!(old.is_none());
            return Ok(instance);
        }

        let instance = self.construct(class, factory)?;
        self.active.insert(instance.id(), instance.clone());
        Ok(instance)
    }

    /// Constructs a new widget and parks it directly in the inactive set. Only the id is returned,
    /// the widget itself stays with the pool until it is checked out.
    pub fn preallocate_instance(
        &mut self,
        class: &WidgetClass,
        factory: &dyn WidgetFactory,
    ) -> WidgetLoaderResult<WidgetInstanceId> {
        debug_assert_eq!(class.path(), &self.class_path);
        let instance = self.construct(class, factory)?;
        if self.inactive_is_full() {
            log::debug!(
                "Pool {} is full, preallocated widget {:?} is not kept",
                self.class_path,
                instance.id()
            );
        } else {
            self.inactive.push(instance.clone());
        }
        Ok(instance.id())
    }

    /// Checks out `count` widgets and releases them all again, so that up to `count` widgets are
    /// ready to hand out without constructing anything.
    pub fn prefill(
        &mut self,
        class: &WidgetClass,
        factory: &dyn WidgetFactory,
        count: usize,
    ) -> WidgetLoaderResult<()> {
        let mut checked_out = Vec::with_capacity(count);
        let mut result = Ok(());
        for _ in 0..count {
            match self.get_or_create_instance(class, factory) {
                Ok(instance) => checked_out.push(instance),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        for instance in &checked_out {
            self.release(instance);
        }

        result
    }

    /// Returns a checked out widget to the pool. Releasing a widget that isn't checked out from
    /// this pool (including one that was already released) does nothing.
    pub fn release(
        &mut self,
        instance: &WidgetInstance,
    ) -> ReleaseResult {
        let instance = match self.active.remove(&instance.id()) {
            Some(instance) => instance,
            None => {
                log::trace!(
                    "Pool {} ignoring release of {:?}, it isn't checked out",
                    self.class_path,
                    instance.id()
                );
                return ReleaseResult::NotActive;
            }
        };

        debug_assert!(!self.inactive.iter().any(|x| x.id() == instance.id()));
        if self.inactive_is_full() {
            log::debug!(
                "Pool {} is at max size {:?}, discarding {:?}",
                self.class_path,
                self.max_size,
                instance.id()
            );
            return ReleaseResult::Discarded;
        }

        self.inactive.push(instance);
        ReleaseResult::Parked
    }

    /// Moves every checked out widget back to the inactive set.
    pub fn release_all(&mut self) {
        let mut active: Vec<_> = self.active.drain().map(|(_, instance)| instance).collect();
        // HashMap order is arbitrary, keep the order stable between runs
        active.sort_by_key(|instance| instance.id());
        for instance in active {
            if self.inactive_is_full() {
                continue;
            }
            self.inactive.push(instance);
        }
    }

    /// Forgets every widget, active or not. Widgets still held by callers stay alive but will not
    /// come back to this pool.
    pub fn reset(&mut self) {
        log::debug!(
            "Resetting pool {} ({} active, {} inactive)",
            self.class_path,
            self.active.len(),
            self.inactive.len()
        );
        self.active.clear();
        self.inactive.clear();
    }

    pub fn is_active(
        &self,
        instance_id: WidgetInstanceId,
    ) -> bool {
        self.active.contains_key(&instance_id)
    }

    pub fn is_inactive(
        &self,
        instance_id: WidgetInstanceId,
    ) -> bool {
        self.inactive.iter().any(|x| x.id() == instance_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn inactive_count(&self) -> usize {
        self.inactive.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.len(),
            inactive: self.inactive.len(),
            max_size: self.max_size,
        }
    }

    fn inactive_is_full(&self) -> bool {
        self.max_size
            .map(|max_size| self.inactive.len() >= max_size)
            .unwrap_or(false)
    }

    fn construct(
        &self,
        class: &WidgetClass,
        factory: &dyn WidgetFactory,
    ) -> WidgetLoaderResult<WidgetInstance> {
        let creation_context = match &self.creation_context {
            Some(creation_context) => creation_context,
            None => {
                log::error!(
                    "Pool {} cannot construct a widget, no creation context has been set",
                    self.class_path
                );
                return Err(WidgetLoaderError::Uninitialized(self.class_path.clone()));
            }
        };

        create_instance(factory, class, creation_context)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::WidgetFactoryRegistry;
    use widgetry_base::{Widget, WorldId};

    const PANEL: &str = "/Game/UI/Panel.Panel_C";

    struct Panel;
    impl Widget for Panel {}

    fn panel_factory() -> WidgetFactoryRegistry {
        let mut factory = WidgetFactoryRegistry::new();
        factory.register_simple(PANEL, || Panel);
        factory
    }

    fn panel_pool(max_size: Option<usize>) -> (ClassPool, WidgetClass) {
        let class = WidgetClass::new(PANEL.into(), None);
        let pool = ClassPool::new(
            PANEL.into(),
            Some(CreationContext::new(WorldId(1), None)),
            max_size,
        );
        (pool, class)
    }

    #[test]
    fn release_then_get_reuses_instance() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let x = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_eq!(pool.release(&x), ReleaseResult::Parked);
        let y = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_eq!(x, y);
        assert_eq!(pool.stats().active, 1);
        assert_eq!(pool.stats().inactive, 0);
    }

    #[test]
    fn concurrent_checkouts_are_distinct() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let a = pool.get_or_create_instance(&class, &factory).unwrap();
        let b = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn inactive_is_lifo() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let a = pool.get_or_create_instance(&class, &factory).unwrap();
        let b = pool.get_or_create_instance(&class, &factory).unwrap();
        pool.release(&a);
        pool.release(&b);
        assert_eq!(pool.get_or_create_instance(&class, &factory).unwrap(), b);
        assert_eq!(pool.get_or_create_instance(&class, &factory).unwrap(), a);
    }

    #[test]
    fn double_release_does_not_duplicate() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let x = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_eq!(pool.release(&x), ReleaseResult::Parked);
        assert_eq!(pool.release(&x), ReleaseResult::NotActive);
        assert_eq!(pool.inactive_count(), 1);
        assert!(pool.is_inactive(x.id()));
        assert!(!pool.is_active(x.id()));
    }

    #[test]
    fn releasing_a_stranger_is_a_no_op() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);
        let (mut other_pool, _) = panel_pool(None);

        let stranger = other_pool.get_or_create_instance(&class, &factory).unwrap();
        assert_eq!(pool.release(&stranger), ReleaseResult::NotActive);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn reset_never_hands_out_old_instances() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let a = pool.get_or_create_instance(&class, &factory).unwrap();
        let b = pool.get_or_create_instance(&class, &factory).unwrap();
        pool.release(&a);
        pool.reset();
        assert_eq!(pool.stats(), PoolStats::default());

        let c = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);

        // b was checked out before the reset, the pool no longer knows it
        assert_eq!(pool.release(&b), ReleaseResult::NotActive);
    }

    #[test]
    fn missing_context_is_uninitialized() {
        let factory = panel_factory();
        let class = WidgetClass::new(PANEL.into(), None);
        let mut pool = ClassPool::new(PANEL.into(), None, None);

        let result = pool.get_or_create_instance(&class, &factory);
        assert!(matches!(result, Err(WidgetLoaderError::Uninitialized(_))));
        assert_eq!(pool.active_count(), 0);

        pool.set_creation_context(CreationContext::new(WorldId(2), None));
        assert!(pool.get_or_create_instance(&class, &factory).is_ok());
    }

    #[test]
    fn max_size_caps_inactive_on_release() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(Some(1));

        let a = pool.get_or_create_instance(&class, &factory).unwrap();
        let b = pool.get_or_create_instance(&class, &factory).unwrap();
        assert_eq!(pool.release(&a), ReleaseResult::Parked);
        assert_eq!(pool.release(&b), ReleaseResult::Discarded);
        assert_eq!(
            pool.stats(),
            PoolStats {
                active: 0,
                inactive: 1,
                max_size: Some(1)
            }
        );
    }

    #[test]
    fn release_all_parks_everything() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        for _ in 0..3 {
            pool.get_or_create_instance(&class, &factory).unwrap();
        }
        pool.release_all();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.inactive_count(), 3);
    }

    #[test]
    fn prefill_reuses_inactive_widgets() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(None);

        let parked = pool.get_or_create_instance(&class, &factory).unwrap();
        pool.release(&parked);
        pool.prefill(&class, &factory, 3).unwrap();
        assert_eq!(pool.inactive_count(), 3);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.is_inactive(parked.id()));
    }

    #[test]
    fn preallocated_instances_are_inactive() {
        let factory = panel_factory();
        let (mut pool, class) = panel_pool(Some(2));

        let a = pool.preallocate_instance(&class, &factory).unwrap();
        pool.preallocate_instance(&class, &factory).unwrap();
        pool.preallocate_instance(&class, &factory).unwrap();
        assert!(pool.is_inactive(a));
        assert_eq!(pool.inactive_count(), 2);
        assert_eq!(pool.active_count(), 0);
    }
}
