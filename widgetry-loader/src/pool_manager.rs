use crate::{LoadCoordinator, PoolRegistry, PoolStats, WidgetLoaderError, WidgetLoaderResult};
use widgetry_base::hashing::HashMap;
use widgetry_base::{PlayerId, WidgetClassPath, WidgetClassRef, WidgetInstance, WorldId};

//
// A game-side helper that keeps its own pools in front of the coordinator's. Widgets for classes
// that were preallocated locally are served and recycled here; everything else falls through to
// the coordinator. Only resident classes are handled, nothing here starts a load.
//
#[derive(Default)]
pub struct WidgetPoolManager {
    local_pools: PoolRegistry,
    max_pool_sizes: HashMap<WidgetClassPath, usize>,
}

impl WidgetPoolManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the world/player widgets are created for, here and in the coordinator.
    pub fn initialize(
        &mut self,
        coordinator: &mut LoadCoordinator,
        world: WorldId,
        owning_player: Option<PlayerId>,
    ) {
        coordinator.set_creation_context(world, owning_player);
        if let Some(creation_context) = coordinator.creation_context() {
            self.local_pools.set_creation_context(*creation_context);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.local_pools.creation_context().is_some()
    }

    /// Constructs `count` widgets of a resident class ahead of time, either in the coordinator's
    /// pool or in a pool local to this manager.
    pub fn preallocate_widgets(
        &mut self,
        coordinator: &mut LoadCoordinator,
        class_ref: &WidgetClassRef,
        count: usize,
        add_to_global_pool: bool,
    ) -> WidgetLoaderResult<()> {
        if count == 0 {
            return Err(WidgetLoaderError::InvalidCount);
        }

        let class = coordinator.try_resident_class(class_ref)?;
        log::debug!(
            "Preallocating {} widgets of {} in the {} pool",
            count,
            class.path(),
            if add_to_global_pool { "global" } else { "local" }
        );

        if add_to_global_pool {
            return coordinator.preallocate_resident(&class, count);
        }

        let max_size = self.max_pool_sizes.get(class.path()).copied();
        let pool = self.local_pools.get_or_create_pool(class.path());
        if max_size.is_some() {
            pool.set_max_size(max_size);
        }
        pool.prefill(&class, coordinator.factory(), count)
    }

    pub fn get_widget(
        &mut self,
        coordinator: &mut LoadCoordinator,
        class_ref: &WidgetClassRef,
    ) -> Option<WidgetInstance> {
        match self.try_get_widget(coordinator, class_ref) {
            Ok(widget) => Some(widget),
            Err(e) => {
                log::warn!("get_widget: {}", e);
                None
            }
        }
    }

    /// Checks out a widget from the local pool for the class if there is one, otherwise from the
    /// coordinator.
    pub fn try_get_widget(
        &mut self,
        coordinator: &mut LoadCoordinator,
        class_ref: &WidgetClassRef,
    ) -> WidgetLoaderResult<WidgetInstance> {
        let class = coordinator.try_resident_class(class_ref)?;
        if let Some(pool) = self.local_pools.pool_mut(class.path()) {
            return pool.get_or_create_instance(&class, coordinator.factory());
        }

        coordinator.try_get_or_create_pooled_widget(&class)
    }

    /// Returns a widget to whichever pool it was checked out from.
    pub fn release_widget(
        &mut self,
        coordinator: &mut LoadCoordinator,
        widget: &WidgetInstance,
        immediate: bool,
    ) {
        if let Some(pool) = self.local_pools.pool_mut(widget.class_path()) {
            if pool.is_active(widget.id()) {
                pool.release(widget);
                return;
            }
        }

        coordinator.release_widget(widget, widget.class_path(), immediate);
    }

    /// Forgets every locally pooled widget and returns all of the coordinator's widgets to its
    /// pools.
    pub fn release_all_widgets(
        &mut self,
        coordinator: &mut LoadCoordinator,
    ) {
        self.local_pools.reset_all();
        coordinator.release_all_widgets();
    }

    pub fn set_max_pool_size(
        &mut self,
        coordinator: &mut LoadCoordinator,
        class_path: &WidgetClassPath,
        max_size: usize,
    ) {
        self.max_pool_sizes.insert(class_path.clone(), max_size);
        if let Some(pool) = self.local_pools.pool_mut(class_path) {
            pool.set_max_size(Some(max_size));
        }
        coordinator.set_max_pool_size(class_path, Some(max_size));
    }

    pub fn max_pool_size(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<usize> {
        self.max_pool_sizes.get(class_path).copied()
    }

    pub fn is_class_loaded(
        &self,
        coordinator: &LoadCoordinator,
        class_ref: &WidgetClassRef,
    ) -> bool {
        coordinator.is_class_loaded(class_ref)
    }

    /// Stats of the pool `get_widget` would use for this class.
    pub fn pool_stats(
        &self,
        coordinator: &LoadCoordinator,
        class_ref: &WidgetClassRef,
    ) -> Option<PoolStats> {
        let class_path = class_ref.path()?;
        self.local_pools
            .stats(class_path)
            .or_else(|| coordinator.pool_stats(class_path))
    }

    pub fn local_pool_stats(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<PoolStats> {
        self.local_pools.stats(class_path)
    }
}
