use crate::{ClassPool, PoolStats};
use widgetry_base::hashing::HashMap;
use widgetry_base::{CreationContext, WidgetClassPath};

/// Owns one `ClassPool` per class path. Pools are keyed by path rather than by loaded class so a
/// pool can exist (and be configured) before its class is resident.
///
/// The creation context set here is pushed to every existing pool and inherited by pools created
/// later.
#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<WidgetClassPath, ClassPool>,
    creation_context: Option<CreationContext>,
    default_max_size: Option<usize>,
}

impl PoolRegistry {
    pub fn new(default_max_size: Option<usize>) -> Self {
        PoolRegistry {
            pools: Default::default(),
            creation_context: None,
            default_max_size,
        }
    }

    pub fn creation_context(&self) -> Option<&CreationContext> {
        self.creation_context.as_ref()
    }

    pub fn set_creation_context(
        &mut self,
        creation_context: CreationContext,
    ) {
        log::debug!("Setting widget creation context {:?}", creation_context);
        self.creation_context = Some(creation_context);
        for pool in self.pools.values_mut() {
            pool.set_creation_context(creation_context);
        }
    }

    pub fn get_or_create_pool(
        &mut self,
        class_path: &WidgetClassPath,
    ) -> &mut ClassPool {
        let creation_context = self.creation_context;
        let default_max_size = self.default_max_size;
        self.pools.entry(class_path.clone()).or_insert_with(|| {
            log::debug!("Creating widget pool for {}", class_path);
            ClassPool::new(class_path.clone(), creation_context, default_max_size)
        })
    }

    pub fn pool(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<&ClassPool> {
        self.pools.get(class_path)
    }

    pub fn pool_mut(
        &mut self,
        class_path: &WidgetClassPath,
    ) -> Option<&mut ClassPool> {
        self.pools.get_mut(class_path)
    }

    pub fn contains(
        &self,
        class_path: &WidgetClassPath,
    ) -> bool {
        self.pools.contains_key(class_path)
    }

    pub fn stats(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<PoolStats> {
        self.pools.get(class_path).map(|pool| pool.stats())
    }

    pub fn release_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.release_all();
        }
    }

    pub fn reset_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassPool> {
        self.pools.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use widgetry_base::{PlayerId, WorldId};

    #[test]
    fn context_reaches_old_and_new_pools() {
        let mut registry = PoolRegistry::new(Some(4));
        let early: WidgetClassPath = "/Game/UI/Early.Early_C".into();
        let late: WidgetClassPath = "/Game/UI/Late.Late_C".into();

        assert!(registry.get_or_create_pool(&early).creation_context().is_none());

        let context = CreationContext::new(WorldId(3), Some(PlayerId(1)));
        registry.set_creation_context(context);
        assert_eq!(registry.pool(&early).unwrap().creation_context(), Some(&context));

        let late_pool = registry.get_or_create_pool(&late);
        assert_eq!(late_pool.creation_context(), Some(&context));
        assert_eq!(late_pool.max_size(), Some(4));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn pools_are_created_once_per_path() {
        let mut registry = PoolRegistry::default();
        let path: WidgetClassPath = "/Game/UI/Once.Once_C".into();
        registry.get_or_create_pool(&path).set_max_size(Some(2));
        assert_eq!(registry.get_or_create_pool(&path).max_size(), Some(2));
        assert_eq!(registry.len(), 1);
        assert!(registry.stats(&"/Game/UI/Other.Other_C".into()).is_none());
    }
}
