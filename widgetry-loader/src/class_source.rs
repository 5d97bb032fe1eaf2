use crate::{WidgetLoaderError, WidgetLoaderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use widgetry_base::hashing::HashMap;
use widgetry_base::{WidgetClass, WidgetClassPath};

/// Where `ThreadedClassLoader` gets classes from. `load_class` is called on worker threads and may
/// block.
pub trait WidgetClassSource: Send + Sync {
    fn load_class(
        &self,
        class_path: &WidgetClassPath,
    ) -> WidgetLoaderResult<Arc<WidgetClass>>;
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ManifestClassJson {
    pub path: WidgetClassPath,
    #[serde(default)]
    pub debug_name: Option<String>,
    // Worker sleeps this long before the class becomes available
    #[serde(default)]
    pub simulated_load_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ManifestClassesJson {
    pub classes: Vec<ManifestClassJson>,
}

struct ManifestEntry {
    class: Arc<WidgetClass>,
    simulated_load_time: Duration,
}

/// A class source backed by a JSON manifest listing every known class and how long it takes to
/// "load". Useful for demos and tests that want realistic latency without real assets.
pub struct ManifestClassSource {
    entries: HashMap<WidgetClassPath, ManifestEntry>,
}

impl ManifestClassSource {
    pub fn new(manifest: ManifestClassesJson) -> Self {
        let mut entries = HashMap::default();
        for class_json in manifest.classes {
            let class = WidgetClass::new(
                class_json.path.clone(),
                class_json.debug_name.map(Arc::new),
            );
            let old = entries.insert(
                class_json.path,
                ManifestEntry {
                    class: Arc::new(class),
                    simulated_load_time: Duration::from_millis(class_json.simulated_load_ms),
                },
            );
            if let Some(old) = old {
                log::warn!(
                    "Widget class {} is listed more than once in the manifest",
                    old.class.path()
                );
            }
        }

        ManifestClassSource { entries }
    }

    pub fn from_json_str(json: &str) -> WidgetLoaderResult<Self> {
        let manifest: ManifestClassesJson = serde_json::from_str(json)?;
        Ok(Self::new(manifest))
    }

    pub fn read_from_path(path: &Path) -> WidgetLoaderResult<Self> {
        log::info!("Reading widget class manifest from {:?}", path);
        let file_contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&file_contents)
    }

    /// Every class in the manifest, sorted.
    pub fn class_paths(&self) -> Vec<WidgetClassPath> {
        let mut class_paths: Vec<_> = self.entries.keys().cloned().collect();
        class_paths.sort();
        class_paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WidgetClassSource for ManifestClassSource {
    fn load_class(
        &self,
        class_path: &WidgetClassPath,
    ) -> WidgetLoaderResult<Arc<WidgetClass>> {
        let entry = self
            .entries
            .get(class_path)
            .ok_or_else(|| WidgetLoaderError::ClassNotFound(class_path.clone()))?;

        if !entry.simulated_load_time.is_zero() {
            profiling::scope!("simulated class load");
            std::thread::sleep(entry.simulated_load_time);
        }

        Ok(entry.class.clone())
    }
}
