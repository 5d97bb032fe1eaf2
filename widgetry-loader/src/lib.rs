mod class_loader;
pub use class_loader::{ClassLoadHandle, ClassLoader, LoadCompletion, LoaderEvent};

mod class_source;
pub use class_source::{
    ManifestClassJson, ManifestClassSource, ManifestClassesJson, WidgetClassSource,
};

mod config;
pub use config::{WidgetLoaderConfig, WidgetLoaderConfigJson};

mod coordinator;
pub use coordinator::{CancelOutcome, LoadCoordinator, RequestOptions};

mod delayed_release;
pub use delayed_release::{DelayedRelease, DelayedReleaseQueue};

mod error;
pub use error::{WidgetLoaderError, WidgetLoaderResult};

mod factory;
pub use factory::{WidgetFactory, WidgetFactoryRegistry};

mod pool;
pub use pool::{ClassPool, PoolStats, ReleaseResult};

mod pool_manager;
pub use pool_manager::WidgetPoolManager;

mod pool_registry;
pub use pool_registry::PoolRegistry;

mod request;
pub use request::{RequestInfo, RequestStatus, WidgetLoadedCallback};

mod threaded_loader;
pub use threaded_loader::ThreadedClassLoader;
