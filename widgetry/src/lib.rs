#[cfg(feature = "widgetry-base")]
pub use widgetry_base as base;

#[cfg(feature = "widgetry-loader")]
pub use widgetry_loader as loader;
