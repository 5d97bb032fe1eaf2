pub mod hashing;
pub mod lru_cache;

#[macro_use]
mod uuid_newtype;

mod request_id;
pub use request_id::RequestId;

mod class_path;
pub use class_path::WidgetClassPath;
pub use class_path::WidgetClassRef;

pub mod widget;
pub use widget::CreationContext;
pub use widget::LoadingPlaceholder;
pub use widget::PlayerId;
pub use widget::Widget;
pub use widget::WidgetClass;
pub use widget::WidgetInstance;
pub use widget::WidgetInstanceId;
pub use widget::WorldId;

pub mod requester;
pub use requester::Requester;
pub use requester::WidgetRequestHandler;

pub mod handle;
pub use handle::ReleaseOp;
pub use handle::WidgetHandle;
