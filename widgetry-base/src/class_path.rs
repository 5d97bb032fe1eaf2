use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// The stable identity of a widget class, e.g. `/Game/UI/Inventory.Inventory_C`.
///
/// Pools and loads are keyed by this path rather than by a loaded class so that a class can be
/// referred to before it is resident in memory. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct WidgetClassPath(Arc<str>);

impl WidgetClassPath {
    pub fn new(path: &str) -> Self {
        WidgetClassPath(Arc::from(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WidgetClassPath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("WidgetClassPath").field(&&*self.0).finish()
    }
}

impl fmt::Display for WidgetClassPath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetClassPath {
    fn from(path: &str) -> Self {
        WidgetClassPath::new(path)
    }
}

impl From<String> for WidgetClassPath {
    fn from(path: String) -> Self {
        WidgetClassPath(Arc::from(path))
    }
}

impl Serialize for WidgetClassPath {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct WidgetClassPathVisitor;

impl<'a> Visitor<'a> for WidgetClassPathVisitor {
    type Value = WidgetClassPath;

    fn expecting(
        &self,
        fmt: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(fmt, "a non-empty widget class path")
    }

    fn visit_str<E: de::Error>(
        self,
        s: &str,
    ) -> Result<Self::Value, E> {
        if s.is_empty() {
            Err(de::Error::invalid_value(de::Unexpected::Str(s), &self))
        } else {
            Ok(WidgetClassPath::new(s))
        }
    }
}

impl<'de> Deserialize<'de> for WidgetClassPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(WidgetClassPathVisitor)
    }
}

/// A possibly-unset, possibly-unloaded reference to a widget class.
///
/// Holding one says nothing about whether the class is resident; ask the loader. A null reference
/// (no path, or an empty path) is never valid for a request.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct WidgetClassRef {
    path: Option<WidgetClassPath>,
}

impl WidgetClassRef {
    pub fn new(path: impl Into<WidgetClassPath>) -> Self {
        let path = path.into();
        if path.as_str().is_empty() {
            return Self::null();
        }

        WidgetClassRef { path: Some(path) }
    }

    pub fn null() -> Self {
        WidgetClassRef { path: None }
    }

    pub fn is_null(&self) -> bool {
        self.path.is_none()
    }

    pub fn path(&self) -> Option<&WidgetClassPath> {
        self.path.as_ref()
    }
}

impl fmt::Debug for WidgetClassRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "WidgetClassRef({})", path),
            None => write!(f, "WidgetClassRef(null)"),
        }
    }
}

impl From<WidgetClassPath> for WidgetClassRef {
    fn from(path: WidgetClassPath) -> Self {
        WidgetClassRef::new(path)
    }
}

impl From<&str> for WidgetClassRef {
    fn from(path: &str) -> Self {
        WidgetClassRef::new(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_path_is_null_ref() {
        assert!(WidgetClassRef::new("").is_null());
        assert!(WidgetClassRef::null().is_null());
        assert!(WidgetClassRef::default().is_null());

        let class_ref = WidgetClassRef::new("/Game/UI/Foo.Foo_C");
        assert!(!class_ref.is_null());
        assert_eq!(class_ref.path().unwrap().as_str(), "/Game/UI/Foo.Foo_C");
    }

    #[test]
    fn paths_compare_by_value() {
        let a = WidgetClassPath::new("/Game/UI/Foo.Foo_C");
        let b: WidgetClassPath = String::from("/Game/UI/Foo.Foo_C").into();
        assert_eq!(a, b);
        assert_ne!(a, WidgetClassPath::new("/Game/UI/Bar.Bar_C"));
    }
}
