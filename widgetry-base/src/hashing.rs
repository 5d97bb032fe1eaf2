/// Default hashmap for widgetry. Request and pool lookups are keyed by ids and paths we generate
/// ourselves, so we opt out of the more expensive DoS-resistant hash.
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
/// Default hashset for widgetry.
pub type HashSet<T> = std::collections::HashSet<T, ahash::RandomState>;
