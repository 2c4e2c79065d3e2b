use kube::ResourceExt;

use crate::objects::Labels;

/// Whether every pair of `selector` is present in `labels`.
pub fn selector_match(selector: &Labels, labels: &Labels) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key.as_str()) == Some(value))
}

/// Store key of an object, `namespace/name`.
pub fn object_key<K: ResourceExt>(object: &K) -> String {
    match object.namespace() {
        Some(namespace) => format!("{}/{}", namespace, object.name_any()),
        None => object.name_any(),
    }
}
