pub use kube::api::WatchEvent;

/// One page of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// Version of the collection at the time of the list,
    /// a watch started from it receives every later change.
    pub resource_version: Option<String>,
    /// Number of items not returned in this page,
    /// only reported by the api-server when the list was limited.
    pub remaining_item_count: Option<i64>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>) -> Self {
        ListPage {
            items,
            resource_version: None,
            remaining_item_count: None,
        }
    }
}
