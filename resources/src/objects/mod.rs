use std::{collections::BTreeMap, fmt::Debug};

use kube::Resource;

pub mod job;

pub type Labels = BTreeMap<String, String>;

/// Objects an informer can track.
pub trait Object: Resource + Clone + Debug + Send + Sync + 'static {}

impl<K: Resource + Clone + Debug + Send + Sync + 'static> Object for K {}
