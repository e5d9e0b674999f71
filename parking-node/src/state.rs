use crate::store::SectionMap;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Section store shared by the node runtime and the status publisher.
pub type SharedSections = Shared<SectionMap>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

pub fn new_section_store() -> SharedSections {
    new_state(SectionMap::new())
}
