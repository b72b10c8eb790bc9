//! Process-wide admin root: holds every live device for introspection.
//! Lifecycle is init at module start, teardown at module stop, with
//! deregistration on device destruction.
//!
//! A name-keyed table of every live `Dory` instance, the way a
//! device-mapper target registers each instance with its driver core for
//! the admin/introspection channel to reach.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use spin::{Once, RwLock};

use crate::Dory;

static REGISTRY: Once<RwLock<BTreeMap<String, Arc<Dory>>>> = Once::new();

/// Initialize the registry. Idempotent.
pub fn init() {
    REGISTRY.call_once(|| RwLock::new(BTreeMap::new()));
}

fn table() -> &'static RwLock<BTreeMap<String, Arc<Dory>>> {
    REGISTRY.call_once(|| RwLock::new(BTreeMap::new()))
}

/// Register a device under its configured name. Replaces any prior
/// registration under the same name (a re-`insert` after teardown of a
/// previous instance with the same name, not two live instances
/// colliding — callers are responsible for name uniqueness among
/// concurrently-live devices).
pub fn register(device: Arc<Dory>) {
    let name = String::from(device.config().name());
    table().write().insert(name, device);
}

/// Deregister a device by name on destruction.
pub fn deregister(name: &str) -> Option<Arc<Dory>> {
    table().write().remove(name)
}

/// Look up a live device by name for the admin surface to operate on.
pub fn lookup(name: &str) -> Option<Arc<Dory>> {
    table().read().get(name).cloned()
}

/// Every currently-registered device name, for an admin surface that
/// enumerates live instances.
pub fn names() -> alloc::vec::Vec<String> {
    table().read().keys().cloned().collect()
}
