use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed registry of shared services.
///
/// Extensions register services during start-up and receive the completed
/// collection in `register_routes`. One instance per type: registering the
/// same type twice replaces the earlier value.
///
/// Keys are `TypeId`s as compiled into the caller. A dynamically loaded
/// extension carries its own copy of every type it uses, so it only finds
/// services whose type it registered itself; looking up a type registered
/// by another binary (or by the host) returns `None`.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service`, returning the value it replaced, if any.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) -> Option<Arc<T>> {
        self.services
            .insert(TypeId::of::<T>(), Arc::new(service))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Look up the service registered for `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("len", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(String);

    #[test]
    fn test_insert_and_get() {
        let mut services = ServiceCollection::new();
        assert!(services.is_empty());

        services.insert(Greeting("hi".into()));
        assert!(services.contains::<Greeting>());
        assert_eq!(services.len(), 1);
        assert_eq!(*services.get::<Greeting>().unwrap(), Greeting("hi".into()));
    }

    #[test]
    fn test_insert_replaces_previous() {
        let mut services = ServiceCollection::new();
        assert!(services.insert(Greeting("first".into())).is_none());

        let previous = services.insert(Greeting("second".into())).unwrap();
        assert_eq!(*previous, Greeting("first".into()));
        assert_eq!(*services.get::<Greeting>().unwrap(), Greeting("second".into()));
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_get_unregistered_type() {
        let services = ServiceCollection::new();
        assert!(services.get::<Greeting>().is_none());
        assert!(!services.contains::<u32>());
    }
}
