use std::any::Any;
use std::collections::HashMap;

/// Key under which the parser stores the [`HttpRequest`](crate::message::HttpRequest).
pub const HTTP_REQUEST: &str = "HTTP_REQUEST";
/// Key under which the parser stores the [`HttpResponse`](crate::message::HttpResponse).
pub const HTTP_RESPONSE: &str = "HTTP_RESPONSE";

/// Per-connection bag handed from handler to handler.
///
/// Keys are write-once: [`insert`](Self::insert) refuses to overwrite. A handler
/// that needs a value and its neighbour mutably at the same time moves it out
/// with [`take`](Self::take) and puts it back with [`restore`](Self::restore).
#[derive(Default)]
pub struct SharedRequestState {
    values: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl SharedRequestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns `false` and drops `value` if the key is taken.
    pub fn insert<T: Any + Send>(&mut self, key: &'static str, value: T) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key, Box::new(value));
        true
    }

    /// Put back a value previously moved out with [`take`](Self::take).
    pub fn restore<T: Any + Send>(&mut self, key: &'static str, value: T) {
        self.values.insert(key, Box::new(value));
    }

    pub fn get<T: Any + Send>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any + Send>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Move the value out. A value of another type is left in place.
    pub fn take<T: Any + Send>(&mut self, key: &'static str) -> Option<T> {
        let boxed = self.values.remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.values.insert(key, other);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl std::fmt::Debug for SharedRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRequestState")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
