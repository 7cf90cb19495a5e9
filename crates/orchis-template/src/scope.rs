use serde_json::{Map, Value};

/// Root of path resolution.
pub trait Scope {
  /// Value stored under a root key.
  fn get(&self, key: &str) -> Option<&Value>;

  /// Root keys, reported when a root lookup fails.
  fn keys(&self) -> Vec<String>;
}

impl Scope for Map<String, Value> {
  fn get(&self, key: &str) -> Option<&Value> {
    Map::get(self, key)
  }

  fn keys(&self) -> Vec<String> {
    Map::keys(self).cloned().collect()
  }
}

/// A scope with one extra root key layered over a base scope.
///
/// Used for the per-step `iterate` context so that it never has to be written
/// into the shared results registry.
pub struct Overlay<'a, S: Scope + ?Sized> {
  base: &'a S,
  key: &'a str,
  value: &'a Value,
}

impl<'a, S: Scope + ?Sized> Overlay<'a, S> {
  pub fn new(base: &'a S, key: &'a str, value: &'a Value) -> Self {
    Self { base, key, value }
  }
}

impl<S: Scope + ?Sized> Scope for Overlay<'_, S> {
  fn get(&self, key: &str) -> Option<&Value> {
    if key == self.key {
      Some(self.value)
    } else {
      self.base.get(key)
    }
  }

  fn keys(&self) -> Vec<String> {
    let mut keys = self.base.keys();
    if !keys.iter().any(|k| k == self.key) {
      keys.push(self.key.to_string());
    }
    keys
  }
}
