use std::collections::HashMap;

use serde_json::Value;

/// Mutable storage for the values live during one render.
///
/// The root frame holds the results of setup statements. A second frame
/// holds the body's parameters and locals. Frames are searched innermost
/// first, so a body local shadows a setup value with the same name.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    /// Create a new [`Scope`] with a single root frame.
    #[inline]
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Push a new frame onto the [`Scope`].
    #[inline]
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Assign the value to the given name in the innermost frame.
    #[inline]
    pub fn set<S>(&mut self, key: S, value: Value)
    where
        S: Into<String>,
    {
        self.frames
            .last_mut()
            .expect("scope always has a root frame")
            .insert(key.into(), value);
    }

    /// Get the [`Value`] of the given name, searching innermost frames
    /// first.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::Scope;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut scope = Scope::new();
        scope.set("one", json!(1));

        assert_eq!(scope.get("one"), Some(&json!(1)));
        assert_eq!(scope.get("two"), None);
    }

    #[test]
    fn test_inner_frame_shadows() {
        let mut scope = Scope::new();
        scope.set("name", json!("root"));
        scope.push();
        scope.set("name", json!("body"));

        assert_eq!(scope.get("name"), Some(&json!("body")));
    }

    #[test]
    fn test_outer_frame_visible() {
        let mut scope = Scope::new();
        scope.set("base", json!("/static"));
        scope.push();

        assert_eq!(scope.get("base"), Some(&json!("/static")));
    }
}
