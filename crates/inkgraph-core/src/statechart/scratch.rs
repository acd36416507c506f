use std::any::Any;
use std::fmt;

/// Per-state scratch data: at most one value of any type, dropped when the
/// state exits.
#[derive(Default)]
pub struct Scratch(Option<Box<dyn Any + Send>>);

impl fmt::Debug for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scratch").field(&self.0.is_some()).finish()
    }
}

impl Scratch {
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The stored value, if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.as_mut().and_then(|v| v.downcast_mut())
    }

    /// The stored `T`, replacing anything else with `T::default()` first.
    pub fn get_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        if self.get::<T>().is_none() {
            self.0 = Some(Box::new(T::default()));
        }
        self.0
            .get_or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .unwrap_or_else(|| unreachable!("scratch value was just set"))
    }

    pub fn set<T: Any + Send>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        match self.0.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.0 = Some(other);
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut scratch = Scratch::default();
        assert!(scratch.is_empty());
        *scratch.get_or_default::<u32>() += 2;
        assert_eq!(scratch.get::<u32>(), Some(&2));
        assert_eq!(scratch.get::<String>(), None);
        assert_eq!(scratch.take::<String>(), None);
        assert_eq!(scratch.take::<u32>(), Some(2));
        assert!(scratch.is_empty());
    }
}
