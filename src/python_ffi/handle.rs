use pyo3::{exceptions::PyRuntimeError, PyErr};

/// Slot for an object that a Python wrapper can hand over to another wrapper,
/// e.g. a network moving into a trainer and back.
pub(crate) struct Handle<T> {
    obj: Option<T>,
    kind: &'static str,
}

fn handed_over(kind: &str) -> PyErr {
    PyRuntimeError::new_err(format!(
        "This {} was handed over to another object and can no longer be used",
        kind
    ))
}

impl<T> Handle<T> {
    pub(crate) fn new(kind: &'static str, obj: T) -> Self {
        Self {
            obj: Some(obj),
            kind,
        }
    }

    pub(crate) fn get(&self) -> Result<&T, PyErr> {
        self.obj.as_ref().ok_or_else(|| handed_over(self.kind))
    }

    pub(crate) fn get_mut(&mut self) -> Result<&mut T, PyErr> {
        let kind = self.kind;
        self.obj.as_mut().ok_or_else(|| handed_over(kind))
    }

    pub(crate) fn take(&mut self) -> Result<T, PyErr> {
        let kind = self.kind;
        self.obj.take().ok_or_else(|| handed_over(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_after_take() {
        let mut handle = Handle::new("Net", vec![1.0, 2.0]);
        assert_eq!(handle.get().map(Vec::len).ok(), Some(2));
        handle.get_mut().map(|v| v.push(3.0)).ok();

        assert_eq!(handle.take().ok(), Some(vec![1.0, 2.0, 3.0]));
        assert!(handle.get().is_err());
        assert!(handle.get_mut().is_err());
        assert!(handle.take().is_err());
    }
}
