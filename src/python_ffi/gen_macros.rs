/// Raises library errors in Python as `ValueError` with the error's message.
#[macro_export]
macro_rules! Impl_to_PyErr {
    (for $($t:ty),+) => {
        $(impl From<$t> for PyErr {
            fn from(err: $t) -> Self {
                pyo3::exceptions::PyValueError::new_err(err.to_string())
            }
        }
        )*
    }
}
