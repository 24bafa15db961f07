use std::fmt;

/// Raw request data that has not been through the contract checks yet.
///
/// The gate wraps every value it reads from a [`Transport`](crate::web::Transport)
/// in `Tainted<T>`. Only crate-internal validation code can take the value back
/// out, and the only thing it hands onward is a [`Verified<T>`](crate::Verified).
///
/// # Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - `Debug` reports the shape of the value, never its content, so raw client
///   input cannot leak into logs
///
/// # Examples
///
/// ```
/// use contract_core::Tainted;
///
/// let raw = Tainted::new("id=5; DROP TABLE items".to_string());
/// assert_eq!(format!("{:?}", raw), "Tainted(<redacted>)");
/// ```
#[derive(Clone)]
pub struct Tainted<T> {
    // Must stay private; the caster and payload validators are the only readers.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps a value read from the transport.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for validation.
    ///
    /// `pub(crate)`: only the caster and payload validators may unwrap, and they
    /// must only pass the result on as `Verified<T>` after their checks pass.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }

    /// Borrows the inner value for validation. Same visibility rule as `into_inner`.
    pub(crate) fn peek(&self) -> &T {
        &self.inner
    }

    /// Maps the wrapped value without exposing it.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tainted<U> {
        Tainted::new(f(self.inner))
    }
}

// Do NOT add Deref, AsRef, Borrow, From<T> or Into<T>: handlers must only ever
// see values that went through the checks.

impl<T> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tainted(<redacted>)")
    }
}
