/// A value that passed its contract checks and is ready to be committed.
///
/// `Verified<T>` is what the gate stages between the checks and the commit
/// step. Commit only accepts `Verified` values, so a raw request value cannot
/// be written back to the transport by accident.
///
/// # Construction Invariants
///
/// There are no public constructors and no `From<T>` implementation.
/// Construction is restricted to the caster and payload validators through
/// `new_unchecked`, which is `pub(crate)`.
///
/// # Examples
///
/// External callers cannot create `Verified<T>` directly:
///
/// ```compile_fail
/// use contract_core::Verified;
///
/// let verified = Verified::new("data".to_string());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Creates a `Verified<T>` without performing validation.
    ///
    /// Callers are responsible for having run every check that applies to the
    /// value first.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the `Verified<T>` and returns the inner value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_as_ref_does_not_consume() {
        let verified = Verified::new_unchecked(vec![1, 2, 3]);

        let ref1 = verified.as_ref();
        let ref2 = verified.as_ref();
        assert_eq!(ref1, ref2);

        assert_eq!(verified.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn verified_derives_work() {
        let v1 = Verified::new_unchecked("data".to_string());
        let v2 = v1.clone();
        assert_eq!(v1, v2);

        let debug_output = format!("{:?}", v1);
        assert!(debug_output.contains("Verified"));
    }
}
