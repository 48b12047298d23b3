/// Receives every record the reader delivers, in file-then-offset order.
///
/// The callback runs synchronously inside the reader's loop: a slow callback throttles reading,
/// but never the writer. It should return quickly, or hand the record off elsewhere.
pub trait RecordCallback<R>: Send + 'static {
    fn call(&mut self, record: R);
}

impl<R, F> RecordCallback<R> for F
where
    F: FnMut(R) + Send + 'static,
{
    #[inline]
    fn call(&mut self, record: R) {
        self(record)
    }
}
