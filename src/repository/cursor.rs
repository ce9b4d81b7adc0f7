use crate::context::Context;
use crate::store::{Document, DocumentCursor, StoreError};

/// Owns a store cursor and closes it when dropped, whichever way the drain
/// loop exits.
pub(crate) struct CursorGuard<C: DocumentCursor> {
    cursor: C,
}

impl<C: DocumentCursor> CursorGuard<C> {
    pub(crate) fn new(cursor: C) -> Self {
        Self { cursor }
    }

    pub(crate) fn next(&mut self, ctx: &Context) -> Result<Option<Document>, StoreError> {
        self.cursor.next_document(ctx)
    }

    /// Drain the cursor, decoding each document with `decode`. Stops at the
    /// first error.
    pub(crate) fn collect<T>(
        mut self,
        ctx: &Context,
        mut decode: impl FnMut(Document) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        while let Some(document) = self.next(ctx)? {
            items.push(decode(document)?);
        }
        Ok(items)
    }
}

impl<C: DocumentCursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        self.cursor.close();
    }
}
