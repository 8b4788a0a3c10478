use folio_plate_core::{ApplyError, Node, Selection, replace_selection_with};

use crate::task::Trigger;
use crate::view::DocumentView;

/// Replaces `target` with an image pointing at `url`, as one transaction.
///
/// The transaction is built from the editor state at call time. `target` was
/// captured before the upload started; it is clamped onto the current
/// document, so edits made in the meantime can move the insertion point but
/// never invalidate it.
pub fn insert_uploaded_image<V: DocumentView>(
    view: &V,
    target: &Selection,
    trigger: Trigger,
    url: &str,
) -> Result<(), ApplyError> {
    view.update(|editor| {
        let resolved = editor.resolve_selection(target);
        let tx = replace_selection_with(editor, &resolved, Node::image(url, None))?
            .source(trigger.source());
        editor.apply(tx)
    })
}
