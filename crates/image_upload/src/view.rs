use std::cell::RefCell;
use std::rc::Rc;

use folio_plate_core::{Editor, Point, Selection};

use crate::event::Coords;

/// The live editing surface the interceptor reads positions from and
/// dispatches transactions to.
pub trait DocumentView {
    fn selection(&self) -> Selection;

    /// Maps a surface position to a caret position, if it lands on text.
    fn pos_at_coords(&self, coords: Coords) -> Option<Point>;

    /// Runs `f` against the current editor state.
    fn update<R>(&self, f: impl FnOnce(&mut Editor) -> R) -> R;
}

type HitTest = dyn Fn(&Editor, Coords) -> Option<Point>;

/// Single-threaded shared editor. Clones point at the same editor.
///
/// Calls must not nest: `update` takes the editor mutably for its duration.
#[derive(Clone)]
pub struct SharedEditor {
    editor: Rc<RefCell<Editor>>,
    hit_test: Option<Rc<HitTest>>,
}

impl SharedEditor {
    pub fn new(editor: Editor) -> Self {
        Self {
            editor: Rc::new(RefCell::new(editor)),
            hit_test: None,
        }
    }

    /// Installs the layout lookup used to resolve drop coordinates. Without
    /// one, drops land at the current selection.
    pub fn with_hit_test(
        mut self,
        hit_test: impl Fn(&Editor, Coords) -> Option<Point> + 'static,
    ) -> Self {
        self.hit_test = Some(Rc::new(hit_test));
        self
    }

    pub fn read<R>(&self, f: impl FnOnce(&Editor) -> R) -> R {
        f(&self.editor.borrow())
    }
}

impl DocumentView for SharedEditor {
    fn selection(&self) -> Selection {
        self.editor.borrow().selection().clone()
    }

    fn pos_at_coords(&self, coords: Coords) -> Option<Point> {
        let hit_test = self.hit_test.as_ref()?;
        let editor = self.editor.borrow();
        let point = hit_test(&editor, coords)?;
        let resolved = editor.resolve_selection(&Selection::collapsed(point));
        Some(resolved.focus)
    }

    fn update<R>(&self, f: impl FnOnce(&mut Editor) -> R) -> R {
        f(&mut self.editor.borrow_mut())
    }
}
