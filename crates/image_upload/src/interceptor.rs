use std::cell::Cell;
use std::rc::Rc;

use folio_plate_core::Selection;
use futures::FutureExt as _;

use crate::event::{Coords, DropEvent, EventFlags, PasteEvent};
use crate::executor::LocalExecutor;
use crate::file::{FileBlob, FileList};
use crate::mutation::insert_uploaded_image;
use crate::task::{TaskId, Trigger, UploadTask};
use crate::upload::UploadFn;
use crate::view::DocumentView;

/// Where an intercepted event wants its image.
#[derive(Debug, Clone, Copy)]
enum CaptureAt {
    Coords(Coords),
    Selection,
}

/// Turns image drops and pastes on an editing surface into uploads followed
/// by an image insertion.
///
/// Handlers classify and suppress synchronously and return at once; the
/// upload and the insertion run later on `executor`.
pub struct ImageUploadInterceptor<V, E> {
    view: V,
    upload: Rc<dyn UploadFn>,
    executor: E,
    next_id: Cell<u64>,
    in_flight: Rc<Cell<usize>>,
}

impl<V, E> ImageUploadInterceptor<V, E>
where
    V: DocumentView + Clone + 'static,
    E: LocalExecutor,
{
    pub fn new(view: V, upload: impl UploadFn + 'static, executor: E) -> Self {
        Self {
            view,
            upload: Rc::new(upload),
            executor,
            next_id: Cell::new(1),
            in_flight: Rc::new(Cell::new(0)),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Uploads started but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    pub fn on_drop(&self, event: &mut DropEvent) -> bool {
        let at = CaptureAt::Coords(event.coords());
        let files = event.files().clone();
        self.try_handle_image_files(&files, at, Trigger::Drop, &mut event.flags)
    }

    pub fn on_paste(&self, event: &mut PasteEvent) -> bool {
        let files = event.files().clone();
        self.try_handle_image_files(&files, CaptureAt::Selection, Trigger::Paste, &mut event.flags)
    }

    fn try_handle_image_files(
        &self,
        files: &FileList,
        at: CaptureAt,
        trigger: Trigger,
        flags: &mut EventFlags,
    ) -> bool {
        let Some(file) = files.first() else {
            return false;
        };
        if !file.is_image() {
            tracing::debug!(%trigger, mime = file.mime(), "not an image; leaving event alone");
            return false;
        }
        if files.len() > 1 {
            tracing::debug!(%trigger, ignored = files.len() - 1, "only the first file is uploaded");
        }

        let target = self.capture_target(at);
        let task = UploadTask::new(self.next_task_id(), file, trigger, target);
        let task_id = task.id();

        self.in_flight.set(self.in_flight.get() + 1);
        let run = run_upload(
            task,
            file.clone(),
            self.upload.clone(),
            self.view.clone(),
            self.in_flight.clone(),
        );
        if let Err(err) = self.executor.spawn_local(run.boxed_local()) {
            self.in_flight.set(self.in_flight.get().saturating_sub(1));
            tracing::error!(task_id = %task_id, %trigger, error = %err, "executor is shut down; image upload not started");
            return false;
        }

        flags.prevent_default();
        flags.stop_propagation();
        tracing::debug!(task_id = %task_id, %trigger, file = file.name(), "image upload started");
        true
    }

    fn capture_target(&self, at: CaptureAt) -> Selection {
        match at {
            CaptureAt::Coords(coords) => self
                .view
                .pos_at_coords(coords)
                .map(Selection::collapsed)
                .unwrap_or_else(|| self.view.selection()),
            CaptureAt::Selection => self.view.selection(),
        }
    }

    fn next_task_id(&self) -> TaskId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        TaskId(id)
    }
}

async fn run_upload<V: DocumentView>(
    mut task: UploadTask,
    file: FileBlob,
    upload: Rc<dyn UploadFn>,
    view: V,
    in_flight: Rc<Cell<usize>>,
) {
    let outcome = upload.upload(file).await;
    in_flight.set(in_flight.get().saturating_sub(1));

    let Some(url) = task.settle(outcome) else {
        return;
    };
    match insert_uploaded_image(&view, task.target(), task.trigger(), &url) {
        Ok(()) => tracing::info!(task_id = %task.id(), %url, "uploaded image inserted"),
        Err(err) => tracing::error!(task_id = %task.id(), error = %err, "uploaded image could not be inserted"),
    }
}
