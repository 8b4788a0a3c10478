use std::fmt;

use folio_plate_core::Selection;

use crate::file::FileBlob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Drop,
    Paste,
}

impl Trigger {
    /// Transaction source tag for the insertion this trigger leads to.
    pub fn source(self) -> &'static str {
        match self {
            Trigger::Drop => "image_upload:drop",
            Trigger::Paste => "image_upload:paste",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Drop => "drop",
            Trigger::Paste => "paste",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Succeeded(String),
    Failed(String),
}

/// One in-flight upload, from the intercepted event to its single outcome.
#[derive(Debug, Clone)]
pub struct UploadTask {
    id: TaskId,
    file_name: String,
    mime: String,
    trigger: Trigger,
    target: Selection,
    status: UploadStatus,
}

impl UploadTask {
    pub fn new(id: TaskId, file: &FileBlob, trigger: Trigger, target: Selection) -> Self {
        Self {
            id,
            file_name: file.name().to_string(),
            mime: file.mime().to_string(),
            trigger,
            target,
            status: UploadStatus::Pending,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Insertion point captured when the event fired.
    pub fn target(&self) -> &Selection {
        &self.target
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == UploadStatus::Pending
    }

    /// Records the upload outcome. Returns the URL to insert only on the
    /// first successful transition out of `Pending`; later calls are ignored.
    pub fn settle(&mut self, outcome: anyhow::Result<String>) -> Option<String> {
        if !self.is_pending() {
            tracing::warn!(task_id = %self.id, status = ?self.status, "upload task settled twice; ignoring");
            return None;
        }
        match outcome {
            Ok(url) => {
                self.status = UploadStatus::Succeeded(url.clone());
                Some(url)
            }
            Err(err) => {
                tracing::error!(
                    task_id = %self.id,
                    trigger = %self.trigger,
                    file = %self.file_name,
                    error = ?err,
                    "image upload failed"
                );
                self.status = UploadStatus::Failed(format!("{err:#}"));
                None
            }
        }
    }
}
