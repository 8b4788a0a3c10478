use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;

use crate::file::FileBlob;

/// Host-supplied transform from a file to the URL it can be displayed from.
///
/// Called at most once per intercepted event. Retries, auth and where the
/// bytes end up are the implementation's business.
#[async_trait(?Send)]
pub trait UploadFn {
    async fn upload(&self, file: FileBlob) -> anyhow::Result<String>;
}

#[async_trait(?Send)]
impl<U: UploadFn + ?Sized> UploadFn for Rc<U> {
    async fn upload(&self, file: FileBlob) -> anyhow::Result<String> {
        (**self).upload(file).await
    }
}

#[async_trait(?Send)]
impl<U: UploadFn + ?Sized> UploadFn for Box<U> {
    async fn upload(&self, file: FileBlob) -> anyhow::Result<String> {
        (**self).upload(file).await
    }
}

/// [`UploadFn`] backed by an async closure.
pub struct FnUploader<F>(F);

pub fn upload_fn<F, Fut>(f: F) -> FnUploader<F>
where
    F: Fn(FileBlob) -> Fut,
    Fut: Future<Output = anyhow::Result<String>> + 'static,
{
    FnUploader(f)
}

#[async_trait(?Send)]
impl<F, Fut> UploadFn for FnUploader<F>
where
    F: Fn(FileBlob) -> Fut,
    Fut: Future<Output = anyhow::Result<String>> + 'static,
{
    async fn upload(&self, file: FileBlob) -> anyhow::Result<String> {
        (self.0)(file).await
    }
}
