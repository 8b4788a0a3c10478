//! Image drop/paste interception for the plate editor.
//!
//! [`ImageUploadInterceptor`] sits on an editing surface. When a drop or
//! paste carries an image as its first file, the event is suppressed, the
//! file goes to a host-supplied [`UploadFn`], and once that resolves the
//! returned URL is inserted as an `image` block in a single transaction.
//! Anything else is left for the surface's default handling.

mod event;
mod executor;
mod file;
mod interceptor;
mod mutation;
pub mod storage;
mod task;
mod upload;
mod view;

pub use event::*;
pub use executor::*;
pub use file::*;
pub use interceptor::*;
pub use mutation::*;
pub use task::*;
pub use upload::*;
pub use view::*;
