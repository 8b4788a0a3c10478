mod edit;
mod editor;
mod node;
mod ops;
mod plugin;
mod tree;
mod value;

pub use crate::edit::*;
pub use crate::editor::*;
pub use crate::node::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::tree::node_at_path;
pub use crate::value::*;
