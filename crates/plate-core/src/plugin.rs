use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::edit;
use crate::node::{
    Attrs, DIVIDER, Document, ElementNode, HEADING, IMAGE, Node, PARAGRAPH, Point,
    Selection,
};
use crate::ops::{AttrPatch, Op};
use crate::tree::{clamp_point_to_text, first_text_point, node_at_path};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

type CommandHandler =
    dyn Fn(&mut crate::Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync;
type QueryHandler = dyn Fn(&crate::Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: Arc<CommandHandler>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut crate::Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: Arc<QueryHandler>,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&crate::Editor, Option<Value>) -> Result<Value, QueryError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    fn text_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }
    }

    fn void_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate node kind `{0}`")]
    DuplicateKind(String),
    #[error("duplicate command `{0}`")]
    DuplicateCommand(String),
    #[error("duplicate query `{0}`")]
    DuplicateQuery(String),
}

#[derive(Default)]
pub struct PluginRegistry {
    plugin_ids: Vec<&'static str>,
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    fn core_plugins() -> Vec<Box<dyn PlatePlugin>> {
        vec![
            Box::new(ParagraphPlugin),
            Box::new(DividerPlugin),
            Box::new(CoreNormalizePlugin),
        ]
    }

    /// Paragraphs, dividers and the structural normalizers.
    pub fn core() -> Self {
        Self::from_builtin(Self::core_plugins())
    }

    /// The blog editor set: core plus headings and images.
    pub fn richtext() -> Self {
        let mut plugins = Self::core_plugins();
        plugins.push(Box::new(HeadingPlugin));
        plugins.push(Box::new(ImagePlugin));
        Self::from_builtin(plugins)
    }

    fn from_builtin(plugins: Vec<Box<dyn PlatePlugin>>) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            let id = plugin.id();
            if let Err(err) = registry.register_plugin(plugin) {
                // Builtin sets never collide; a collision means a plugin was
                // edited without updating the others.
                debug_assert!(false, "builtin plugin `{id}` rejected: {err}");
                tracing::error!(plugin = id, error = %err, "builtin plugin rejected");
            }
        }
        registry
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), RegistryError> {
        let specs = plugin.node_specs();
        let commands = plugin.commands();
        let queries = plugin.queries();

        if let Some(spec) = specs.iter().find(|s| self.node_specs.contains_key(&s.kind)) {
            return Err(RegistryError::DuplicateKind(spec.kind.clone()));
        }
        if let Some(cmd) = commands.iter().find(|c| self.commands.contains_key(&c.id)) {
            return Err(RegistryError::DuplicateCommand(cmd.id.clone()));
        }
        if let Some(query) = queries.iter().find(|q| self.queries.contains_key(&q.id)) {
            return Err(RegistryError::DuplicateQuery(query.id.clone()));
        }

        self.node_specs
            .extend(specs.into_iter().map(|s| (s.kind.clone(), s)));
        self.normalize_passes.extend(plugin.normalize_passes());
        self.commands
            .extend(commands.into_iter().map(|c| (c.id.clone(), c)));
        self.queries
            .extend(queries.into_iter().map(|q| (q.id.clone(), q)));
        self.plugin_ids.push(plugin.id());
        Ok(())
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    /// Whether `el` holds inline content (text leaves and inline voids).
    pub fn is_text_block(&self, el: &ElementNode) -> bool {
        match self.node_specs.get(&el.kind) {
            Some(spec) => spec.children == ChildConstraint::InlineOnly,
            None => el.children.iter().any(|n| matches!(n, Node::Text(_))),
        }
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        self.normalize_passes
            .iter()
            .flat_map(|pass| pass.run(doc, self))
            .collect()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or_else(|| Point::new(vec![0], 0));
        let anchor = clamp_point_to_text(doc, &selection.anchor)
            .or_else(|| clamp_point_to_text(doc, &selection.focus))
            .unwrap_or(fallback);
        let focus = clamp_point_to_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());
        Selection { anchor, focus }
    }
}

fn path_with(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Visits every element with its path, depth first.
fn for_each_element(doc: &Document, mut visit: impl FnMut(&ElementNode, &[usize])) {
    fn walk(
        children: &[Node],
        path: &mut Vec<usize>,
        visit: &mut dyn FnMut(&ElementNode, &[usize]),
    ) {
        for (ix, node) in children.iter().enumerate() {
            if let Node::Element(el) = node {
                path.push(ix);
                visit(el, path);
                walk(&el.children, path, visit);
                path.pop();
            }
        }
    }
    walk(&doc.children, &mut Vec::new(), &mut visit);
}

struct ParagraphPlugin;

impl PlatePlugin for ParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(PARAGRAPH)]
    }
}

struct DividerPlugin;

impl PlatePlugin for DividerPlugin {
    fn id(&self) -> &'static str {
        "core.divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block(DIVIDER)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_divider", "Insert divider", |editor, _args| {
                let tx = edit::insert_block_after_focus(editor, Node::divider())
                    .source("command:core.insert_divider");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert divider: {e}")))
            })
            .description("Insert a divider block and a trailing paragraph.")
            .keywords(["divider", "separator", "hr"]),
        ]
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextBlockHasLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if !doc.children.is_empty() {
            return Vec::new();
        }
        vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        }]
    }
}

struct EnsureTextBlockHasLeaf;

impl NormalizePass for EnsureTextBlockHasLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_block_has_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_element(doc, |el, path| {
            let has_leaf = el.children.iter().any(|n| matches!(n, Node::Text(_)));
            if !has_leaf && registry.is_text_block(el) {
                ops.push(Op::InsertNode {
                    path: path_with(path, 0),
                    node: Node::text(""),
                });
            }
        });
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_element(doc, |el, path| {
            if !registry.is_text_block(el) {
                return;
            }
            // Walk runs right to left so earlier indices stay valid.
            let mut end = el.children.len();
            while end > 0 {
                let Node::Text(last) = &el.children[end - 1] else {
                    end -= 1;
                    continue;
                };
                let mut start = end - 1;
                while start > 0
                    && matches!(&el.children[start - 1], Node::Text(t) if t.marks == last.marks)
                {
                    start -= 1;
                }
                if end - start >= 2
                    && let Node::Text(first) = &el.children[start]
                {
                    let appended: String =
                        el.children[start + 1..end].iter().map(Node::plain_text).collect();
                    if !appended.is_empty() {
                        ops.push(Op::InsertText {
                            path: path_with(path, start),
                            offset: first.text.len(),
                            text: appended,
                        });
                    }
                    for ix in (start + 1..end).rev() {
                        ops.push(Op::RemoveNode {
                            path: path_with(path, ix),
                        });
                    }
                }
                end = start;
            }
        });
        ops
    }
}

struct HeadingPlugin;

impl PlatePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(HEADING)]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(ClampHeadingLevels)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("heading.set", "Set heading", |editor, args| {
                let level = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                let tx = edit::retag_focus_block(editor, HEADING, Some(level))
                    .map_err(CommandError::new)?;
                if tx.is_empty() {
                    return Ok(());
                }
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to set heading: {e}")))
            })
            .description("Turn the focused text block into a heading.")
            .keywords(["heading", "title", "h1", "h2", "h3"])
            .args_example(serde_json::json!({ "level": 2 })),
            CommandSpec::new("heading.unset", "Unset heading", |editor, _args| {
                let tx = edit::retag_focus_block(editor, PARAGRAPH, None)
                    .map_err(CommandError::new)?;
                if tx.is_empty() {
                    return Ok(());
                }
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to unset heading: {e}")))
            })
            .description("Turn the focused heading back into a paragraph.")
            .keywords(["heading", "paragraph"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("heading.level", |editor, _args| {
            let block = editor.selection().focus.block_path().to_vec();
            let level = match node_at_path(editor.doc(), &block) {
                Some(Node::Element(el)) if el.kind == HEADING => {
                    el.attrs.get("level").cloned().unwrap_or(Value::Null)
                }
                _ => Value::Null,
            };
            Ok(level)
        })]
    }
}

struct ClampHeadingLevels;

impl NormalizePass for ClampHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.clamp_levels"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_element(doc, |el, path| {
            if el.kind != HEADING {
                return;
            }
            let current = el.attrs.get("level").and_then(Value::as_u64);
            let clamped = current.unwrap_or(1).clamp(1, 6);
            if current != Some(clamped) {
                let mut set = Attrs::default();
                set.insert("level".to_string(), Value::from(clamped));
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch {
                        set,
                        remove: Vec::new(),
                    },
                });
            }
        });
        ops
    }
}

struct ImagePlugin;

impl PlatePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block(IMAGE)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert", "Insert image", |editor, args| {
                let src = string_arg(args.as_ref(), "src")
                    .ok_or_else(|| CommandError::new("Missing args.src"))?;
                let alt = string_arg(args.as_ref(), "alt");
                let tx = edit::insert_block_after_focus(editor, Node::image(src, alt))
                    .source("command:image.insert");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert image: {e}")))
            })
            .description("Insert an image block after the focused block.")
            .keywords(["image", "img", "media"])
            .args_example(serde_json::json!({ "src": "https://example.com/cover.png", "alt": "Cover" })),
            CommandSpec::new("image.insert_many", "Insert images", |editor, args| {
                let srcs: Vec<String> = args
                    .as_ref()
                    .and_then(|v| v.get("srcs"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| CommandError::new("Missing args.srcs (array)"))?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if srcs.is_empty() {
                    return Err(CommandError::new("No valid srcs"));
                }
                let nodes = srcs.into_iter().map(|src| Node::image(src, None)).collect();
                let tx = edit::insert_blocks_after_focus(editor, nodes)
                    .source("command:image.insert_many");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert images: {e}")))
            })
            .description("Insert several image blocks after the focused block.")
            .keywords(["image", "gallery", "multiple"]),
            CommandSpec::new("image.replace_selection", "Replace selection with image", |editor, args| {
                let src = string_arg(args.as_ref(), "src")
                    .ok_or_else(|| CommandError::new("Missing args.src"))?;
                let alt = string_arg(args.as_ref(), "alt");
                let selection = editor.selection().clone();
                let tx = edit::replace_selection_with(editor, &selection, Node::image(src, alt))
                    .map_err(|e| CommandError::new(e.to_string()))?
                    .source("command:image.replace_selection");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert image: {e}")))
            })
            .description("Replace the selection with an image, splitting the text block.")
            .keywords(["image", "paste", "drop"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("image.srcs", |editor, _args| {
            Ok(Value::from(editor.doc().images()))
        })]
    }
}

fn string_arg(args: Option<&Value>, key: &str) -> Option<String> {
    args?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
