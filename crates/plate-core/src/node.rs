use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ops::Path;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const DIVIDER: &str = "divider";
pub const IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn from_blocks(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Number of `image` voids anywhere in the tree.
    pub fn image_count(&self) -> usize {
        self.images().len()
    }

    /// `src` of every image in document order.
    pub fn images(&self) -> Vec<&str> {
        fn walk<'a>(children: &'a [Node], out: &mut Vec<&'a str>) {
            for node in children {
                match node {
                    Node::Void(v) if v.kind == IMAGE => {
                        if let Some(src) = v.attrs.get("src").and_then(|v| v.as_str()) {
                            out.push(src);
                        }
                    }
                    Node::Element(el) => walk(&el.children, out),
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            kind: PARAGRAPH.to_string(),
            attrs: Attrs::default(),
            children: vec![Node::text(text)],
        })
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), serde_json::json!(level.clamp(1, 6)));
        Node::Element(ElementNode {
            kind: HEADING.to_string(),
            attrs,
            children: vec![Node::text(text)],
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: DIVIDER.to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn image(src: impl Into<String>, alt: Option<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), serde_json::Value::String(src.into()));
        if let Some(alt) = alt {
            attrs.insert("alt".to_string(), serde_json::Value::String(alt));
        }
        Node::Void(VoidNode {
            kind: IMAGE.to_string(),
            attrs,
        })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Node::Void(v) if v.kind == IMAGE)
    }

    /// Plain text of the node, voids excluded.
    pub fn plain_text(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(el) => el.children.iter().map(Node::plain_text).collect(),
            Node::Void(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn src(&self) -> Option<&str> {
        self.attrs.get("src").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Path of the block holding this point's leaf.
    pub fn block_path(&self) -> &[usize] {
        self.path.split_last().map(|(_, p)| p).unwrap_or(&[])
    }

    pub fn leaf_index(&self) -> Option<usize> {
        self.path.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order regardless of selection direction.
    pub fn ordered(&self) -> (Point, Point) {
        let (a, f) = (&self.anchor, &self.focus);
        if (f.path.as_slice(), f.offset) < (a.path.as_slice(), a.offset) {
            (f.clone(), a.clone())
        } else {
            (a.clone(), f.clone())
        }
    }
}
