//! Transaction builders shared by commands and by hosts that mutate the
//! document directly.

use crate::editor::{ApplyError, Editor};
use crate::node::{ElementNode, HEADING, Node, Point, Selection, TextNode};
use crate::ops::{Op, Transaction};
use crate::tree::{clamp_to_char_boundary, node_at_path};

fn path_with(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Parent path and insertion index right after the focused block.
fn slot_after_focus(editor: &Editor) -> (Vec<usize>, usize) {
    match editor.selection().focus.block_path().split_last() {
        Some((&block_ix, parent)) => (parent.to_vec(), block_ix + 1),
        None => (Vec::new(), editor.doc().children.len()),
    }
}

/// Inserts `block` after the focused block, followed by an empty paragraph
/// that receives the caret.
pub fn insert_block_after_focus(editor: &Editor, block: Node) -> Transaction {
    insert_blocks_after_focus(editor, vec![block])
}

pub fn insert_blocks_after_focus(editor: &Editor, blocks: Vec<Node>) -> Transaction {
    let (parent, at) = slot_after_focus(editor);
    let count = blocks.len();

    let mut ops: Vec<Op> = blocks
        .into_iter()
        .enumerate()
        .map(|(i, node)| Op::InsertNode {
            path: path_with(&parent, at + i),
            node,
        })
        .collect();
    let paragraph_path = path_with(&parent, at + count);
    ops.push(Op::InsertNode {
        path: paragraph_path.clone(),
        node: Node::paragraph(""),
    });

    Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(path_with(&paragraph_path, 0), 0)))
}

/// Rewrites the focused text block as `kind`, keeping its inline content.
/// Returns an empty transaction when nothing would change.
pub fn retag_focus_block(
    editor: &Editor,
    kind: &str,
    level: Option<u64>,
) -> Result<Transaction, String> {
    let block_path = editor.selection().focus.block_path().to_vec();
    let Some(Node::Element(el)) = node_at_path(editor.doc(), &block_path) else {
        return Err("No active text block".into());
    };
    if !editor.registry().is_text_block(el) {
        return Err("Active block is not a text block".into());
    }

    let level = level.map(|l| l.clamp(1, 6));
    let current_level = el.attrs.get("level").and_then(|v| v.as_u64());
    if el.kind == kind && (kind != HEADING || current_level == level) {
        return Ok(Transaction::default());
    }

    let mut attrs = el.attrs.clone();
    match level {
        Some(level) if kind == HEADING => {
            attrs.insert("level".to_string(), serde_json::Value::from(level));
        }
        _ => {
            attrs.remove("level");
        }
    }
    let next = Node::Element(ElementNode {
        kind: kind.to_string(),
        attrs,
        children: el.children.clone(),
    });

    Ok(Transaction::new(vec![
        Op::RemoveNode {
            path: block_path.clone(),
        },
        Op::InsertNode {
            path: block_path,
            node: next,
        },
    ])
    .selection_after(editor.selection().clone())
    .source(format!("command:retag:{kind}")))
}

/// Inline content of a text block before the point at (`leaf`, `offset`).
fn inline_before(children: &[Node], leaf: usize, offset: usize) -> Vec<Node> {
    let mut head: Vec<Node> = children.iter().take(leaf).cloned().collect();
    match children.get(leaf) {
        Some(Node::Text(t)) => {
            let cut = clamp_to_char_boundary(&t.text, offset);
            if cut > 0 {
                head.push(Node::Text(TextNode {
                    text: t.text[..cut].to_string(),
                    marks: t.marks.clone(),
                }));
            }
        }
        Some(other) if offset > 0 => head.push(other.clone()),
        _ => {}
    }
    head
}

/// Inline content of a text block after the point at (`leaf`, `offset`).
fn inline_after(children: &[Node], leaf: usize, offset: usize) -> Vec<Node> {
    let mut tail = Vec::new();
    match children.get(leaf) {
        Some(Node::Text(t)) => {
            let cut = clamp_to_char_boundary(&t.text, offset);
            if cut < t.text.len() {
                tail.push(Node::Text(TextNode {
                    text: t.text[cut..].to_string(),
                    marks: t.marks.clone(),
                }));
            }
        }
        Some(other) if offset == 0 => tail.push(other.clone()),
        _ => {}
    }
    tail.extend(children.iter().skip(leaf + 1).cloned());
    tail
}

fn has_content(inlines: &[Node]) -> bool {
    inlines.iter().any(|n| match n {
        Node::Text(t) => !t.text.is_empty(),
        _ => true,
    })
}

fn text_block_at<'a>(editor: &'a Editor, point: &Point) -> Option<&'a ElementNode> {
    match node_at_path(editor.doc(), point.block_path())? {
        Node::Element(el) if editor.registry().is_text_block(el) => Some(el),
        _ => None,
    }
}

/// Places `block` and an empty paragraph after the top-level block `point`
/// starts in, or at the end of the document.
fn insert_after_top_level(editor: &Editor, point: &Point, block: Node) -> Transaction {
    let len = editor.doc().children.len();
    let at = point.path.first().map_or(len, |&ix| (ix + 1).min(len));
    let trailing_path = vec![at + 1];
    let caret = Point::new(path_with(&trailing_path, 0), 0);
    Transaction::new(vec![
        Op::InsertNode {
            path: vec![at],
            node: block,
        },
        Op::InsertNode {
            path: trailing_path,
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(caret))
}

/// Builds one transaction that deletes the content covered by `target` and
/// puts `block` in its place.
///
/// The text block around the insertion point is split: content before the
/// range stays in a leading block of the original kind (dropped if empty),
/// `block` follows, then a trailing block holds whatever came after the range
/// and receives the caret. A range whose ends sit under different parents is
/// treated as collapsed at its start.
///
/// When `target` is not inside a text block (the document holds only voids),
/// `block` and an empty paragraph go after the top-level block it points at.
///
/// `target` must already be resolved against the current document (see
/// [`Editor::resolve_selection`]).
pub fn replace_selection_with(
    editor: &Editor,
    target: &Selection,
    block: Node,
) -> Result<Transaction, ApplyError> {
    let (start, mut end) = target.ordered();
    let (Some((&start_ix, parent)), Some(start_leaf), Some(start_block)) = (
        start.block_path().split_last(),
        start.leaf_index(),
        text_block_at(editor, &start),
    ) else {
        return Ok(insert_after_top_level(editor, &start, block));
    };
    let same_parent = end.block_path().split_last().map(|(_, p)| p) == Some(parent);
    if !same_parent || text_block_at(editor, &end).is_none() {
        end = start.clone();
    }
    let (Some(&end_ix), Some(end_leaf), Some(end_block)) = (
        end.block_path().last(),
        end.leaf_index(),
        text_block_at(editor, &end),
    ) else {
        return Ok(insert_after_top_level(editor, &start, block));
    };

    let head = inline_before(&start_block.children, start_leaf, start.offset);
    let tail = inline_after(&end_block.children, end_leaf, end.offset);

    let mut ops: Vec<Op> = (start_ix..=end_ix)
        .map(|_| Op::RemoveNode {
            path: path_with(parent, start_ix),
        })
        .collect();

    let mut at = start_ix;
    if has_content(&head) {
        ops.push(Op::InsertNode {
            path: path_with(parent, at),
            node: Node::Element(ElementNode {
                kind: start_block.kind.clone(),
                attrs: start_block.attrs.clone(),
                children: head,
            }),
        });
        at += 1;
    }

    ops.push(Op::InsertNode {
        path: path_with(parent, at),
        node: block,
    });
    at += 1;

    let trailing = if has_content(&tail) {
        Node::Element(ElementNode {
            kind: end_block.kind.clone(),
            attrs: end_block.attrs.clone(),
            children: tail,
        })
    } else {
        Node::paragraph("")
    };
    let trailing_path = path_with(parent, at);
    ops.push(Op::InsertNode {
        path: trailing_path.clone(),
        node: trailing,
    });

    let caret = Point::new(path_with(&trailing_path, 0), 0);
    Ok(Transaction::new(ops).selection_after(Selection::collapsed(caret)))
}

