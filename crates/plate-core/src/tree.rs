//! Path addressing and low-level op application.

use crate::editor::ApplyError;
use crate::node::{Document, Node, Point, Selection, TextNode};
use crate::ops::Op;

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = doc.children.get(first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, ApplyError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(ApplyError::InvalidPath("empty path".into()));
    };
    let len = doc.children.len();
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| ApplyError::InvalidPath(format!("{first} >= {len} at depth 0")))?;

    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    ApplyError::InvalidPath(format!("{ix} >= {len} at depth {}", depth + 1))
                })?
            }
            Node::Void(_) | Node::Text(_) => {
                return Err(ApplyError::InvalidPath(format!(
                    "non-container node at depth {depth}"
                )));
            }
        };
    }
    Ok(node)
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, ApplyError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(ApplyError::InvalidPath(format!("{path:?} is not a text leaf"))),
    }
}

fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, ApplyError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Void(_) | Node::Text(_) => Err(ApplyError::InvalidPath(format!(
            "{parent_path:?} is not a container"
        ))),
    }
}

fn split_index(path: &[usize]) -> Result<(&[usize], usize), ApplyError> {
    match path.split_last() {
        Some((&ix, parent)) => Ok((parent, ix)),
        None => Err(ApplyError::InvalidPath("empty path".into())),
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, ix: usize) -> usize {
    let mut ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

/// Applies `op` to `doc`, keeps `selection` pointing at the same content and
/// returns the inverse op.
pub(crate) fn apply_op(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let leaf = text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&leaf.text, offset);
            leaf.text.insert_str(offset, &text);
            shift_points_after_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                range: offset..offset + text.len(),
                path,
            })
        }
        Op::RemoveText { path, range } => {
            let leaf = text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&leaf.text, range.start);
            let end = clamp_to_char_boundary(&leaf.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed: String = leaf.text.drain(start..end).collect();
            shift_points_after_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            let (parent, ix) = split_index(&path)?;
            let children = children_mut(doc, parent)?;
            if ix > children.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "insert index {ix} > {}",
                    children.len()
                )));
            }
            children.insert(ix, node);
            shift_points_after_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let (parent, ix) = split_index(&path)?;
            let children = children_mut(doc, parent)?;
            if ix >= children.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "remove index {ix} >= {}",
                    children.len()
                )));
            }
            let removed = children.remove(ix);
            shift_points_after_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let restore = match node_mut(doc, &path)? {
                Node::Element(el) => patch.apply_to(&mut el.attrs),
                Node::Void(v) => patch.apply_to(&mut v.attrs),
                Node::Text(_) => {
                    return Err(ApplyError::InvalidPath("text leaves carry no attrs".into()));
                }
            };
            Ok(Op::SetNodeAttrs {
                path,
                patch: restore,
            })
        }
        Op::SetTextMarks { path, marks } => {
            let leaf = text_mut(doc, &path)?;
            let old = std::mem::replace(&mut leaf.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

fn points_mut(selection: &mut Selection) -> [&mut Point; 2] {
    [&mut selection.anchor, &mut selection.focus]
}

fn shift_points_after_insert_text(selection: &mut Selection, path: &[usize], at: usize, len: usize) {
    for point in points_mut(selection) {
        if point.path == path && point.offset >= at {
            point.offset += len;
        }
    }
}

fn shift_points_after_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    for point in points_mut(selection) {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        point.offset = if point.offset >= range.end {
            point.offset - range.len()
        } else {
            range.start
        };
    }
}

fn shift_points_after_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&ix, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();
    for point in points_mut(selection) {
        if point.path.len() > depth && point.path.starts_with(parent) && point.path[depth] >= ix {
            point.path[depth] += 1;
        }
    }
}

fn shift_points_after_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after: &Document,
) {
    let Some((&ix, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();

    // A removed text leaf whose content was merged into its left sibling keeps
    // the caret at the same character.
    let merged_prefix = match (removed, ix.checked_sub(1)) {
        (Node::Text(gone), Some(left_ix)) => {
            let mut left_path = parent.to_vec();
            left_path.push(left_ix);
            match node_at_path(doc_after, &left_path) {
                Some(Node::Text(left))
                    if left.marks == gone.marks && left.text.ends_with(&gone.text) =>
                {
                    Some((left_ix, left.text.len() - gone.text.len(), gone.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in points_mut(selection) {
        if point.path.len() <= depth || !point.path.starts_with(parent) {
            continue;
        }
        let at = point.path[depth];
        if at > ix {
            point.path[depth] = at - 1;
            continue;
        }
        if at < ix {
            continue;
        }

        point.path.truncate(depth + 1);
        match merged_prefix {
            Some((left_ix, prefix, len)) => {
                point.path[depth] = left_ix;
                point.offset = prefix + point.offset.min(len);
            }
            None => {
                point.path[depth] = ix.saturating_sub(1);
                point.offset = 0;
            }
        }
    }
}

pub(crate) fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_in(&doc.children)
}

/// First text leaf under `children`, with a path relative to them.
fn first_text_in(children: &[Node]) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            let found = match node {
                Node::Text(_) => Some(Point::new(path.clone(), 0)),
                Node::Element(el) => walk(&el.children, path),
                Node::Void(_) => None,
            };
            path.pop();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    walk(children, &mut Vec::new())
}

/// Maps a possibly stale point onto an existing text leaf by clamping every
/// path index and the offset to what the current document holds.
pub(crate) fn clamp_point_to_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() {
        return None;
    }

    let mut resolved: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;
    for &wanted in &point.path {
        let Some(last) = children.len().checked_sub(1) else {
            break;
        };
        let ix = wanted.min(last);
        resolved.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => return nearest_text_after_void(doc, &resolved),
        }
    }

    match node_at_path(doc, &resolved)? {
        Node::Element(el) => {
            let leaf = first_text_in(&el.children)?;
            resolved.extend(leaf.path);
            Some(Point::new(resolved, 0))
        }
        Node::Text(t) => Some(Point::new(resolved, point.offset.min(t.text.len()))),
        Node::Void(_) => nearest_text_after_void(doc, &resolved),
    }
}

/// A caret can't rest inside a void; use the nearest following text leaf
/// among the void's siblings, else the nearest preceding one.
fn nearest_text_after_void(doc: &Document, void_path: &[usize]) -> Option<Point> {
    let (&ix, parent) = void_path.split_last()?;
    let siblings: &[Node] = if parent.is_empty() {
        &doc.children
    } else {
        match node_at_path(doc, parent)? {
            Node::Element(el) => &el.children,
            _ => return None,
        }
    };

    let leaf_in = |sibling_ix: usize, at_end: bool| -> Option<Point> {
        let mut path = parent.to_vec();
        path.push(sibling_ix);
        match &siblings[sibling_ix] {
            Node::Text(t) => Some(Point::new(path, if at_end { t.text.len() } else { 0 })),
            Node::Element(el) => {
                let leaf = first_text_in(&el.children)?;
                path.extend(leaf.path);
                Some(Point::new(path, 0))
            }
            Node::Void(_) => None,
        }
    };

    (ix + 1..siblings.len())
        .find_map(|i| leaf_in(i, false))
        .or_else(|| (0..ix).rev().find_map(|i| leaf_in(i, true)))
}
