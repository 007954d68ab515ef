//! Flex layout solver: walks a [`Node`](crate::config::Node) tree and a
//! viewport size down to an absolute bounding box per node, per §4.D.
//!
//! Single pass per dimension, container by container: measure fixed sizes
//! and flex weights, distribute remaining (or negative) space, then place
//! children in declaration order. Rounding remainders are absorbed by the
//! leftmost/topmost children so placement is stable and deterministic.

use ratatui::layout::Rect;

use crate::config::{Direction, Node, SizeSpec, MAX_LAYOUT_DEPTH};
use crate::error::LayoutError;
use crate::msg::ComponentId;

/// One resolved node: its assigned box and a deterministic id (generated if
/// the config node didn't declare one).
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: ComponentId,
    pub component_type: Option<String>,
    pub area: Rect,
    pub node: Node,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    /// Depth-first iterator in declaration order — the geometric fallback
    /// order the Focus Manager uses when two boxes share a top-left corner.
    pub fn iter(&self) -> LayoutIter<'_> {
        LayoutIter { stack: vec![self] }
    }
}

pub struct LayoutIter<'a> {
    stack: Vec<&'a LayoutNode>,
}

impl<'a> Iterator for LayoutIter<'a> {
    type Item = &'a LayoutNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Solves the layout tree against `viewport`, assigning a deterministic id
/// to every node (starting the generated counter at 0 and incrementing it
/// once per node that lacks an explicit `id`).
pub fn solve(root: &Node, viewport: Rect) -> Result<LayoutNode, LayoutError> {
    let mut counter = 0u64;
    solve_node(root, viewport, 0, &mut counter)
}

fn solve_node(node: &Node, area: Rect, depth: usize, counter: &mut u64) -> Result<LayoutNode, LayoutError> {
    let id = match &node.id {
        Some(id) => ComponentId::new(id.clone()),
        None => {
            let type_name = node.component_type.as_deref().unwrap_or("container");
            let generated = ComponentId::generated(type_name, *counter);
            *counter += 1;
            generated
        }
    };

    if depth > MAX_LAYOUT_DEPTH {
        return Err(LayoutError::DepthExceeded {
            node_id: id.to_string(),
            max: MAX_LAYOUT_DEPTH,
        });
    }

    let inner = inset(area, node);

    if node.children.is_empty() {
        return Ok(LayoutNode {
            id,
            component_type: node.component_type.clone(),
            area: inner,
            node: node.clone(),
            children: Vec::new(),
        });
    }

    let boxes = distribute(node.direction, inner, node.gap, &node.children);
    let mut children = Vec::with_capacity(node.children.len());
    for (child, child_area) in node.children.iter().zip(boxes) {
        children.push(solve_node(child, child_area, depth + 1, counter)?);
    }

    Ok(LayoutNode {
        id,
        component_type: node.component_type.clone(),
        area: inner,
        node: node.clone(),
        children,
    })
}

/// Applies padding (fixed inset) and a 1-cell border on every declared side.
fn inset(area: Rect, node: &Node) -> Rect {
    let p = &node.padding;
    let border = if node.border { 1 } else { 0 };
    let left = p.left + border;
    let top = p.top + border;
    let right = p.right + border;
    let bottom = p.bottom + border;

    let x = area.x.saturating_add(left);
    let y = area.y.saturating_add(top);
    let w = area.width.saturating_sub(left + right);
    let h = area.height.saturating_sub(top + bottom);
    Rect::new(x, y, w, h)
}

/// Measures and places `children` along `direction`'s main axis inside
/// `inner`, cross-stretching them to the full cross-axis size.
fn distribute(direction: Direction, inner: Rect, gap: u16, children: &[Node]) -> Vec<Rect> {
    let is_column = direction.is_column();
    let main_size = if is_column { inner.height } else { inner.width };
    let cross_size = if is_column { inner.width } else { inner.height };

    let gap_sum = gap.saturating_mul(children.len().saturating_sub(1) as u16);
    let mut fixed_sum: u32 = 0;
    let mut grow_sum: u32 = 0;
    let mut shrink_sum: u32 = 0;
    let mut natural = Vec::with_capacity(children.len());

    for child in children {
        let size = if is_column { child.height } else { child.width };
        match size {
            SizeSpec::Fixed(w) => {
                fixed_sum += w as u32;
                natural.push(w as u32);
            }
            SizeSpec::Flex { basis, grow, shrink } => {
                grow_sum += grow as u32;
                shrink_sum += shrink as u32;
                // A flex child's pre-distribution size is its declared
                // basis (0 when omitted); grow adds to it, shrink takes
                // from it.
                fixed_sum += basis as u32;
                natural.push(basis as u32);
            }
        }
    }

    let free = main_size as i64 - fixed_sum as i64 - gap_sum as i64;
    let mut main_sizes = vec![0u32; children.len()];

    if free >= 0 {
        let free = free as u32;
        let mut remainder = free;
        for (i, child) in children.iter().enumerate() {
            main_sizes[i] = match child_size(child, is_column) {
                SizeSpec::Fixed(w) => w as u32,
                SizeSpec::Flex { basis, grow, .. } if grow_sum > 0 => {
                    let share = free * grow as u32 / grow_sum;
                    remainder -= share;
                    basis as u32 + share
                }
                SizeSpec::Flex { basis, .. } => basis as u32,
            };
        }
        // Remainder distributed left-to-right (declaration order) to avoid
        // bias toward any one child.
        let mut i = 0;
        while remainder > 0 && i < children.len() {
            if matches!(child_size(&children[i], is_column), SizeSpec::Flex { grow, .. } if grow > 0) {
                main_sizes[i] += 1;
                remainder -= 1;
            }
            i += 1;
            if i == children.len() && remainder > 0 {
                // No further flex-grow children to absorb the remainder.
                break;
            }
        }
    } else {
        let overflow = (-free) as u32;
        for (i, child) in children.iter().enumerate() {
            main_sizes[i] = match child_size(child, is_column) {
                SizeSpec::Fixed(w) => w as u32,
                SizeSpec::Flex { shrink, .. } if shrink_sum > 0 => {
                    let reduction = (overflow * shrink as u32 / shrink_sum).min(natural[i]);
                    natural[i].saturating_sub(reduction)
                }
                // No sibling declared a shrink weight at all: nothing
                // shrinks, every flex child keeps its natural size.
                SizeSpec::Flex { .. } => natural[i],
            };
        }
    }

    let mut boxes = Vec::with_capacity(children.len());
    let mut cursor = if is_column { inner.y } else { inner.x };
    for size in main_sizes {
        let size = size.min(u16::MAX as u32) as u16;
        let rect = if is_column {
            Rect::new(inner.x, cursor, cross_size, size)
        } else {
            Rect::new(cursor, inner.y, size, cross_size)
        };
        boxes.push(rect);
        cursor = cursor.saturating_add(size).saturating_add(gap);
    }
    boxes
}

fn child_size(child: &Node, is_column: bool) -> SizeSpec {
    if is_column {
        child.height
    } else {
        child.width
    }
}
