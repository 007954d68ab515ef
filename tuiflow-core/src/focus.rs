//! Focus Manager: geometric ordering over the focusable set, Tab-cycle
//! navigation, and the self-healing `validate_and_correct` invariant, per
//! §4.F.

use ratatui::layout::Rect;

use crate::component::is_focusable;
use crate::effect::{DispatchResult, SessionEffect};
use crate::layout::LayoutNode;
use crate::msg::{ComponentId, Msg};

/// One entry in the ordered focusable set, captured fresh from each layout
/// pass.
#[derive(Debug, Clone, PartialEq)]
struct Focusable {
    id: ComponentId,
    area: Rect,
}

/// Tracks which component currently has focus and keeps it consistent with
/// the live layout.
#[derive(Default)]
pub struct FocusManager {
    order: Vec<Focusable>,
    current: Option<ComponentId>,
    auto_focus: bool,
    tab_cycles: bool,
}

impl FocusManager {
    pub fn new(auto_focus: bool, tab_cycles: bool) -> Self {
        Self {
            order: Vec::new(),
            current: None,
            auto_focus,
            tab_cycles,
        }
    }

    pub fn current(&self) -> Option<&ComponentId> {
        self.current.as_ref()
    }

    /// Recomputes the focusable set's geometric order from a fresh layout
    /// pass. Declaration order (depth-first) breaks ties between nodes that
    /// share a top-left corner, since [`LayoutNode::iter`] already walks in
    /// that order and the sort below is stable.
    pub fn sync_layout(&mut self, root: &LayoutNode) {
        let mut order: Vec<Focusable> = root
            .iter()
            .filter(|n| n.component_type.as_deref().map(is_focusable).unwrap_or(false))
            .map(|n| Focusable {
                id: n.id.clone(),
                area: n.area,
            })
            .collect();
        order.sort_by_key(|f| (f.area.y, f.area.x));
        self.order = order;
    }

    fn index_of(&self, id: &ComponentId) -> Option<usize> {
        self.order.iter().position(|f| &f.id == id)
    }

    /// Auto-focuses the first node in geometric order on the first frame
    /// whose focusable set is non-empty, if `autoFocus` is enabled and no
    /// focus has been established yet.
    pub fn auto_focus_if_needed(&mut self) -> DispatchResult<SessionEffect> {
        if self.auto_focus && self.current.is_none() {
            if let Some(first) = self.order.first() {
                return self.set_focus(first.id.clone());
            }
        }
        DispatchResult::unchanged()
    }

    /// No-op if `id` is already focused; otherwise clears the prior focus
    /// and publishes a `focus.changed` effect for the new one.
    pub fn set_focus(&mut self, id: ComponentId) -> DispatchResult<SessionEffect> {
        if self.current.as_ref() == Some(&id) {
            return DispatchResult::unchanged();
        }
        let mut result = DispatchResult::changed();
        if let Some(old) = self.current.take() {
            result = result.with(publish(old, false));
        }
        self.current = Some(id.clone());
        result.with(publish(id, true))
    }

    pub fn clear_focus(&mut self) -> DispatchResult<SessionEffect> {
        match self.current.take() {
            Some(old) => DispatchResult::changed().with(publish(old, false)),
            None => DispatchResult::unchanged(),
        }
    }

    /// Moves focus to the next (or, with `backward`, previous) node in
    /// geometric order. Wraps around when `tabCycles` is enabled; otherwise
    /// clamps at either end.
    pub fn focus_step(&mut self, backward: bool) -> DispatchResult<SessionEffect> {
        if self.order.is_empty() {
            return DispatchResult::unchanged();
        }
        let len = self.order.len();
        let next_index = match self.current.as_ref().and_then(|id| self.index_of(id)) {
            Some(i) => {
                if backward {
                    if i == 0 {
                        if self.tab_cycles {
                            len - 1
                        } else {
                            0
                        }
                    } else {
                        i - 1
                    }
                } else if i + 1 >= len {
                    if self.tab_cycles {
                        0
                    } else {
                        len - 1
                    }
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.set_focus(self.order[next_index].id.clone())
    }

    /// Enforces "exactly the node whose id equals `currentFocus` reports
    /// `focused=true`" after every dispatch cycle. Any instance that
    /// self-focused through a non-standard path is silently corrected;
    /// returns how many corrections were made.
    pub fn validate_and_correct<'a>(
        &mut self,
        instances: impl Iterator<Item = (&'a ComponentId, bool)>,
    ) -> usize {
        let mut corrections = 0;
        for (id, focused) in instances {
            let should_be_focused = self.current.as_ref() == Some(id);
            if focused != should_be_focused {
                corrections += 1;
            }
        }
        corrections
    }
}

fn publish(id: ComponentId, focused: bool) -> SessionEffect {
    SessionEffect::PublishEvent {
        action: "focus.changed".to_string(),
        data: Some(serde_json::json!({ "id": id.to_string(), "focused": focused })),
    }
}

/// True for Tab/Shift-Tab/Esc — navigation keys that pre-empt a focused
/// component's `Handled` response (§4.G).
pub fn preempts_component(msg: &Msg) -> bool {
    match msg {
        Msg::Key(event) => crate::keybindings::is_global_navigation_key(*event),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, Node, Padding, SizeSpec};

    fn leaf(id: &str, component_type: &str, area: Rect) -> LayoutNode {
        LayoutNode {
            id: ComponentId::new(id.to_string()),
            component_type: Some(component_type.to_string()),
            area,
            node: Node {
                id: Some(id.to_string()),
                component_type: Some(component_type.to_string()),
                direction: Direction::Column,
                width: SizeSpec::Fixed(1),
                height: SizeSpec::Fixed(1),
                padding: Padding::default(),
                gap: 0,
                border: false,
                props: Default::default(),
                bind: None,
                children: Vec::new(),
            },
            children: Vec::new(),
        }
    }

    fn container(children: Vec<LayoutNode>) -> LayoutNode {
        LayoutNode {
            id: ComponentId::new("root"),
            component_type: None,
            area: Rect::new(0, 0, 80, 24),
            node: Node {
                id: Some("root".into()),
                component_type: None,
                direction: Direction::Row,
                width: SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 },
                height: SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 },
                padding: Padding::default(),
                gap: 0,
                border: false,
                props: Default::default(),
                bind: None,
                children: Vec::new(),
            },
            children,
        }
    }

    #[test]
    fn auto_focus_picks_first_in_geometric_order() {
        let root = container(vec![
            leaf("b", "input", Rect::new(10, 0, 5, 1)),
            leaf("a", "input", Rect::new(0, 0, 5, 1)),
        ]);
        let mut manager = FocusManager::new(true, true);
        manager.sync_layout(&root);
        manager.auto_focus_if_needed();
        assert_eq!(manager.current().unwrap().as_str(), "a");
    }

    #[test]
    fn tab_cycle_wraps_when_enabled() {
        let root = container(vec![
            leaf("a", "input", Rect::new(0, 0, 5, 1)),
            leaf("b", "input", Rect::new(10, 0, 5, 1)),
        ]);
        let mut manager = FocusManager::new(true, true);
        manager.sync_layout(&root);
        manager.auto_focus_if_needed();
        manager.focus_step(false);
        assert_eq!(manager.current().unwrap().as_str(), "b");
        manager.focus_step(false);
        assert_eq!(manager.current().unwrap().as_str(), "a");
    }

    #[test]
    fn tab_cycle_clamps_when_disabled() {
        let root = container(vec![
            leaf("a", "input", Rect::new(0, 0, 5, 1)),
            leaf("b", "input", Rect::new(10, 0, 5, 1)),
        ]);
        let mut manager = FocusManager::new(true, false);
        manager.sync_layout(&root);
        manager.auto_focus_if_needed();
        manager.focus_step(false);
        manager.focus_step(false);
        assert_eq!(manager.current().unwrap().as_str(), "b");
    }

    #[test]
    fn set_focus_is_noop_for_same_id() {
        let root = container(vec![leaf("a", "input", Rect::new(0, 0, 5, 1))]);
        let mut manager = FocusManager::new(false, true);
        manager.sync_layout(&root);
        manager.set_focus(ComponentId::new("a"));
        let result = manager.set_focus(ComponentId::new("a"));
        assert!(!result.changed);
    }

    #[test]
    fn non_focusable_types_are_excluded_from_order() {
        let root = container(vec![leaf("a", "text", Rect::new(0, 0, 5, 1))]);
        let mut manager = FocusManager::new(true, true);
        manager.sync_layout(&root);
        manager.auto_focus_if_needed();
        assert!(manager.current().is_none());
    }

    #[test]
    fn validate_and_correct_counts_deviations() {
        let root = container(vec![
            leaf("a", "input", Rect::new(0, 0, 5, 1)),
            leaf("b", "input", Rect::new(10, 0, 5, 1)),
        ]);
        let mut manager = FocusManager::new(false, true);
        manager.sync_layout(&root);
        manager.set_focus(ComponentId::new("a"));
        let a_id = ComponentId::new("a");
        let b_id = ComponentId::new("b");
        let reported = vec![(&a_id, false), (&b_id, true)];
        let corrections = manager.validate_and_correct(reported.into_iter());
        assert_eq!(corrections, 2);
    }
}
