//! Page selection: click, modifier-click, range expressions and marquee
//!
//! Selection is keyed by page id and never persisted. Operations that need
//! display order take the current order as a slice of ids.

use crate::types::PageId;
use std::collections::HashSet;

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    /// Ctrl on Windows/Linux, Cmd on macOS
    pub toggle: bool,
    pub shift: bool,
}

impl ClickModifiers {
    pub const NONE: ClickModifiers = ClickModifiers {
        toggle: false,
        shift: false,
    };
    pub const TOGGLE: ClickModifiers = ClickModifiers {
        toggle: true,
        shift: false,
    };
    pub const SHIFT: ClickModifiers = ClickModifiers {
        toggle: false,
        shift: true,
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: HashSet<PageId>,
    anchor: Option<PageId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> &HashSet<PageId> {
        &self.selected
    }

    pub fn anchor(&self) -> Option<PageId> {
        self.anchor
    }

    /// Selected ids in display order
    pub fn ordered(&self, order: &[PageId]) -> Vec<PageId> {
        order
            .iter()
            .copied()
            .filter(|id| self.selected.contains(id))
            .collect()
    }

    /// Apply a click on `id`.
    ///
    /// A plain click selects only `id`, toggle flips it, and shift adds the
    /// display-order range from the anchor to `id`.
    pub fn click(&mut self, id: PageId, modifiers: ClickModifiers, order: &[PageId]) {
        if modifiers.shift {
            let anchor_pos = self
                .anchor
                .and_then(|anchor| order.iter().position(|&p| p == anchor));
            let target_pos = order.iter().position(|&p| p == id);

            if let (Some(a), Some(t)) = (anchor_pos, target_pos) {
                let (start, end) = if a <= t { (a, t) } else { (t, a) };
                self.selected.extend(order[start..=end].iter().copied());
                return;
            }
        }

        if modifiers.toggle {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        } else {
            self.selected.clear();
            self.selected.insert(id);
        }
        self.anchor = Some(id);
    }

    /// Add the pages named by a range expression such as `1-3,5`.
    ///
    /// Positions are 1-based; malformed or out-of-range tokens are ignored.
    pub fn select_by_range_expression(&mut self, expression: &str, order: &[PageId]) {
        let positions = parse_range_expression(expression, order.len());
        self.selected
            .extend(positions.into_iter().filter_map(|i| order.get(i).copied()));
    }

    /// Marquee selection
    pub fn select_ids(&mut self, ids: impl IntoIterator<Item = PageId>, additive: bool) {
        if !additive {
            self.selected.clear();
        }
        self.selected.extend(ids);
    }

    pub fn select_all(&mut self, order: &[PageId]) {
        self.selected.extend(order.iter().copied());
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    /// Forget ids that are no longer in the document
    pub fn prune(&mut self, order: &[PageId]) {
        let existing: HashSet<PageId> = order.iter().copied().collect();
        self.selected.retain(|id| existing.contains(id));
        if self.anchor.is_some_and(|a| !existing.contains(&a)) {
            self.anchor = None;
        }
    }
}

/// Parse a comma-separated list of 1-based page numbers and inclusive
/// `start-end` ranges into sorted, deduplicated 0-based positions
pub fn parse_range_expression(expression: &str, total: usize) -> Vec<usize> {
    let in_bounds = |n: usize| (1..=total).contains(&n);
    let mut positions = Vec::new();

    for token in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let (Ok(start), Ok(end)) =
                    (start.trim().parse::<usize>(), end.trim().parse::<usize>())
                else {
                    continue;
                };
                if start <= end && in_bounds(start) && in_bounds(end) {
                    positions.extend((start - 1)..end);
                }
            }
            None => {
                if let Ok(n) = token.parse::<usize>() {
                    if in_bounds(n) {
                        positions.push(n - 1);
                    }
                }
            }
        }
    }

    positions.sort_unstable();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(n: u64) -> Vec<PageId> {
        (1..=n).map(PageId).collect()
    }

    #[test]
    fn test_range_expression() {
        assert_eq!(parse_range_expression("1-3,5", 10), vec![0, 1, 2, 4]);
        assert!(parse_range_expression("0,99", 10).is_empty());
        assert_eq!(parse_range_expression(" 2 , 2-3 ,x,4-,-1", 10), vec![1, 2]);
        // Reversed and partially out-of-range ranges are ignored whole
        assert!(parse_range_expression("5-3,8-12", 10).is_empty());
    }

    #[test]
    fn test_range_selection_adds_to_existing() {
        let order = order(10);
        let mut selection = Selection::new();
        selection.click(order[9], ClickModifiers::NONE, &order);
        selection.select_by_range_expression("1-2", &order);
        assert_eq!(selection.ordered(&order), vec![order[0], order[1], order[9]]);
    }

    #[test]
    fn test_click_semantics() {
        let order = order(6);
        let mut selection = Selection::new();

        selection.click(order[1], ClickModifiers::NONE, &order);
        selection.click(order[3], ClickModifiers::TOGGLE, &order);
        assert_eq!(selection.ordered(&order), vec![order[1], order[3]]);

        selection.click(order[3], ClickModifiers::TOGGLE, &order);
        assert_eq!(selection.ordered(&order), vec![order[1]]);

        // Anchor is the last toggled page; shift extends from it
        selection.click(order[5], ClickModifiers::SHIFT, &order);
        assert_eq!(
            selection.ordered(&order),
            vec![order[1], order[3], order[4], order[5]]
        );

        selection.click(order[0], ClickModifiers::NONE, &order);
        assert_eq!(selection.ordered(&order), vec![order[0]]);
    }

    #[test]
    fn test_shift_click_without_anchor_acts_as_plain_click() {
        let order = order(3);
        let mut selection = Selection::new();
        selection.click(order[2], ClickModifiers::SHIFT, &order);
        assert_eq!(selection.ordered(&order), vec![order[2]]);
        assert_eq!(selection.anchor(), Some(order[2]));
    }

    #[test]
    fn test_prune_drops_missing_ids() {
        let order = order(3);
        let mut selection = Selection::new();
        selection.select_all(&order);
        selection.prune(&order[..1]);
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(order[0]));
    }
}
