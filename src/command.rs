use crate::grid::{Component, Grid, GridNode, PowerLine};

/// Maximum number of edits kept for undo.
pub const HISTORY_LIMIT: usize = 50;

/// A reversible edit of a [`Grid`]. Placing charges the item's cost and
/// removing refunds it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaceComponent { component: Component },
    RemoveComponent { component: Component },
    PlaceLine { line: PowerLine },
    RemoveLine { line: PowerLine },
    PlaceNode { node: GridNode },
    RemoveNode { node: GridNode },
}

impl Command {
    pub fn inverse(&self) -> Command {
        match self.clone() {
            Command::PlaceComponent { component } => Command::RemoveComponent { component },
            Command::RemoveComponent { component } => Command::PlaceComponent { component },
            Command::PlaceLine { line } => Command::RemoveLine { line },
            Command::RemoveLine { line } => Command::PlaceLine { line },
            Command::PlaceNode { node } => Command::RemoveNode { node },
            Command::RemoveNode { node } => Command::PlaceNode { node },
        }
    }

    pub(crate) fn apply(&self, grid: &mut Grid) {
        match self {
            Command::PlaceComponent { component } => {
                grid.budget -= component.cost;
                if let Some(node) = component
                    .connected_node
                    .as_ref()
                    .and_then(|id| grid.nodes.get_mut(id))
                {
                    node.components.push(component.id.clone());
                }
                grid.components.insert(component.id.clone(), component.clone());
            }
            Command::RemoveComponent { component } => {
                if grid.components.remove(&component.id).is_some() {
                    grid.budget += component.cost;
                }
                for node in grid.nodes.values_mut() {
                    node.components.retain(|c| c != &component.id);
                }
            }
            Command::PlaceLine { line } => {
                grid.budget -= line.cost;
                for end in [&line.from_id, &line.to_id] {
                    if let Some(node) = grid.nodes.get_mut(end) {
                        node.lines.push(line.id.clone());
                    }
                }
                grid.lines.insert(line.id.clone(), line.clone());
            }
            Command::RemoveLine { line } => {
                if grid.lines.remove(&line.id).is_some() {
                    grid.budget += line.cost;
                }
                for node in grid.nodes.values_mut() {
                    node.lines.retain(|l| l != &line.id);
                }
            }
            Command::PlaceNode { node } => {
                grid.nodes.insert(node.id.clone(), node.clone());
            }
            Command::RemoveNode { node } => {
                grid.nodes.remove(&node.id);
            }
        }
    }
}

/// Bounded undo/redo history.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Vec<Command>,
    cursor: usize,
}

impl CommandLog {
    /// Records an executed command, discarding anything that could have
    /// been redone.
    pub fn push(&mut self, command: Command) {
        self.entries.truncate(self.cursor);
        self.entries.push(command);
        if self.entries.len() > HISTORY_LIMIT {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len();
    }

    /// Steps back and returns the command that reverts the last edit.
    pub fn undo(&mut self) -> Option<Command> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].inverse())
    }

    pub fn redo(&mut self) -> Option<Command> {
        let command = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridNode;
    use crate::grid::Point;

    fn node(id: &str) -> Command {
        Command::PlaceNode {
            node: GridNode {
                id: id.to_string(),
                position: Point::default(),
                voltage_kv: 220.0,
                components: Vec::new(),
                lines: Vec::new(),
            },
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut log = CommandLog::default();
        for i in 0..(HISTORY_LIMIT + 10) {
            log.push(node(&format!("n{}", i)));
        }
        assert_eq!(log.len(), HISTORY_LIMIT);
        assert!(!log.can_redo());
    }

    #[test]
    fn push_after_undo_drops_redo_branch() {
        let mut log = CommandLog::default();
        log.push(node("a"));
        log.push(node("b"));
        assert!(log.undo().is_some());
        assert!(log.can_redo());
        log.push(node("c"));
        assert!(!log.can_redo());
        assert_eq!(log.len(), 2);
    }
}
