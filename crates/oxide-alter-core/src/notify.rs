//! Listeners that hold a table open.
//!
//! Before a table is altered, everything that has it open (editors, views,
//! cached cursors) is asked to close. A listener may refuse, which stops the
//! alteration.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use crate::error::Outcome;

/// Something that keeps a table open.
pub trait TableListener {
    /// Name shown in logs.
    fn name(&self) -> &str;

    /// Asks the listener to release `table`.
    fn close_listener(&mut self, table: &str) -> Outcome;
}

/// Handle returned by [`ListenerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-table registry of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Box<dyn TableListener>)>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(table, list)| (table.as_str(), list.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: &str, listener: Box<dyn TableListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        debug!(table = %table, listener = %listener.name(), "Registered table listener");
        self.listeners
            .entry(table.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Removes a listener without asking it to close.
    pub fn unregister(&mut self, table: &str, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(table) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(table);
        }
        removed
    }

    #[must_use]
    pub fn listeners_for(&self, table: &str) -> Vec<&dyn TableListener> {
        self.listeners
            .get(table)
            .map(|list| list.iter().map(|(_, l)| &**l).collect())
            .unwrap_or_default()
    }

    /// Asks every listener of `table` except `except` to close.
    ///
    /// Listeners that close are unregistered. The first listener that fails
    /// or cancels stops the sweep and its outcome is returned; it and the
    /// listeners not yet asked stay registered.
    pub fn close_listeners(&mut self, table: &str, except: &[ListenerId]) -> Outcome {
        let Some(list) = self.listeners.remove(table) else {
            return Outcome::Success;
        };

        let mut kept = Vec::new();
        let mut outcome = Outcome::Success;
        for (id, mut listener) in list {
            if !outcome.is_success() || except.contains(&id) {
                kept.push((id, listener));
                continue;
            }
            let result = listener.close_listener(table);
            if result.is_success() {
                debug!(table = %table, listener = %listener.name(), "Listener closed");
            } else {
                info!(
                    table = %table,
                    listener = %listener.name(),
                    outcome = %result,
                    "Listener refused to close"
                );
                kept.push((id, listener));
                outcome = result;
            }
        }

        if !kept.is_empty() {
            self.listeners.insert(table.to_string(), kept);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Editor {
        name: &'static str,
        answer: Outcome,
    }

    impl TableListener for Editor {
        fn name(&self) -> &str {
            self.name
        }

        fn close_listener(&mut self, _table: &str) -> Outcome {
            self.answer.clone()
        }
    }

    fn editor(name: &'static str, answer: Outcome) -> Box<dyn TableListener> {
        Box::new(Editor { name, answer })
    }

    #[test]
    fn test_close_all() {
        let mut registry = ListenerRegistry::new();
        registry.register("persons", editor("form", Outcome::Success));
        registry.register("persons", editor("grid", Outcome::Success));
        registry.register("cities", editor("grid", Outcome::Success));

        assert_eq!(registry.close_listeners("persons", &[]), Outcome::Success);
        assert!(registry.listeners_for("persons").is_empty());
        assert_eq!(registry.listeners_for("cities").len(), 1);
    }

    #[test]
    fn test_refusal_stops_sweep() {
        let mut registry = ListenerRegistry::new();
        registry.register("persons", editor("form", Outcome::Success));
        registry.register("persons", editor("dirty", Outcome::Cancelled("unsaved".into())));
        registry.register("persons", editor("grid", Outcome::Success));

        let outcome = registry.close_listeners("persons", &[]);
        assert!(outcome.is_cancelled());
        let listeners = registry.listeners_for("persons");
        let names: Vec<&str> = listeners.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["dirty", "grid"]);
    }

    #[test]
    fn test_except_and_unregister() {
        let mut registry = ListenerRegistry::new();
        let me = registry.register("persons", editor("designer", Outcome::Failed("no".into())));
        registry.register("persons", editor("grid", Outcome::Success));

        assert_eq!(registry.close_listeners("persons", &[me]), Outcome::Success);
        assert_eq!(registry.listeners_for("persons").len(), 1);
        assert!(registry.unregister("persons", me));
        assert!(!registry.unregister("persons", me));
        assert!(registry.listeners_for("persons").is_empty());
    }
}
