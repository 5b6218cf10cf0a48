//! FIFO waiting list of players looking for an opponent

use crate::types::PlayerId;
use std::collections::{HashSet, VecDeque};

/// Ordered queue of player ids without duplicates
#[derive(Debug, Default)]
pub struct MatchQueue {
    order: VecDeque<PlayerId>,
    members: HashSet<PlayerId>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a player. A player already queued keeps their position.
    /// Returns true if the player was added.
    pub fn enqueue(&mut self, player_id: PlayerId) -> bool {
        if self.members.contains(&player_id) {
            return false;
        }
        self.members.insert(player_id.clone());
        self.order.push_back(player_id);
        true
    }

    /// Take the two longest-waiting players, or nothing if fewer than two wait
    pub fn dequeue_two(&mut self) -> Option<(PlayerId, PlayerId)> {
        if self.order.len() < 2 {
            return None;
        }
        let first = self.order.pop_front()?;
        let second = self.order.pop_front()?;
        self.members.remove(&first);
        self.members.remove(&second);
        Some((first, second))
    }

    /// Remove a player wherever they are. Returns true if they were queued.
    pub fn remove(&mut self, player_id: &str) -> bool {
        if !self.members.remove(player_id) {
            return false;
        }
        self.order.retain(|queued| queued != player_id);
        true
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.members.contains(player_id)
    }

    /// Zero-based position from the front of the queue
    pub fn position(&self, player_id: &str) -> Option<usize> {
        self.order.iter().position(|queued| queued == player_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerId> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = MatchQueue::new();
        queue.enqueue("a".to_string());
        queue.enqueue("b".to_string());
        queue.enqueue("c".to_string());

        assert_eq!(
            queue.dequeue_two(),
            Some(("a".to_string(), "b".to_string()))
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue_two(), None);
        assert_eq!(queue.position("c"), Some(0));
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = MatchQueue::new();
        assert!(queue.enqueue("a".to_string()));
        assert!(queue.enqueue("b".to_string()));
        assert!(!queue.enqueue("a".to_string()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position("a"), Some(0));
    }

    #[test]
    fn test_remove() {
        let mut queue = MatchQueue::new();
        queue.enqueue("a".to_string());
        queue.enqueue("b".to_string());
        queue.enqueue("c".to_string());

        assert!(queue.remove("b"));
        assert!(!queue.remove("b"));
        assert!(!queue.contains("b"));
        assert_eq!(queue.iter().cloned().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(u8),
        Remove(u8),
        DequeueTwo,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Enqueue),
            (0u8..8).prop_map(Op::Remove),
            Just(Op::DequeueTwo),
        ]
    }

    proptest! {
        #[test]
        fn prop_queue_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let mut queue = MatchQueue::new();
            let mut model: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Enqueue(n) => {
                        let id = format!("p{}", n);
                        let added = queue.enqueue(id.clone());
                        prop_assert_eq!(added, !model.contains(&id));
                        if added {
                            model.push(id);
                        }
                    }
                    Op::Remove(n) => {
                        let id = format!("p{}", n);
                        let removed = queue.remove(&id);
                        prop_assert_eq!(removed, model.contains(&id));
                        model.retain(|m| m != &id);
                    }
                    Op::DequeueTwo => {
                        let pair = queue.dequeue_two();
                        if model.len() >= 2 {
                            let expected = (model.remove(0), model.remove(0));
                            prop_assert_eq!(pair, Some(expected));
                        } else {
                            prop_assert_eq!(pair, None);
                        }
                    }
                }

                prop_assert_eq!(queue.len(), model.len());
                let order: Vec<String> = queue.iter().cloned().collect();
                prop_assert_eq!(&order, &model);
            }
        }
    }
}
