use memomatch_core::*;
use rand::prelude::*;
use std::collections::BTreeMap;

/// Simulated player that remembers each face it sees with probability `recall`.
pub struct Player {
    rng: SmallRng,
    recall: f64,
    seen: BTreeMap<CardId, ShapeId>,
}

impl Player {
    pub fn new(seed: u64, recall: f64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            recall: recall.clamp(0.0, 1.0),
            seen: BTreeMap::new(),
        }
    }

    /// Picks two cards and clicks them. Returns `false` when fewer than two cards can be picked.
    pub fn take_turn<S: KeyValueStore>(&mut self, engine: &mut MatchEngine<S>) -> bool {
        let candidates: Vec<CardId> = engine
            .cards()
            .filter(|(_, card)| card.accepts_click() && card.state() == CardState::Hidden)
            .map(|(id, _)| id)
            .collect();
        self.seen.retain(|id, _| candidates.contains(id));
        if candidates.len() < 2 {
            return false;
        }

        let (first, second) = match self.known_pair() {
            Some(pair) => pair,
            None => {
                let first = self.pick_unknown(&candidates, None);
                let shape = engine.card(first).and_then(Card::shape_id);
                let second = shape
                    .and_then(|shape| self.remembered(shape, first))
                    .unwrap_or_else(|| self.pick_unknown(&candidates, Some(first)));
                (first, second)
            }
        };

        for id in [first, second] {
            let outcome = engine.card_clicked(id);
            if !outcome.has_update() {
                log::trace!("Player click on {} dropped: {:?}", id, outcome);
            }
            let shape = engine.card(id).and_then(Card::shape_id);
            self.observe(id, shape);
        }
        true
    }

    fn observe(&mut self, id: CardId, shape: Option<ShapeId>) {
        if let Some(shape) = shape
            && self.rng.random_bool(self.recall)
        {
            self.seen.insert(id, shape);
        }
    }

    fn remembered(&self, shape: ShapeId, except: CardId) -> Option<CardId> {
        self.seen
            .iter()
            .find(|&(&id, &seen)| seen == shape && id != except)
            .map(|(&id, _)| id)
    }

    fn known_pair(&self) -> Option<(CardId, CardId)> {
        self.seen
            .iter()
            .find_map(|(&id, &shape)| self.remembered(shape, id).map(|other| (id, other)))
    }

    /// Random candidate, preferring faces not seen yet.
    fn pick_unknown(&mut self, candidates: &[CardId], except: Option<CardId>) -> CardId {
        let others: Vec<CardId> = candidates
            .iter()
            .copied()
            .filter(|&id| Some(id) != except)
            .collect();
        let unknown: Vec<CardId> = others
            .iter()
            .copied()
            .filter(|id| !self.seen.contains_key(id))
            .collect();
        let pool = if unknown.is_empty() { &others } else { &unknown };
        pool[self.rng.random_range(0..pool.len())]
    }
}
