use core::ops::Index;
use serde::{Deserialize, Serialize};

use crate::*;

pub trait DeckGenerator {
    fn generate(self, pair_count: Count, shape_count: ShapeId) -> Result<Deck>;
}

/// Shuffled sequence of shape ids, one entry per card position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    shapes: Vec<ShapeId>,
}

impl Deck {
    /// Builds an unshuffled deck: pair `k` contributes shape `k % shape_count` twice, side by side.
    pub fn ordered(pair_count: Count, shape_count: ShapeId) -> Result<Self> {
        if pair_count == 0 {
            return Err(GameError::NoPairs);
        }
        if shape_count == 0 {
            return Err(GameError::EmptyShapePool);
        }

        let mut shapes = Vec::with_capacity(pair_count as usize * 2);
        for k in 0..pair_count {
            let shape = (k % Count::from(shape_count)) as ShapeId;
            shapes.push(shape);
            shapes.push(shape);
        }
        Ok(Self { shapes })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn pair_count(&self) -> Count {
        (self.shapes.len() / 2) as Count
    }

    /// Shape to assign to the card dealt at `index`, if the deck reaches that far.
    pub fn shape_at(&self, index: usize) -> Option<ShapeId> {
        self.shapes.get(index).copied()
    }

    pub fn shapes(&self) -> &[ShapeId] {
        &self.shapes
    }
}

impl Index<usize> for Deck {
    type Output = ShapeId;

    fn index(&self, index: usize) -> &Self::Output {
        &self.shapes[index]
    }
}

/// Uniform Fisher-Yates shuffle of the ordered deck, reproducible for a given seed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomDeckGenerator {
    seed: u64,
}

impl RandomDeckGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl DeckGenerator for RandomDeckGenerator {
    fn generate(self, pair_count: Count, shape_count: ShapeId) -> Result<Deck> {
        use rand::prelude::*;

        let mut deck = Deck::ordered(pair_count, shape_count)?;
        if Count::from(shape_count) < pair_count {
            log::debug!(
                "Only {} shapes for {} pairs, some shapes will repeat",
                shape_count,
                pair_count
            );
        }

        let mut rng = SmallRng::seed_from_u64(self.seed);
        for i in (1..deck.shapes.len()).rev() {
            let j = rng.random_range(0..=i);
            deck.shapes.swap(i, j);
        }
        log::trace!("Shuffled deck with seed {}: {:?}", self.seed, deck.shapes);
        Ok(deck)
    }
}
