//! The draw pile.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// The card alphabet: basic hiragana plus voiced and semi-voiced kana.
pub const ALPHABET: &str = "あいうえおかきくけこさしすせそたちつてとなにぬねのはひふへほまみむめもやゆよらりるれろわをんがぎぐげござじずぜぞだぢづでどばびぶべぼぱぴぷぺぽ";

/// How many copies of each card a fresh deck holds.
pub const COPIES: usize = 3;

/// An ordered pile of cards and a cursor pointing at the next one to draw.
///
/// Cards are never removed from `cards`; drawing only advances the cursor,
/// which makes rolling back a play a matter of resetting one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<char>,
    cursor: usize,
}

impl Deck {
    /// A uniformly shuffled deck of [`COPIES`] copies of [`ALPHABET`].
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_alphabet(ALPHABET, rng)
    }

    /// A uniformly shuffled deck of [`COPIES`] copies of `alphabet`.
    pub fn from_alphabet<R: Rng + ?Sized>(alphabet: &str, rng: &mut R) -> Self {
        let mut cards: Vec<char> = (0..COPIES).flat_map(|_| alphabet.chars()).collect();
        cards.shuffle(rng);
        Self { cards, cursor: 0 }
    }

    /// A deck that draws `cards` in the given order.
    pub fn from_cards(cards: Vec<char>) -> Self {
        Self { cards, cursor: 0 }
    }

    /// Draws the next card.
    ///
    /// # Errors
    /// [`RoomError::DeckExhausted`] when every card has been drawn.
    pub fn draw(&mut self) -> Result<char, RoomError> {
        let card = *self
            .cards
            .get(self.cursor)
            .ok_or(RoomError::DeckExhausted)?;
        self.cursor += 1;
        Ok(card)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// A card picked uniformly from the whole deck, ignoring the cursor.
    ///
    /// Every card appears the same number of times, so this is uniform over
    /// the alphabet.
    pub fn random_card<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<char, RoomError> {
        self.cards
            .choose(rng)
            .copied()
            .ok_or(RoomError::DeckExhausted)
    }

    /// Moves the cursor back to an earlier draw position.
    pub(crate) fn rewind_to(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.cards.len());
    }

    #[cfg(test)]
    pub(crate) fn cards(&self) -> &[char] {
        &self.cards
    }
}
