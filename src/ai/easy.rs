use std::cell::RefCell;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::types::Position;

/// Uniformly random choice among legal moves.
pub struct EasyStrategy {
    rng: RefCell<Box<dyn RngCore>>,
}

impl EasyStrategy {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_os_rng()))
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        Self {
            rng: RefCell::new(rng),
        }
    }

    pub fn select(&self, moves: &[Position]) -> Option<Position> {
        if moves.is_empty() {
            return None;
        }
        let index = self.rng.borrow_mut().random_range(0..moves.len());
        moves.get(index).copied()
    }
}

impl Default for EasyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EasyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasyStrategy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::types::Player;

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    #[test]
    fn picks_only_legal_moves() {
        let easy = EasyStrategy::with_seed(3);
        let moves = Board::new().legal_moves(Player::Black);

        for _ in 0..32 {
            let mv = easy.select(&moves).unwrap();
            assert!(moves.contains(&mv));
        }
    }

    #[test]
    fn injected_rng_makes_choice_deterministic() {
        let moves = Board::new().legal_moves(Player::Black);

        let a = EasyStrategy::with_seed(99);
        let b = EasyStrategy::with_seed(99);
        let picks_a: Vec<_> = (0..8).map(|_| a.select(&moves)).collect();
        let picks_b: Vec<_> = (0..8).map(|_| b.select(&moves)).collect();
        assert_eq!(picks_a, picks_b);

        let zero = EasyStrategy::with_rng(Box::new(ZeroRng));
        assert_eq!(zero.select(&moves), Some(moves[0]));
    }

    #[test]
    fn no_moves_yields_none() {
        assert_eq!(EasyStrategy::with_seed(1).select(&[]), None);
    }
}
