//! N-tuple pattern evaluator served through the [`Model`] contract.
//!
//! Weights come as an `NTRV` blob: a 20 byte header (magic, version, tuple
//! count, CRC32 of the payload, reserved) followed by the tuple definitions
//! and `3^len` little-endian `f32` weights per tuple.

use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};

use crate::ai::model::{BoardTensor, Model, ModelSource};
use crate::board::Board;
use crate::error::ModelError;
use crate::types::{BOARD_SIZE, Cell, NUM_SQUARES, Player, Position};

const MAGIC: &[u8; 4] = b"NTRV";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
struct Pattern {
    squares: Vec<u8>,
    weights: Vec<f32>,
}

/// Learned evaluator: sums pattern weights over the four board rotations.
#[derive(Debug, Clone, PartialEq)]
pub struct NTupleModel {
    patterns: Vec<Pattern>,
}

impl NTupleModel {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ModelError> {
        let mut header = Reader::new(data);
        if header.take(4, "magic")? != MAGIC {
            return Err(format_error("invalid weights magic (expected NTRV)"));
        }
        let version = header.u32("version")?;
        if version != VERSION {
            return Err(format_error(format!(
                "unsupported weights version: expected {VERSION}, got {version}"
            )));
        }
        let num_tuples = header.u32("tuple count")? as usize;
        let expected_crc = header.u32("checksum")?;
        header.u32("reserved field")?;

        let payload = &data[HEADER_SIZE..];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(format_error(format!(
                "CRC32 mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
            )));
        }

        let mut body = Reader::new(payload);
        let mut tuples = Vec::with_capacity(num_tuples.min(NUM_SQUARES));
        for index in 0..num_tuples {
            let len = body.u8("tuple size")? as usize;
            let squares = body.take(len, "tuple positions")?.to_vec();
            if squares.iter().any(|&sq| sq as usize >= NUM_SQUARES) {
                return Err(format_error(format!(
                    "tuple #{index} contains out-of-range board position"
                )));
            }
            tuples.push(squares);
        }

        let mut patterns = Vec::with_capacity(tuples.len());
        for (index, squares) in tuples.into_iter().enumerate() {
            let entries = pow3(squares.len())
                .ok_or_else(|| format_error(format!("tuple #{index} is too long")))?;
            let mut weights = Vec::with_capacity(entries);
            for _ in 0..entries {
                weights.push(body.f32("weights")?);
            }
            patterns.push(Pattern { squares, weights });
        }

        if !body.is_exhausted() {
            return Err(format_error("weights payload has trailing bytes"));
        }

        Ok(Self { patterns })
    }

    /// Score of `board` from `player`'s point of view.
    pub fn evaluate(&self, board: &Board, player: Player) -> f32 {
        let mut score = 0.0f32;
        for rotation in 0..4 {
            for pattern in &self.patterns {
                let index = pattern.squares.iter().fold(0usize, |acc, &square| {
                    let cell = board.cell(rotate(square, rotation));
                    acc * 3 + relative_digit(cell, player)
                });
                score += pattern.weights.get(index).copied().unwrap_or(0.0);
            }
        }
        score
    }

    /// Per-square move scores for the mover encoded in `input`. Illegal
    /// squares score negative infinity.
    pub fn move_scores(&self, input: &BoardTensor) -> Vec<f32> {
        let board = input.to_relative_board();
        let mover = Player::Black;
        let legal = board.legal_mask(mover);

        (0..NUM_SQUARES)
            .map(|index| {
                let Some(pos) = Position::from_index(index) else {
                    return f32::NEG_INFINITY;
                };
                if legal & (1u64 << index) == 0 {
                    return f32::NEG_INFINITY;
                }
                let next = board.with_move(pos, mover);
                -self.evaluate(&next, mover.opponent())
            })
            .collect()
    }
}

impl Model for NTupleModel {
    fn predict(&self, input: &BoardTensor) -> LocalBoxFuture<'_, Result<Vec<f32>, ModelError>> {
        Box::pin(future::ready(Ok(self.move_scores(input))))
    }
}

type FetchBytes = dyn Fn() -> LocalBoxFuture<'static, Result<Vec<u8>, ModelError>>;

/// Fetches a weights blob and decodes it into an [`NTupleModel`].
pub struct NTupleSource {
    fetch: Box<FetchBytes>,
}

impl NTupleSource {
    pub fn new(
        fetch: impl Fn() -> LocalBoxFuture<'static, Result<Vec<u8>, ModelError>> + 'static,
    ) -> Self {
        Self {
            fetch: Box::new(fetch),
        }
    }
}

impl ModelSource for NTupleSource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
        let bytes = (self.fetch)();
        Box::pin(async move {
            let model = NTupleModel::from_bytes(&bytes.await?)?;
            Ok(Rc::new(model) as Rc<dyn Model>)
        })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], ModelError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| format_error(format!("unexpected EOF while reading {what}")))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn u8(&mut self, what: &str) -> Result<u8, ModelError> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32, ModelError> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(bytes))
    }

    fn f32(&mut self, what: &str) -> Result<f32, ModelError> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4, what)?);
        Ok(f32::from_le_bytes(bytes))
    }

    fn is_exhausted(&self) -> bool {
        self.offset == self.data.len()
    }
}

fn format_error(message: impl Into<String>) -> ModelError {
    ModelError::Format(message.into())
}

fn rotate(square: u8, rotation: u8) -> Position {
    let row = square as usize / BOARD_SIZE;
    let col = square as usize % BOARD_SIZE;
    let last = BOARD_SIZE - 1;

    let (r, c) = match rotation % 4 {
        0 => (row, col),
        1 => (col, last - row),
        2 => (last - row, last - col),
        _ => (last - col, row),
    };
    Position::new(r as u8, c as u8)
}

/// 0=empty, 1=own stone, 2=opponent stone.
fn relative_digit(cell: Cell, player: Player) -> usize {
    match cell {
        Cell::Empty => 0,
        own if own == Cell::from(player) => 1,
        _ => 2,
    }
}

fn pow3(exp: usize) -> Option<usize> {
    (0..exp).try_fold(1usize, |acc, _| acc.checked_mul(3))
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    fn build_weights_blob(tuples: &[Vec<u8>], weights: &[Vec<f32>]) -> Vec<u8> {
        assert_eq!(tuples.len(), weights.len());

        let mut payload = Vec::new();
        for tuple in tuples {
            payload.push(tuple.len() as u8);
            payload.extend_from_slice(tuple);
        }
        for w in weights {
            for value in w {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(tuples.len() as u32).to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    fn corner_model() -> NTupleModel {
        let bytes = build_weights_blob(&[vec![0]], &[vec![0.0, 1.0, -1.0]]);
        NTupleModel::from_bytes(&bytes).expect("must parse")
    }

    fn format_message(result: Result<NTupleModel, ModelError>) -> String {
        match result {
            Err(ModelError::Format(message)) => message,
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn from_bytes_reads_tuples_and_weights() {
        let tuples = vec![vec![0, 1], vec![63]];
        let weights = vec![
            vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0],
            vec![-1.0, 2.0, 0.25],
        ];

        let model = NTupleModel::from_bytes(&build_weights_blob(&tuples, &weights)).unwrap();

        assert_eq!(model.patterns.len(), 2);
        assert_eq!(model.patterns[0].squares, tuples[0]);
        assert_eq!(model.patterns[1].weights, weights[1]);
    }

    #[test]
    fn from_bytes_rejects_corrupt_blobs() {
        let good = build_weights_blob(&[vec![0]], &[vec![0.0, 1.0, -1.0]]);

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(format_message(NTupleModel::from_bytes(&bad_magic)).contains("magic"));

        let mut bad_version = good.clone();
        bad_version[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(format_message(NTupleModel::from_bytes(&bad_version)).contains("version"));

        let mut bad_crc = good.clone();
        let last = bad_crc.len() - 1;
        bad_crc[last] ^= 0x01;
        assert!(format_message(NTupleModel::from_bytes(&bad_crc)).contains("CRC32"));

        assert!(format_message(NTupleModel::from_bytes(&good[..10])).contains("EOF"));
    }

    #[test]
    fn from_bytes_rejects_truncated_weights() {
        let mut bytes = build_weights_blob(&[vec![0, 1]], &[vec![0.0; 9]]);
        bytes.pop();
        let crc = crc32fast::hash(&bytes[HEADER_SIZE..]);
        bytes[12..16].copy_from_slice(&crc.to_le_bytes());

        assert!(
            format_message(NTupleModel::from_bytes(&bytes))
                .contains("unexpected EOF while reading weights")
        );
    }

    #[test]
    fn evaluate_applies_rotations_and_player_view() {
        let model = corner_model();
        let corners = 1u64 | (1 << 7) | (1 << 56) | (1 << 63);
        let board = Board::from_bitboards(corners, 0);

        assert_eq!(model.evaluate(&board, Player::Black), 4.0);
        assert_eq!(model.evaluate(&board, Player::White), -4.0);
    }

    #[test]
    fn predict_scores_only_legal_squares() {
        let model = corner_model();
        let input = BoardTensor::encode(&Board::new(), Player::Black);

        let scores = block_on(model.predict(&input)).unwrap();

        assert_eq!(scores.len(), 64);
        let legal: Vec<usize> = Board::new()
            .legal_moves(Player::Black)
            .iter()
            .map(|pos| pos.index())
            .collect();
        for (index, score) in scores.iter().enumerate() {
            assert_eq!(score.is_finite(), legal.contains(&index), "square {index}");
        }
    }

    #[test]
    fn source_decodes_fetched_bytes() {
        let bytes = build_weights_blob(&[vec![0]], &[vec![0.0, 1.0, -1.0]]);
        let source = NTupleSource::new(move || Box::pin(future::ready(Ok(bytes.clone()))));

        assert!(block_on(source.load()).is_ok());

        let broken = NTupleSource::new(|| Box::pin(future::ready(Ok(vec![1, 2, 3]))));
        assert!(matches!(
            block_on(broken.load()),
            Err(ModelError::Format(_))
        ));
    }
}
