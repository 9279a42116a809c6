//! One game from the host's point of view.
//!
//! A click or CPU decision is checked for legality, placed, animated and only
//! then followed by the turn switch. While the animator runs every new move
//! is refused. `restart` bumps an epoch; work started under an older epoch
//! (animations, CPU thinking) finishes without touching the new game.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};
use rand::Rng;

use crate::animation::FlipAnimator;
use crate::ai::model::ModelStatus;
use crate::board::Board;
use crate::config::Settings;
use crate::controller::CpuController;
use crate::error::RuleResult;
use crate::game::GameLogic;
use crate::runtime::Host;
use crate::types::{GameMode, GameResult, GameState, Player, Position};

struct SessionState {
    settings: Settings,
    game: GameLogic,
    controller: CpuController,
    animator: FlipAnimator,
    human: Player,
    epoch: u64,
    last_flips: Vec<Position>,
    is_pass: bool,
    cpu_thinking: bool,
}

/// Cloning yields another handle to the same game.
#[derive(Clone)]
pub struct GameSession {
    state: Rc<RefCell<SessionState>>,
    host: Host,
}

impl GameSession {
    pub fn new(settings: Settings, host: Host) -> Self {
        let state = SessionState {
            controller: build_controller(&settings, &host),
            animator: FlipAnimator::new(Rc::clone(&host.timer), settings.timing),
            settings,
            game: GameLogic::new(),
            human: Player::Black,
            epoch: 0,
            last_flips: Vec::new(),
            is_pass: false,
            cpu_thinking: false,
        };
        let session = Self {
            state: Rc::new(RefCell::new(state)),
            host,
        };
        session.restart();
        session
    }

    /// Applies new settings and starts a fresh game. CPU seats are rebuilt.
    pub fn configure(&self, settings: Settings) {
        {
            let mut state = self.state.borrow_mut();
            state.animator.reset();
            state.controller = build_controller(&settings, &self.host);
            state.animator = FlipAnimator::new(Rc::clone(&self.host.timer), settings.timing);
            state.settings = settings;
        }
        self.restart();
    }

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    /// Back to the opening position. Pending animations and CPU turns from
    /// the previous game are abandoned.
    pub fn restart(&self) {
        let mut state = self.state.borrow_mut();
        state.epoch += 1;
        state.animator.reset();
        state.game.initialize();
        state.human = state.settings.human_color.unwrap_or_else(random_color);
        state.last_flips.clear();
        state.is_pass = false;
        state.cpu_thinking = false;
        info!(
            "new {:?} game, human plays {:?}",
            state.controller.mode(),
            state.human
        );
    }

    pub fn state(&self) -> GameState {
        let state = self.state.borrow();
        let game = &state.game;
        GameState {
            board: game.board_snapshot().to_array().to_vec(),
            current_player: game.current_player().as_u8(),
            human_player: state.human.as_u8(),
            black_count: game.black_count(),
            white_count: game.white_count(),
            is_game_over: game.is_game_over(),
            is_animating: state.animator.is_animating(),
            is_pass: state.is_pass,
            flipped: state.last_flips.clone(),
            mode: state.controller.mode(),
        }
    }

    /// Final score, once the game is over.
    pub fn result(&self) -> Option<GameResult> {
        let state = self.state.borrow();
        state.game.is_game_over().then(|| state.game.result())
    }

    pub fn mode(&self) -> GameMode {
        self.state.borrow().controller.mode()
    }

    pub fn human_player(&self) -> Player {
        self.state.borrow().human
    }

    pub fn current_player(&self) -> Player {
        self.state.borrow().game.current_player()
    }

    /// Legal moves for the side to move; empty once the game is over.
    pub fn legal_moves(&self) -> Vec<Position> {
        let state = self.state.borrow();
        if state.game.is_game_over() {
            return Vec::new();
        }
        state.game.valid_moves(None)
    }

    pub fn is_flipping(&self, row: u8, col: u8) -> bool {
        self.state
            .borrow()
            .animator
            .is_flipping(Position::new(row, col))
    }

    pub fn is_animating(&self) -> bool {
        self.state.borrow().animator.is_animating()
    }

    pub fn is_game_over(&self) -> bool {
        self.state.borrow().game.is_game_over()
    }

    /// Whether a CPU seat is to move.
    pub fn is_cpu_turn(&self) -> bool {
        let state = self.state.borrow();
        !state.game.is_game_over()
            && state
                .controller
                .is_opponent_turn(state.human, state.game.current_player())
    }

    pub fn model_statuses(&self) -> Vec<ModelStatus> {
        self.state.borrow().controller.model_statuses()
    }

    /// A human move. Returns `false`, changing nothing, when the move is
    /// illegal, input is gated by an animation, the game is over or a CPU
    /// is to move.
    pub async fn play(&self, row: u8, col: u8) -> bool {
        let (epoch, mover) = {
            let state = self.state.borrow();
            let mover = state.game.current_player();
            if state.animator.is_animating()
                || state.game.is_game_over()
                || state.controller.is_opponent_turn(state.human, mover)
            {
                return false;
            }
            (state.epoch, mover)
        };
        self.commit(epoch, mover, Position::new(row, col)).await
    }

    /// Lets the CPU seat to move think and play. `None` when no CPU is to
    /// move, one is already thinking, or the game was reset meanwhile.
    pub async fn cpu_turn(&self) -> Option<Position> {
        let (epoch, mover, controller) = {
            let mut state = self.state.borrow_mut();
            let mover = state.game.current_player();
            if state.cpu_thinking
                || state.animator.is_animating()
                || state.game.is_game_over()
                || !state.controller.is_opponent_turn(state.human, mover)
            {
                return None;
            }
            state.cpu_thinking = true;
            (state.epoch, mover, state.controller.clone())
        };

        let decided = controller
            .decide_cpu_move(mover, || {
                let state = self.state.borrow();
                let current = state.epoch == epoch
                    && !state.game.is_game_over()
                    && state.game.current_player() == mover;
                current.then(|| state.game.board_snapshot())
            })
            .await;

        {
            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                state.cpu_thinking = false;
            }
        }

        let mv = decided?;
        self.commit(epoch, mover, mv).await.then_some(mv)
    }

    /// Plays CPU turns back to back until a human is to move, the game ends
    /// or the session is restarted. Returns how many moves were made.
    pub async fn run_cpu_turns(&self) -> usize {
        let epoch = self.epoch();
        let mut played = 0;
        while self.epoch() == epoch {
            if self.cpu_turn().await.is_none() {
                break;
            }
            played += 1;
        }
        played
    }

    /// Debug hook: ends the game on the spot.
    pub fn debug_end_game(&self) {
        self.state.borrow_mut().game.end_game();
    }

    /// Debug hook: jumps to a random position with `empty_count` empties.
    pub fn debug_generate_end_game(
        &self,
        empty_count: usize,
        favored: Option<Player>,
    ) -> RuleResult<()> {
        let mut state = self.state.borrow_mut();
        state.game.generate_end_game_position(empty_count, favored)?;
        abandon_pending(&mut state);
        Ok(())
    }

    /// Debug hook: replaces the board and the side to move. Nothing changes
    /// unless both are valid.
    pub fn debug_set_position<R: AsRef<[u8]>>(&self, rows: &[R], current: u8) -> RuleResult<()> {
        let board = Board::from_rows(rows)?;
        let mut state = self.state.borrow_mut();
        state.game.set_current_player(current)?;
        state.game.set_position(board);
        abandon_pending(&mut state);
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Places `pos` for `mover`, plays the flips and then hands over the turn.
    async fn commit(&self, epoch: u64, mover: Player, pos: Position) -> bool {
        let animation = {
            let mut state = self.state.borrow_mut();
            if state.epoch != epoch
                || state.animator.is_animating()
                || state.game.is_game_over()
                || state.game.current_player() != mover
            {
                return false;
            }
            let flips = state.game.place_stone(pos.row, pos.col);
            if flips.is_empty() {
                debug!("{mover:?} cannot play {pos:?}");
                return false;
            }
            let animation = state.animator.animate(pos, &flips);
            state.last_flips = flips;
            animation
        };

        animation.await;

        let mut state = self.state.borrow_mut();
        if state.epoch != epoch {
            debug!("game was restarted while {pos:?} was animating");
            return false;
        }
        let can_move = state.game.next_turn();
        state.is_pass = can_move && state.game.current_player() == mover;
        if state.is_pass {
            info!("{:?} has no move and passes", mover.opponent());
        }
        if !can_move {
            info!("game over: {:?}", state.game.result());
        }
        true
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn build_controller(settings: &Settings, host: &Host) -> CpuController {
    let mut controller = CpuController::new(host.clone(), settings.timing, settings.retry);
    controller.update_settings(settings.mode, settings.cpu_level, settings.cpu2_level);
    controller
}

fn abandon_pending(state: &mut SessionState) {
    state.epoch += 1;
    state.animator.reset();
    state.last_flips.clear();
    state.is_pass = false;
    state.cpu_thinking = false;
}

fn random_color() -> Player {
    if rand::rng().random_bool(0.5) {
        Player::Black
    } else {
        Player::White
    }
}
