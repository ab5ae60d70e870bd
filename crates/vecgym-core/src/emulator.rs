//! The pluggable emulator boundary (spec.md §1 Non-goals, §4.C).
//!
//! The worker never hardcodes a console family: it drives whatever
//! implements this trait. `gb-core` provides one concrete, deterministic
//! implementation used for tests and as the default backend — analogous to
//! the `ALEInterface` the original C++ linked against, just expressed as a
//! safe Rust trait instead of an external shared library.

use std::path::Path;

use crate::error::VecgymError;

/// One game-console instance: one ROM loaded, one lives/score/game-over
/// state machine, one indexed-palette screen.
pub trait Emulator: Sized {
    /// Construct against the given ROM path, with a deterministic seed
    /// (spec.md §4.C: `CPU*1000 + b`) and sticky-action probability fixed
    /// at zero.
    fn new(rom: &Path, seed: u64) -> Result<Self, VecgymError>;

    /// The emulator-reported subset of controller inputs meaningful for the
    /// loaded ROM. Queried once and cached by the fleet.
    fn minimal_action_set(&self) -> &[i32];

    /// Execute one raw frame under the given action index (already resolved
    /// against `minimal_action_set`). Returns the frame's raw reward.
    fn act(&mut self, action: i32) -> i32;

    fn lives(&self) -> i32;
    fn game_over(&self) -> bool;

    /// Rewind to the start of the game. Score/lives bookkeeping is the
    /// caller's responsibility (spec.md §4.D step 7); this only resets the
    /// emulator's own internal state.
    fn reset_game(&mut self);

    /// Full-resolution screen dimensions, asserted against `(2H, 2W)` at
    /// fleet construction time (spec.md §4.C).
    fn screen_dims(&self) -> (usize, usize);

    /// Fill `out` (length `height * width`) with the current frame as
    /// palette indices in `0..256`.
    fn screen_indexed(&self, out: &mut [u8]);

    /// The console's fixed 256-entry RGB palette (spec.md §4.C).
    fn palette_rgb(&self) -> [[u8; 3]; 256];

    /// The console's native full-resolution RGB frame, used only by the
    /// optional single-environment RGB side-channel (spec.md §4.F).
    fn screen_rgb(&self, out: &mut [u8]);
}
