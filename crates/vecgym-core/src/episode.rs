//! Per-environment episode state machine (spec.md §4.D).
//!
//! One call to [`step_env`] is one *environment step*: `SKIP` raw frames,
//! max-of-last-two downsample, life-loss shaping, reset-on-done/limit.

use crate::emulator::Emulator;
use crate::error::VecgymError;
use crate::fleet::EnvState;
use crate::observation::render_small;
use crate::observation::render_small_max;
use crate::rgb::RGB_BYTES;
use crate::topology::{ACTION_SENTINEL, FULL_H, FULL_W, H, LIMIT, W};

/// Last-two-raw-frames RGB capture for the optional side-channel (§4.F),
/// carried alongside the grayscale `small1`/`small2` capture on the same
/// schedule.
pub struct RgbCapture {
    pub pic1: [u8; RGB_BYTES],
    pub pic2: [u8; RGB_BYTES],
}

impl Default for RgbCapture {
    fn default() -> Self {
        RgbCapture { pic1: [0u8; RGB_BYTES], pic2: [0u8; RGB_BYTES] }
    }
}

/// Outcome of one environment-step, already applied to `EnvState`.
pub struct StepOutcome {
    pub rew: f32,
    /// Training-visible "this transition ended an episode" flag: raw
    /// game-over OR life-loss-while-still-alive shaping (spec.md §4.D
    /// step 4). Written into `_news` (see DESIGN.md open-question #1 area
    /// for why this, not bare `reset_me`, is what `_news` tracks).
    pub done: bool,
    /// Whether the emulator itself was actually rewound this step.
    pub reset_me: bool,
    pub frame: i32,
    pub score: f32,
}

pub fn step_env<E: Emulator>(
    emu: &mut E,
    state: &mut EnvState,
    action: i32,
    skip: usize,
    action_set: &[i32],
    mut rgb_capture: Option<&mut RgbCapture>,
) -> Result<StepOutcome, VecgymError> {
    if action == ACTION_SENTINEL {
        return Err(VecgymError::EmulatorContract(
            "_acts slot still holds the 0xDEAD sentinel: parent did not fill actions".into(),
        ));
    }
    let resolved = *action_set
        .get(action as usize)
        .ok_or_else(|| VecgymError::EmulatorContract(format!("action index {action} out of range")))?;

    let mut rew = 0.0f32;
    let mut raw_game_over = false;
    let mut indexed1 = [0u8; FULL_H * FULL_W];
    let mut indexed2 = [0u8; FULL_H * FULL_W];
    let mut captured2 = false;

    for s in 0..skip {
        let r = emu.act(resolved);
        rew += r as f32;
        state.frame += 1;
        state.score += r as f32;
        raw_game_over |= emu.game_over();
        if raw_game_over {
            break;
        }
        if s == skip - 1 {
            emu.screen_indexed(&mut indexed1);
            if let Some(cap) = &mut rgb_capture {
                emu.screen_rgb(&mut cap.pic1);
            }
        }
        // `skip >= 2` guards the SKIP-2 capture instead of letting an
        // unsigned `skip - 2` underflow: with SKIP==1 there is no second
        // frame to capture and the max-of-two degenerates to small1-only
        // (spec.md §9 "SKIP == 1 is not guarded").
        if skip >= 2 && s == skip - 2 {
            emu.screen_indexed(&mut indexed2);
            captured2 = true;
            if let Some(cap) = &mut rgb_capture {
                emu.screen_rgb(&mut cap.pic2);
            }
        }
    }
    if !captured2 {
        indexed2 = indexed1;
        if let Some(cap) = &mut rgb_capture {
            cap.pic2 = cap.pic1;
        }
    }

    let lives = emu.lives();
    let mut done = raw_game_over;
    if lives < state.lives && lives > 0 {
        done = true;
        rew = -1.0;
    }
    state.lives = lives;

    let reset_me = raw_game_over || state.frame >= LIMIT;

    if !reset_me {
        let mut small = [0u8; H * W];
        render_small_max(&mut small, &indexed1, &indexed2, &state.palette);
        state.stack.push(&small);
    } else {
        emu.reset_game();
        state.frame = 0;
        state.score = 0.0;
        state.lives = 0;

        let mut fresh_indexed = [0u8; FULL_H * FULL_W];
        emu.screen_indexed(&mut fresh_indexed);
        let mut fresh_small = [0u8; H * W];
        render_small(&mut fresh_small, &fresh_indexed, &state.palette);
        state.stack.fill_replicated(&fresh_small);

        if let Some(cap) = &mut rgb_capture {
            let mut fresh_rgb = [0u8; RGB_BYTES];
            emu.screen_rgb(&mut fresh_rgb);
            cap.pic1 = fresh_rgb;
            cap.pic2 = fresh_rgb;
        }
    }

    Ok(StepOutcome { rew, done, reset_me, frame: state.frame, score: state.score })
}
