//! Emulator fleet construction (spec.md §4.C).
//!
//! `LUMP * BUNCH` emulator instances, deterministically seeded
//! `CPU*1000 + b`, with a precomputed grayscale palette and per-environment
//! ephemeral state (frame/score/lives/frame-stack — spec.md §3 "Per-
//! environment ephemeral state").

use std::path::Path;

use crate::emulator::Emulator;
use crate::error::VecgymError;
use crate::observation::{grayscale_palette, Stack};
use crate::topology::{Topology, FULL_H, FULL_W};

pub struct EnvState {
    pub frame: i32,
    pub score: f32,
    pub lives: i32,
    pub stack: Stack,
    pub palette: [u16; 256],
}

pub struct Fleet<E: Emulator> {
    pub emulators: Vec<Vec<E>>,
    pub state: Vec<Vec<EnvState>>,
}

impl<E: Emulator> Fleet<E> {
    pub fn build(topology: &Topology, rom: &Path) -> Result<Self, VecgymError> {
        let mut emulators = Vec::with_capacity(topology.lump);
        let mut state = Vec::with_capacity(topology.lump);

        for _l in 0..topology.lump {
            let mut bunch_emu = Vec::with_capacity(topology.bunch);
            let mut bunch_state = Vec::with_capacity(topology.bunch);
            for b in 0..topology.bunch {
                let seed = (topology.cpu as u64) * 1000 + b as u64;
                let emu = E::new(rom, seed)?;

                let (h, w) = emu.screen_dims();
                if (h, w) != (FULL_H, FULL_W) {
                    return Err(VecgymError::EmulatorContract(format!(
                        "screen dims {h}x{w} != expected {FULL_H}x{FULL_W}"
                    )));
                }

                let palette = grayscale_palette(&emu.palette_rgb());
                let lives = emu.lives();
                let mut stack = Stack::new(topology.stack);
                let mut indexed = vec![0u8; FULL_H * FULL_W];
                emu.screen_indexed(&mut indexed);
                let mut first = vec![0u8; crate::topology::H * crate::topology::W];
                let indexed_arr: &[u8; FULL_H * FULL_W] =
                    indexed.as_slice().try_into().expect("fixed-size screen buffer");
                crate::observation::render_small(&mut first, indexed_arr, &palette);
                stack.fill_replicated(&first);

                bunch_emu.push(emu);
                bunch_state.push(EnvState { frame: 0, score: 0.0, lives, stack, palette });
            }
            emulators.push(bunch_emu);
            state.push(bunch_state);
        }

        log::info!(
            "fleet built: LUMP={} BUNCH={} NCPU={} CPU={} STACK={} rom={}",
            topology.lump,
            topology.bunch,
            topology.ncpu,
            topology.cpu,
            topology.stack,
            rom.display()
        );

        Ok(Fleet { emulators, state })
    }
}
