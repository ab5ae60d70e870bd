//! The worker's top-level protocol loop (spec.md §4.A, §4.B, §4.D).
//!
//! Wires every other module together: opens the shared tensors, builds the
//! emulator fleet, shakes hands with the parent, then alternates between
//! publish-initial and steady-state advance rounds until told to quit.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::emulator::Emulator;
use crate::episode::{step_env, RgbCapture};
use crate::error::VecgymError;
use crate::fleet::Fleet;
use crate::layout::{BoolTensorFile, TensorFile};
use crate::monitor::Monitor;
use crate::protocol::{ParentCommand, Pipes};
use crate::rgb::RgbChannel;
use crate::topology::{Topology, H, W};

/// Everything the bootstrap binary parsed off argv (spec.md §6).
pub struct RunConfig {
    pub prefix: String,
    pub env_id: String,
    pub rom: PathBuf,
    pub monitor_dir: String,
    pub topology: Topology,
    pub p2c_r: std::os::unix::io::RawFd,
    pub c2p_w: std::os::unix::io::RawFd,
}

fn tensor_path(prefix: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}_{suffix}"))
}

struct Tensors {
    obs0: TensorFile<u8>,
    vo0: TensorFile<f32>,
    acts: TensorFile<i32>,
    rews: TensorFile<f32>,
    news: BoolTensorFile,
    step: TensorFile<i32>,
    scor: TensorFile<f32>,
    xlast_obs0: TensorFile<u8>,
    xlast_news: BoolTensorFile,
    xlast_step: TensorFile<i32>,
    xlast_scor: TensorFile<f32>,
}

impl Tensors {
    fn open(prefix: &str, topology: &Topology) -> Result<Self, VecgymError> {
        let l = topology.lump;
        let n = topology.ncpu;
        let bu = topology.bunch;
        let st = topology.steps;
        let stack = topology.stack;
        let ring = l * n * bu * st;
        let single = l * n * bu;

        Ok(Tensors {
            obs0: TensorFile::open(&tensor_path(prefix, "obs0"), ring * H * W * stack, topology, st)?,
            vo0: TensorFile::open(&tensor_path(prefix, "vo0"), ring, topology, st)?,
            acts: TensorFile::open(&tensor_path(prefix, "acts"), ring, topology, st)?,
            rews: TensorFile::open(&tensor_path(prefix, "rews"), ring, topology, st)?,
            news: BoolTensorFile::open(&tensor_path(prefix, "news"), ring, topology, st)?,
            step: TensorFile::open(&tensor_path(prefix, "step"), ring, topology, st)?,
            scor: TensorFile::open(&tensor_path(prefix, "scor"), ring, topology, st)?,
            xlast_obs0: TensorFile::open(
                &tensor_path(prefix, "xlast_obs0"),
                single * H * W * stack,
                topology,
                1,
            )?,
            xlast_news: BoolTensorFile::open(&tensor_path(prefix, "xlast_news"), single, topology, 1)?,
            xlast_step: TensorFile::open(&tensor_path(prefix, "xlast_step"), single, topology, 1)?,
            xlast_scor: TensorFile::open(&tensor_path(prefix, "xlast_scor"), single, topology, 1)?,
        })
    }
}

fn wall_clock_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Publish the current `(l, b)` observation at ring slot 0 / xlast slot 0,
/// with `news = true` (spec.md §4.B phase 2, and the `_news[..,0]` invariant
/// after any `'0'`).
fn publish_initial<E: Emulator>(
    tensors: &mut Tensors,
    fleet: &Fleet<E>,
    rgb: Option<&mut RgbChannel>,
    l: usize,
    b: usize,
) {
    let state = &fleet.state[l][b];
    tensors.obs0.at(l, b, 0).copy_from_slice(state.stack.as_slice());
    tensors.vo0.at(l, b, 0)[0] = 1.0;
    tensors.news.set(l, b, 0, true);
    tensors.step.at(l, b, 0)[0] = 0;
    tensors.scor.at(l, b, 0)[0] = 0.0;

    // §4.F: publish-initial is also a flush point, not just every env-step.
    if let Some(chan) = rgb {
        let mut pic = [0u8; crate::rgb::RGB_BYTES];
        fleet.emulators[l][b].screen_rgb(&mut pic);
        chan.flush(&pic, &pic);
    }
}

fn do_publish_initial<E: Emulator>(
    pipes: &Pipes,
    tensors: &mut Tensors,
    fleet: &Fleet<E>,
    mut rgb: Option<&mut RgbChannel>,
    topology: &Topology,
) -> Result<Option<usize>, VecgymError> {
    for l in 0..topology.lump {
        for b in 0..topology.bunch {
            publish_initial(tensors, fleet, rgb.as_deref_mut(), l, b);
        }
        if !pipes.send_ack(l)? {
            log::error!("cpu{:02}: transport loss acking publish-initial for lump {l}", topology.cpu);
            return Ok(None);
        }
    }
    Ok(Some(0))
}

#[allow(clippy::too_many_arguments)]
fn step_lump<E: Emulator>(
    fleet: &mut Fleet<E>,
    tensors: &mut Tensors,
    mut rgb: Option<&mut RgbChannel>,
    monitor: &mut Monitor,
    topology: &Topology,
    l: usize,
    cursor: usize,
) -> Result<(), VecgymError> {
    let save = cursor + 1;
    for b in 0..topology.bunch {
        let action = tensors.acts.at(l, b, cursor)[0];
        let emu = &mut fleet.emulators[l][b];
        // Copied out before the mutable borrow below so the borrow checker
        // doesn't see two conflicting borrows of `emu`.
        let action_set: Vec<i32> = emu.minimal_action_set().to_vec();
        let state = &mut fleet.state[l][b];

        let mut capture = rgb.as_ref().map(|_| RgbCapture::default());
        let outcome = step_env(emu, state, action, topology.skip, &action_set, capture.as_mut())?;

        tensors.rews.at(l, b, cursor)[0] = outcome.rew;

        if outcome.reset_me {
            monitor.record_episode(outcome.score, outcome.frame);
        }

        if save < topology.steps {
            tensors.news.set(l, b, save, outcome.done);
            tensors.scor.at(l, b, save)[0] = outcome.score;
            tensors.step.at(l, b, save)[0] = outcome.frame;
            tensors.obs0.at(l, b, save).copy_from_slice(state.stack.as_slice());
            tensors.vo0.at(l, b, save)[0] = 1.0 - (outcome.frame as f32) / (crate::topology::LIMIT as f32);
        } else {
            tensors.xlast_news.set(l, b, 0, outcome.done);
            tensors.xlast_scor.at(l, b, 0)[0] = outcome.score;
            tensors.xlast_step.at(l, b, 0)[0] = outcome.frame;
            tensors.xlast_obs0.at(l, b, 0).copy_from_slice(state.stack.as_slice());
            // Deliberately preserved quirk: on ring overflow `_vo0` still
            // lands in slot 0 of the *primary* tensor, not `_xlast_vo0`
            // (there is no such file) — see DESIGN.md.
            tensors.vo0.at(l, b, 0)[0] = 1.0 - (outcome.frame as f32) / (crate::topology::LIMIT as f32);
        }

        if let (Some(chan), Some(cap)) = (rgb.as_mut(), capture.as_ref()) {
            chan.flush(&cap.pic1, &cap.pic2);
        }
    }
    Ok(())
}

/// Drive one worker from handshake to shutdown. Returns on `'Q'` or on any
/// transport loss (clean exit, not an error — spec.md §4.B phase 4, §7).
pub fn run<E: Emulator>(cfg: RunConfig) -> Result<(), VecgymError> {
    let topology = cfg.topology;
    let pipes = Pipes::new(cfg.p2c_r, cfg.c2p_w);
    let mut fleet = Fleet::<E>::build(&topology, &cfg.rom)?;
    let mut tensors = Tensors::open(&cfg.prefix, &topology)?;
    let mut rgb = if topology.is_single_env() {
        Some(RgbChannel::open(&tensor_path(&cfg.prefix, "rgb"), &topology)?)
    } else {
        None
    };
    let mut monitor = Monitor::open(&cfg.monitor_dir, topology.cpu, &cfg.env_id, wall_clock_secs());

    log::info!("cpu{:02}: ready, env_id={}", topology.cpu, cfg.env_id);
    if !pipes.send_ready()? {
        log::error!("cpu{:02}: transport loss sending ready byte", topology.cpu);
        return Ok(());
    }

    loop {
        match pipes.read_byte()? {
            None => {
                log::error!("cpu{:02}: transport loss waiting for initial reset", topology.cpu);
                return Ok(());
            }
            Some(byte) => match ParentCommand::parse(byte, topology.lump)? {
                ParentCommand::ResetCursor => break,
                other => {
                    return Err(VecgymError::Protocol {
                        expected: "'0' as the first command".into(),
                        got: match other {
                            ParentCommand::Quit => b'Q',
                            ParentCommand::Advance(l) => Topology::lump_token(l),
                            ParentCommand::ResetCursor => b'0',
                        },
                    })
                }
            },
        }
    }

    let Some(mut cursor) = do_publish_initial(&pipes, &mut tensors, &fleet, rgb.as_mut(), &topology)? else {
        return Ok(());
    };

    let mut l = 0usize;
    loop {
        let byte = match pipes.read_byte()? {
            Some(b) => b,
            None => {
                log::error!("cpu{:02}: transport loss in steady state", topology.cpu);
                return Ok(());
            }
        };
        match ParentCommand::parse(byte, topology.lump)? {
            ParentCommand::Quit => {
                log::info!("cpu{:02}: quit command received, shutting down", topology.cpu);
                return Ok(());
            }
            ParentCommand::ResetCursor => {
                let Some(c) = do_publish_initial(&pipes, &mut tensors, &fleet, rgb.as_mut(), &topology)? else {
                    return Ok(());
                };
                cursor = c;
                l = 0;
                continue;
            }
            ParentCommand::Advance(recv_l) => {
                if recv_l != l {
                    return Err(VecgymError::Protocol {
                        expected: format!("advance for lump {l}"),
                        got: Topology::lump_token(recv_l),
                    });
                }
                step_lump(&mut fleet, &mut tensors, rgb.as_mut(), &mut monitor, &topology, l, cursor)?;
                if !pipes.send_ack(l)? {
                    log::error!("cpu{:02}: transport loss acking advance for lump {l}", topology.cpu);
                    return Ok(());
                }
                l += 1;
                if l == topology.lump {
                    l = 0;
                    cursor += 1;
                }
            }
        }
    }
}
