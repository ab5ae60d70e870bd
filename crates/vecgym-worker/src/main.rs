//! Bootstrap binary (spec.md §6): parses argv, wires up logging, and hands
//! off to [`vecgym_core::run`] with `gb_core::GbCore` as the concrete
//! emulator.

use std::path::PathBuf;

use vecgym_core::{RunConfig, Topology};

const ARGV_LEN: usize = 14;

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    if argv.len() < ARGV_LEN {
        eprintln!("I need more command line arguments!");
        std::process::exit(1);
    }

    let prefix = argv[1].clone();
    let env_id = argv[2].clone();
    let rom = PathBuf::from(&argv[3]);
    let monitor_dir = argv[4].clone();
    let lump: usize = argv[5].parse().unwrap_or(0);
    let cpu: usize = argv[6].parse().unwrap_or(0);
    let ncpu: usize = argv[7].parse().unwrap_or(0);
    let bunch: usize = argv[8].parse().unwrap_or(0);
    let steps: usize = argv[9].parse().unwrap_or(0);
    let skip: usize = argv[10].parse().unwrap_or(0);
    let stack: usize = argv[11].parse().unwrap_or(0);
    let p2c_r: i32 = argv[12].parse().unwrap_or(-1);
    let c2p_w: i32 = argv[13].parse().unwrap_or(-1);

    let topology = match Topology::new(lump, cpu, ncpu, bunch, steps, skip, stack) {
        Ok(t) => t,
        Err(e) => {
            log::error!("bad topology arguments: {e}");
            std::process::exit(1);
        }
    };

    let cfg = RunConfig { prefix, env_id, rom, monitor_dir, topology, p2c_r, c2p_w };

    if let Err(e) = vecgym_core::run::<gb_core::GbCore>(cfg) {
        log::error!("cpu{:02}: fatal: {e}", topology.cpu);
        std::process::exit(1);
    }
}
