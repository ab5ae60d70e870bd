//! Immutable run-wide size parameters (spec.md §3, §9 "Global configuration state").
//!
//! Read once from argv by the bootstrap binary and threaded through every
//! constructor by value from then on — never a process-global.

use crate::error::VecgymError;

/// Small-frame geometry shared by every tensor that stores per-pixel data.
pub const W: usize = 80;
pub const H: usize = 105;
/// Full-resolution indexed-frame geometry (`2W x 2H`).
pub const FULL_W: usize = 2 * W;
pub const FULL_H: usize = 2 * H;
/// Hard per-episode frame cap.
pub const LIMIT: i32 = 15_000;
/// Action index the parent must never leave unfilled.
pub const ACTION_SENTINEL: i32 = 0xDEAD;

#[derive(Debug, Clone, Copy)]
pub struct Topology {
    pub lump: usize,
    pub cpu: usize,
    pub ncpu: usize,
    pub bunch: usize,
    pub steps: usize,
    pub skip: usize,
    pub stack: usize,
}

impl Topology {
    pub fn new(
        lump: usize,
        cpu: usize,
        ncpu: usize,
        bunch: usize,
        steps: usize,
        skip: usize,
        stack: usize,
    ) -> Result<Self, VecgymError> {
        if lump == 0 || lump > 8 {
            return Err(VecgymError::Config(format!(
                "LUMP must be in 1..=8, got {lump}"
            )));
        }
        if cpu >= ncpu {
            return Err(VecgymError::Config(format!(
                "CPU index {cpu} out of range for NCPU={ncpu}"
            )));
        }
        if bunch == 0 || steps == 0 || skip == 0 || stack == 0 {
            return Err(VecgymError::Config(
                "BUNCH, STEPS, SKIP and STACK must all be >= 1".into(),
            ));
        }
        Ok(Topology { lump, cpu, ncpu, bunch, steps, skip, stack })
    }

    /// Global environment count across every worker in the fleet.
    pub fn nenv(&self) -> usize {
        self.lump * self.ncpu * self.bunch
    }

    /// True only in the single-environment configuration that activates the
    /// RGB side-channel (§4.F).
    pub fn is_single_env(&self) -> bool {
        self.lump == 1 && self.ncpu == 1 && self.bunch == 1 && self.steps == 1
    }

    /// `'a' + l` ack/advance token for lump `l`.
    pub fn lump_token(l: usize) -> u8 {
        b'a' + l as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_lump_over_eight() {
        assert!(Topology::new(9, 0, 1, 1, 1, 1, 1).is_err());
        assert!(Topology::new(8, 0, 1, 1, 1, 1, 1).is_ok());
    }

    #[test]
    fn nenv_multiplies_all_three_axes() {
        let t = Topology::new(2, 1, 3, 4, 8, 4, 4).unwrap();
        assert_eq!(t.nenv(), 2 * 3 * 4);
    }

    #[test]
    fn single_env_detection() {
        let t = Topology::new(1, 0, 1, 1, 1, 4, 4).unwrap();
        assert!(t.is_single_env());
        let t2 = Topology::new(1, 0, 1, 1, 2, 4, 4).unwrap();
        assert!(!t2.is_single_env());
    }
}
