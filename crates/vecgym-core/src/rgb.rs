//! Optional full-resolution RGB side-channel (spec.md §4.F).
//!
//! Active only in single-environment mode (`LUMP=NCPU=BUNCH=STEPS=1`).
//! Captures the same last-two-raw-frames schedule as the grayscale
//! pipeline and publishes `max(pic1, pic2)` byte-wise on every flush.

use std::path::Path;

use crate::error::VecgymError;
use crate::layout::TensorFile;
use crate::topology::{Topology, FULL_H, FULL_W};

pub const RGB_BYTES: usize = 3 * FULL_H * FULL_W;

pub struct RgbChannel {
    tensor: TensorFile<u8>,
}

impl RgbChannel {
    pub fn open(path: &Path, topology: &Topology) -> Result<Self, VecgymError> {
        debug_assert!(topology.is_single_env());
        // A single (1,0,1) replica, so `replica_steps=1` gives chunk == RGB_BYTES.
        let tensor = TensorFile::open(path, RGB_BYTES, topology, 1)?;
        Ok(RgbChannel { tensor })
    }

    /// Write `max(pic1[i], pic2[i])` for every byte into the mapped region.
    pub fn flush(&mut self, pic1: &[u8; RGB_BYTES], pic2: &[u8; RGB_BYTES]) {
        let dst = self.tensor.at(0, 0, 0);
        for i in 0..RGB_BYTES {
            dst[i] = pic1[i].max(pic2[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flush_writes_byte_max() {
        let topo = Topology::new(1, 0, 1, 1, 1, 4, 4).unwrap();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; RGB_BYTES]).unwrap();
        f.flush().unwrap();
        let mut chan = RgbChannel::open(f.path(), &topo).unwrap();
        let pic1 = [10u8; RGB_BYTES];
        let pic2 = [20u8; RGB_BYTES];
        chan.flush(&pic1, &pic2);
        assert!(chan.tensor.at(0, 0, 0).iter().all(|&v| v == 20));
    }
}
