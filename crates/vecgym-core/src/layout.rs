//! Layout / index engine (spec.md §4.A).
//!
//! Mirrors `MemMap<T>` from the original `ale_vecgym_executable.cpp`: open a
//! file read-write, `mmap` it `MAP_SHARED`, validate its on-disk length
//! against the expected element count, and hand back a typed chunk for a
//! given `(lump, bunch-slot, cursor)` coordinate. Grounded on
//! `examples/brevis-network-pico/vm/src/emulator/riscv/memory.rs`'s use of
//! `memmap2`/`libc` for file-backed typed storage.

use std::fs::OpenOptions;
use std::path::Path;

use bytemuck::Pod;
use memmap2::MmapMut;

use crate::error::VecgymError;
use crate::topology::Topology;

/// A memory-mapped tensor of element type `T`, addressable by
/// `(lump, bunch-slot, cursor)`.
///
/// `replica_steps` is `STEPS` for the ring-shaped tensors (`_obs0`, `_acts`,
/// ...) and `1` for the parallel `_xlast_*` family — see spec.md §3.
pub struct TensorFile<T> {
    mmap: MmapMut,
    chunk: usize,
    replica_steps: usize,
    ncpu: usize,
    bunch: usize,
    cpu: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Pod> TensorFile<T> {
    /// `total_elements` is the flat element count the file is expected to
    /// hold — i.e. `LUMP * NCPU * BUNCH * replica_steps * inner_chunk`.
    pub fn open(
        path: &Path,
        total_elements: usize,
        topology: &Topology,
        replica_steps: usize,
    ) -> Result<Self, VecgymError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let expected = (total_elements * std::mem::size_of::<T>()) as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(VecgymError::Layout {
                file: path.display().to_string(),
                expected,
                actual,
            });
        }
        let denom = topology.lump * topology.ncpu * topology.bunch * replica_steps;
        if denom == 0 || total_elements % denom != 0 {
            return Err(VecgymError::NonDivisible { file: path.display().to_string() });
        }
        let chunk = total_elements / denom;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        log::debug!(
            "mapped {} ({} elements, chunk={chunk}, replica_steps={replica_steps})",
            path.display(),
            total_elements
        );
        Ok(TensorFile {
            mmap,
            chunk,
            replica_steps,
            ncpu: topology.ncpu,
            bunch: topology.bunch,
            cpu: topology.cpu,
            _marker: std::marker::PhantomData,
        })
    }

    fn offset(&self, l: usize, b: usize, cursor: usize) -> usize {
        self.chunk
            * (l * self.ncpu * self.bunch * self.replica_steps
                + self.cpu * self.bunch * self.replica_steps
                + b * self.replica_steps
                + cursor)
    }

    /// Typed slice of length `chunk` for this worker's plane at `(l, b, cursor)`.
    pub fn at(&mut self, l: usize, b: usize, cursor: usize) -> &mut [T] {
        let start = self.offset(l, b, cursor);
        let bytes: &mut [u8] = &mut self.mmap;
        let all: &mut [T] = bytemuck::cast_slice_mut(bytes);
        &mut all[start..start + self.chunk]
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk
    }
}

/// `bool` is not a `bytemuck::Pod` type (not every byte pattern is a valid
/// `bool`), so the `_news` family maps onto a `u8`-backed tensor with an
/// explicit 0/1 convention instead of transmuting raw mmap bytes into
/// `&mut [bool]`, which would be unsound against a foreign writer.
pub struct BoolTensorFile(TensorFile<u8>);

impl BoolTensorFile {
    pub fn open(
        path: &Path,
        total_elements: usize,
        topology: &Topology,
        replica_steps: usize,
    ) -> Result<Self, VecgymError> {
        Ok(BoolTensorFile(TensorFile::open(path, total_elements, topology, replica_steps)?))
    }

    pub fn set(&mut self, l: usize, b: usize, cursor: usize, value: bool) {
        self.0.at(l, b, cursor)[0] = value as u8;
    }

    pub fn get(&mut self, l: usize, b: usize, cursor: usize) -> bool {
        self.0.at(l, b, cursor)[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn topo() -> Topology {
        Topology::new(2, 0, 1, 3, 4, 2, 4).unwrap()
    }

    fn sized_file(bytes: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; bytes]).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn rejects_wrong_size() {
        let t = topo();
        let f = sized_file(4);
        let err = TensorFile::<f32>::open(f.path(), 10, &t, t.steps);
        assert!(matches!(err, Err(VecgymError::Layout { .. })));
    }

    #[test]
    fn rejects_non_divisible_length() {
        let t = topo();
        // total elements not divisible by LUMP*NCPU*BUNCH*steps = 2*1*3*4 = 24
        let total = 25usize;
        let f = sized_file(total * std::mem::size_of::<f32>());
        let err = TensorFile::<f32>::open(f.path(), total, &t, t.steps);
        assert!(matches!(err, Err(VecgymError::NonDivisible { .. })));
    }

    #[test]
    fn offset_formula_matches_spec() {
        let t = topo();
        let total = t.lump * t.ncpu * t.bunch * t.steps; // chunk == 1
        let f = sized_file(total * std::mem::size_of::<i32>());
        let mut tf = TensorFile::<i32>::open(f.path(), total, &t, t.steps).unwrap();
        for l in 0..t.lump {
            for b in 0..t.bunch {
                for c in 0..t.steps {
                    assert_eq!(
                        tf.offset(l, b, c),
                        1 * (l * t.ncpu * t.bunch * t.steps
                            + t.cpu * t.bunch * t.steps
                            + b * t.steps
                            + c)
                    );
                }
            }
        }
        tf.at(1, 2, 3)[0] = 42;
        assert_eq!(tf.at(1, 2, 3)[0], 42);
    }

    #[test]
    fn bool_tensor_roundtrips() {
        let t = Topology::new(1, 0, 1, 1, 2, 1, 1).unwrap();
        let total = t.lump * t.ncpu * t.bunch * t.steps;
        let f = sized_file(total);
        let mut bt = BoolTensorFile::open(f.path(), total, &t, t.steps).unwrap();
        assert!(!bt.get(0, 0, 0));
        bt.set(0, 0, 1, true);
        assert!(bt.get(0, 0, 1));
        assert!(!bt.get(0, 0, 0));
    }
}
