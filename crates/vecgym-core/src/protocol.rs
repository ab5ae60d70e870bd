//! One-byte pipe protocol (spec.md §4.B).
//!
//! Rendering of the original's `read(fd_p2c_r, cmd, 1)` / `write(fd_c2p_w,
//! buf, 1)` calls over raw inherited file descriptors. Blocking I/O is
//! assumed, exactly as the C++ does; a short read or write is transport
//! loss (§7) and is reported to the caller rather than panicking, so the
//! steady-state loop can exit cleanly per §4.B phase 4.

use std::os::unix::io::RawFd;

use crate::error::VecgymError;
use crate::topology::Topology;

/// The command alphabet a parent may send (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentCommand {
    /// `'0'` — reset cursor to zero, re-enter publish-initial.
    ResetCursor,
    /// `'a'..'h'` — advance lump `L`.
    Advance(usize),
    /// `'Q'` — quit cleanly.
    Quit,
}

impl ParentCommand {
    pub fn parse(byte: u8, lump: usize) -> Result<Self, VecgymError> {
        match byte {
            b'0' => Ok(ParentCommand::ResetCursor),
            b'Q' => Ok(ParentCommand::Quit),
            b'a'..=b'h' => {
                let l = (byte - b'a') as usize;
                if l >= lump {
                    return Err(VecgymError::Protocol {
                        expected: format!("advance token in 'a'..'{}'", (b'a' + lump as u8 - 1) as char),
                        got: byte,
                    });
                }
                Ok(ParentCommand::Advance(l))
            }
            other => Err(VecgymError::Protocol { expected: "'0', 'a'..'h', or 'Q'".into(), got: other }),
        }
    }
}

/// The two inherited one-byte pipes.
pub struct Pipes {
    p2c_r: RawFd,
    c2p_w: RawFd,
}

impl Pipes {
    pub fn new(p2c_r: RawFd, c2p_w: RawFd) -> Self {
        Pipes { p2c_r, c2p_w }
    }

    /// Blocking single-byte read. `Ok(None)` means transport loss: EOF or a
    /// short read, which is a silent clean exit per §4.B phase 4 / §7.
    pub fn read_byte(&self) -> Result<Option<u8>, VecgymError> {
        let mut buf = [0u8; 1];
        let n = unsafe { libc::read(self.p2c_r, buf.as_mut_ptr() as *mut libc::c_void, 1) };
        if n == 1 {
            Ok(Some(buf[0]))
        } else if n < 0 {
            Err(VecgymError::Io(std::io::Error::last_os_error()))
        } else {
            Ok(None)
        }
    }

    /// Blocking single-byte write. `Ok(false)` means transport loss (short write).
    pub fn write_byte(&self, byte: u8) -> Result<bool, VecgymError> {
        let buf = [byte];
        let n = unsafe { libc::write(self.c2p_w, buf.as_ptr() as *const libc::c_void, 1) };
        if n == 1 {
            Ok(true)
        } else if n < 0 {
            Err(VecgymError::Io(std::io::Error::last_os_error()))
        } else {
            Ok(false)
        }
    }

    pub fn send_ready(&self) -> Result<bool, VecgymError> {
        self.write_byte(b'R')
    }

    pub fn send_ack(&self, l: usize) -> Result<bool, VecgymError> {
        self.write_byte(Topology::lump_token(l))
    }
}

impl Drop for Pipes {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.p2c_r);
            libc::close(self.c2p_w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reset_and_quit() {
        assert_eq!(ParentCommand::parse(b'0', 4).unwrap(), ParentCommand::ResetCursor);
        assert_eq!(ParentCommand::parse(b'Q', 4).unwrap(), ParentCommand::Quit);
    }

    #[test]
    fn parses_advance_within_lump_count() {
        assert_eq!(ParentCommand::parse(b'a', 4).unwrap(), ParentCommand::Advance(0));
        assert_eq!(ParentCommand::parse(b'd', 4).unwrap(), ParentCommand::Advance(3));
    }

    #[test]
    fn rejects_advance_past_lump_count() {
        assert!(ParentCommand::parse(b'e', 4).is_err());
    }

    #[test]
    fn eight_lumps_accepted_nine_rejected() {
        assert!(ParentCommand::parse(b'h', 8).is_ok());
        // 'i' is not in 'a'..='h' at all, so it hits the generic reject path.
        assert!(ParentCommand::parse(b'i', 8).is_err());
    }

    #[test]
    fn rejects_unknown_byte() {
        assert!(ParentCommand::parse(b'x', 4).is_err());
    }

    #[test]
    fn pipe_roundtrip_over_a_real_pipe() {
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (read_end, write_end) = (fds[0], fds[1]);
        let pipes = Pipes::new(read_end, write_end);
        assert!(pipes.write_byte(b'R').unwrap());
        assert_eq!(pipes.read_byte().unwrap(), Some(b'R'));
    }
}
