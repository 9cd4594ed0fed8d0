use std::io;
use std::path::Path;

use miette::{miette, Report, Severity};

// Image load errors

pub fn load_failed(path: &Path, err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::open",
        help = "check that the path points to a readable `.lc3` or `.obj` image",
        "Failed to read image file `{}`: {err}",
        path.display(),
    )
}

pub fn load_no_origin(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::origin",
        help = "an image starts with a 16-bit big-endian origin word",
        "Image file `{}` is too short to contain an origin word",
        path.display(),
    )
}

// Runtime faults. These abort execution; the LC3 contract has no recovery
// from an illegal instruction.

pub fn illegal_opcode(instr: u16, addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::illegal_opcode",
        help = "RTI and opcode 0b1101 are reserved and cannot be executed by user programs",
        "Illegal instruction 0x{instr:04x} at address 0x{addr:04x}",
    )
}

pub fn unknown_trap(vect: u16, addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::unknown_trap",
        help = "valid trap vectors are 0x20 through 0x25",
        "Unknown trap vector 0x{vect:02x} at address 0x{addr:04x}",
    )
}

pub fn console_failed(err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::console",
        "Console I/O failed: {err}",
    )
}
