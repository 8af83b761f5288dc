// ─── Executable Architecture Probe ───
// Classifies a Windows executable as 32- or 64-bit by reading its DOS
// and PE headers. The file is never loaded, mapped, or executed.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Instruction-set family a native executable targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Architecture {
    #[serde(rename = "32")]
    ThirtyTwoBit,
    #[serde(rename = "64")]
    SixtyFourBit,
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::ThirtyTwoBit => write!(f, "32"),
            Architecture::SixtyFourBit => write!(f, "64"),
            Architecture::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of probing one executable header.
///
/// `is_valid == false` means the file could not be read or is not a
/// well-formed executable; `architecture` is `Unknown` in that case.
/// A valid executable of a machine type this tool does not special-case
/// (ARM64, Itanium, ...) keeps `is_valid == true` with `Unknown`.
#[derive(Debug, Clone)]
pub struct ArchProbe {
    pub architecture: Architecture,
    pub is_valid: bool,
    pub error: Option<String>,
}

const DOS_MAGIC: [u8; 2] = *b"MZ";
const PE_MAGIC: [u8; 4] = *b"PE\0\0";
/// Location of the little-endian u32 that points at the PE signature.
const PE_OFFSET_FIELD: u64 = 0x3C;
// An e_lfanew below 0x40 would overlap the DOS header itself; anything
// past 16 MiB is not a header offset any real linker emits.
const MIN_PE_OFFSET: u32 = 0x40;
const MAX_PE_OFFSET: u32 = 0x00FF_FFFF;

const MACHINE_I386: u16 = 0x014C;
const MACHINE_AMD64: u16 = 0x8664;

/// Probe an executable's header and classify its target architecture.
///
/// Never returns an error: open/read/parse failures surface as an
/// invalid probe with a human-readable message, so callers can treat
/// "cannot classify" uniformly as "cannot install".
pub fn classify(path: &Path) -> ArchProbe {
    match read_machine_code(path) {
        Ok(machine) => {
            let architecture = match machine {
                MACHINE_I386 => Architecture::ThirtyTwoBit,
                MACHINE_AMD64 => Architecture::SixtyFourBit,
                other => {
                    debug!("Unrecognized machine code {:#06x} in {:?}", other, path);
                    Architecture::Unknown
                }
            };
            ArchProbe {
                architecture,
                is_valid: true,
                error: None,
            }
        }
        Err(error) => ArchProbe {
            architecture: Architecture::Unknown,
            is_valid: false,
            error: Some(error),
        },
    }
}

/// Walk DOS header -> PE signature -> COFF machine field.
///
/// All reads go through one short-lived handle that is dropped on every
/// exit path; only the header region is ever touched.
fn read_machine_code(path: &Path) -> Result<u16, String> {
    let mut file =
        File::open(path).map_err(|e| format!("cannot open executable {:?}: {}", path, e))?;

    let mut dos_magic = [0u8; 2];
    file.read_exact(&mut dos_magic)
        .map_err(|e| format!("cannot read DOS header of {:?}: {}", path, e))?;
    if dos_magic != DOS_MAGIC {
        return Err(format!("{:?} is not an executable (no MZ signature)", path));
    }

    file.seek(SeekFrom::Start(PE_OFFSET_FIELD))
        .map_err(|e| format!("cannot seek in {:?}: {}", path, e))?;
    let mut offset_bytes = [0u8; 4];
    file.read_exact(&mut offset_bytes)
        .map_err(|e| format!("cannot read PE offset field of {:?}: {}", path, e))?;
    let pe_offset = u32::from_le_bytes(offset_bytes);
    if !(MIN_PE_OFFSET..=MAX_PE_OFFSET).contains(&pe_offset) {
        return Err(format!(
            "{:?} has an implausible PE header offset {:#x}",
            path, pe_offset
        ));
    }

    file.seek(SeekFrom::Start(u64::from(pe_offset)))
        .map_err(|e| format!("cannot seek to PE header of {:?}: {}", path, e))?;
    let mut pe_magic = [0u8; 4];
    file.read_exact(&mut pe_magic)
        .map_err(|e| format!("cannot read PE signature of {:?}: {}", path, e))?;
    if pe_magic != PE_MAGIC {
        return Err(format!("{:?} has no PE signature at {:#x}", path, pe_offset));
    }

    let mut machine_bytes = [0u8; 2];
    file.read_exact(&mut machine_bytes)
        .map_err(|e| format!("cannot read machine field of {:?}: {}", path, e))?;
    Ok(u16::from_le_bytes(machine_bytes))
}
