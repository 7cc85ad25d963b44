//! Read-only indexed filesystem: a boot block (dentry count, inode count,
//! data-block count, then up to 63 64-byte dentries), followed by `N`
//! 4 KiB inode blocks, followed by `D` 4 KiB data blocks.
//!
//! Grounded on `filesystem.c`/`filesystem.h`: the whole image is addressed
//! relative to the single boot-module physical address handed in by
//! [`crate::arch::x86::multiboot`], dentries are cached in a fixed-size
//! array at boot (never re-read from the image afterward), and
//! `dentries_read` -- the directory-read cursor -- is preserved here as the
//! single global counter it is in the original, not a per-process field.
//! Multiple concurrent directory reads (from different processes) observe
//! and advance the same cursor.

use spin::Mutex;

use crate::error::FsError;

pub const MAX_DENTRIES: usize = 63;
pub const FILENAME_LEN: usize = 32;
const BOOT_BLOCK_HEADER: usize = 64;
const BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Rtc = 0,
    Directory = 1,
    Regular = 2,
}

impl FileType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileType::Rtc),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dentry {
    pub name: [u8; FILENAME_LEN],
    pub name_len: usize,
    pub file_type: FileType,
    pub inode_num: u32,
}

impl Dentry {
    fn name_str(&self) -> &[u8] {
        &self.name[..self.name_len]
    }
}

struct FsState {
    dentries: [Option<Dentry>; MAX_DENTRIES],
    num_dentries: usize,
    num_inodes: u32,
    inode_addr: usize,
    data_addr: usize,
    dentries_read: usize,
}

impl FsState {
    const fn empty() -> Self {
        FsState {
            dentries: [None; MAX_DENTRIES],
            num_dentries: 0,
            num_inodes: 0,
            inode_addr: 0,
            data_addr: 0,
            dentries_read: 0,
        }
    }
}

static STATE: Mutex<FsState> = Mutex::new(FsState::empty());

fn read_u32(addr: usize) -> u32 {
    // SAFETY: callers only pass offsets within the boot module range
    // handed in by the multiboot loader, mapped for the kernel's lifetime.
    unsafe { core::ptr::read_unaligned(addr as *const u32) }
}

fn read_byte(addr: usize) -> u8 {
    // SAFETY: same as read_u32.
    unsafe { core::ptr::read_volatile(addr as *const u8) }
}

/// Parse the boot block at `mods_addr` and cache every dentry it names.
pub fn init(mods_addr: usize) {
    let mut st = STATE.lock();
    let dentry_addr = mods_addr + BOOT_BLOCK_HEADER;
    let inode_addr = mods_addr + BLOCK_SIZE;

    let num_dentries = read_u32(mods_addr) as usize;
    let num_inodes = read_u32(mods_addr + 4);

    st.num_dentries = core::cmp::min(num_dentries, MAX_DENTRIES);
    st.num_inodes = num_inodes;
    st.inode_addr = inode_addr;
    st.data_addr = inode_addr + BLOCK_SIZE * num_inodes as usize;

    for i in 0..st.num_dentries {
        let entry_addr = dentry_addr + i * 64;
        let mut name = [0u8; FILENAME_LEN];
        let mut name_len = 0;
        for (j, slot) in name.iter_mut().enumerate() {
            let b = read_byte(entry_addr + j);
            if b == 0 {
                break;
            }
            *slot = b;
            name_len = j + 1;
        }
        let file_type = FileType::from_raw(read_u32(entry_addr + 32));
        let inode_num = read_u32(entry_addr + 36);
        st.dentries[i] = file_type.map(|file_type| Dentry {
            name,
            name_len,
            file_type,
            inode_num,
        });
    }
    st.dentries_read = 0;
}

/// `read_dentry_by_index`: look up a cached dentry by its boot-block slot.
pub fn dentry_by_index(index: usize) -> Result<Dentry, FsError> {
    let st = STATE.lock();
    if index >= st.num_dentries {
        return Err(FsError::NoSuchFile);
    }
    st.dentries[index].ok_or(FsError::NoSuchFile)
}

/// `read_dentry_by_name`: linear scan matching on exact length + bytes.
pub fn dentry_by_name(name: &[u8]) -> Result<Dentry, FsError> {
    let st = STATE.lock();
    for slot in st.dentries[..st.num_dentries].iter().flatten() {
        if slot.name_str() == name {
            return Ok(*slot);
        }
    }
    Err(FsError::NoSuchFile)
}

/// `read_data`: copy up to `buf.len()` bytes of inode `inode`'s data
/// starting at byte `offset`, walking the inode's block-index list one
/// 4 KiB block at a time. Returns the number of bytes actually copied,
/// which is less than `buf.len()` at end-of-file and `0` for an
/// out-of-range inode (mirroring the original's unchecked success path
/// rather than surfacing it as an error).
pub fn read_data(inode: u32, offset: u32, buf: &mut [u8]) -> usize {
    let st = STATE.lock();
    if inode >= st.num_inodes {
        return 0;
    }
    let inode_addr = st.inode_addr + inode as usize * BLOCK_SIZE;
    let length = read_u32(inode_addr);
    if offset > length {
        return 0;
    }

    let mut bytes_read = 0;
    while bytes_read < buf.len() {
        let file_pos = offset as usize + bytes_read;
        if file_pos as u32 >= length {
            break;
        }
        let block_index = file_pos / BLOCK_SIZE;
        let block_num = read_u32(inode_addr + 4 + (block_index + 1) * 4);
        let block_addr = st.data_addr + BLOCK_SIZE * block_num as usize;
        buf[bytes_read] = read_byte(block_addr + file_pos % BLOCK_SIZE);
        bytes_read += 1;
    }
    bytes_read
}

/// `read_file`: resolve `name` to an inode, then [`read_data`] at `offset`.
pub fn read_file(name: &[u8], offset: u32, buf: &mut [u8]) -> Result<usize, FsError> {
    let dentry = dentry_by_name(name)?;
    Ok(read_data(dentry.inode_num, offset, buf))
}

/// `read_directory`: copy the next unread dentry's name into `buf` (capped
/// at 32 bytes) and advance the global cursor. Returns `0` once every
/// dentry has been listed, then resets the cursor for the next `ls`.
///
/// The cursor is a single kernel-wide counter, not per-file-descriptor or
/// per-process: two processes alternating directory reads interleave the
/// listing rather than each seeing it from the start. Preserved as
/// observed in the original rather than "fixed" into per-fd state.
pub fn read_directory(buf: &mut [u8]) -> usize {
    let mut st = STATE.lock();
    if st.dentries_read >= st.num_dentries {
        st.dentries_read = 0;
        return 0;
    }
    let dentry = st.dentries[st.dentries_read].expect("cached dentry slot");
    let copy_len = core::cmp::min(buf.len(), core::cmp::min(FILENAME_LEN, dentry.name_len));
    buf[..copy_len].copy_from_slice(&dentry.name[..copy_len]);
    st.dentries_read += 1;
    copy_len
}

/// `execute_executable_check`: true only if bytes 1..4 of `name` spell
/// "ELF". Byte 0 (the `0x7F` magic byte real ELF headers carry) is never
/// read or checked, matching `ELF_OFFSET`/`ELF_LENGTH` in the original --
/// preserved rather than corrected, since a 3-byte file containing exactly
/// "ELF" at offset 1 is (by this kernel's contract) a valid executable.
pub fn is_executable(name: &[u8]) -> bool {
    let mut buf = [0u8; 3];
    match read_file(name, 1, &mut buf) {
        Ok(n) if n == 3 => &buf == b"ELF",
        _ => false,
    }
}

/// `execute_context_switch`'s entry-point read: bytes 24..28 of the file,
/// little-endian.
pub fn entry_point(name: &[u8]) -> Result<u32, FsError> {
    let mut buf = [0u8; 4];
    let n = read_file(name, 24, &mut buf)?;
    if n < 4 {
        return Err(FsError::NoSuchFile);
    }
    Ok(u32::from_le_bytes(buf))
}

/// `execute_user_level_program_loader`: copy the whole program image to the
/// fixed user load address.
pub fn load_program(name: &[u8], dest: &mut [u8]) -> Result<usize, FsError> {
    read_file(name, 0, dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_rejects_out_of_range_values() {
        assert!(FileType::from_raw(3).is_none());
        assert!(FileType::from_raw(0).is_some());
    }
}
