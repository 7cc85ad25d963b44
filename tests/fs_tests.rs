//! Exercises the read-only filesystem against a hand-built boot block,
//! standing in for the image GRUB would normally hand in as a boot module.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use tercio_kernel::fs;
use tercio_kernel::{exit_qemu, serial_println, test_panic_handler, QemuExitCode};

const BLOCK_SIZE: usize = 4096;

/// One boot block + one inode block + one data block, matching the layout
/// `fs::init` expects: dentry count, inode count, data-block count, then
/// up to 63 64-byte dentries, then `N` 4 KiB inode blocks, then data.
#[repr(align(4))]
struct Image([u8; BLOCK_SIZE * 3]);

static mut IMAGE: Image = Image([0; BLOCK_SIZE * 3]);

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_dentry(buf: &mut [u8], index: usize, name: &[u8], file_type: u32, inode: u32) {
    let base = 64 + index * 64;
    buf[base..base + name.len()].copy_from_slice(name);
    write_u32(buf, base + 32, file_type);
    write_u32(buf, base + 36, inode);
}

/// Build a two-dentry image: a regular "hello" file whose contents are
/// byte 0 = 0x7F (deliberately *not* checked, per `is_executable`'s
/// preserved quirk), bytes 1..4 = "ELF", then a 4-byte little-endian
/// entry point at offset 24; and a directory-listed-only "cat" file.
fn build_image() -> usize {
    // SAFETY: single-threaded test binary, no concurrent access to IMAGE.
    let buf = unsafe { &mut *core::ptr::addr_of_mut!(IMAGE.0) };
    buf.fill(0);

    write_u32(buf, 0, 2); // num_dentries
    write_u32(buf, 4, 1); // num_inodes

    write_dentry(buf, 0, b"hello", 2, 0);
    write_dentry(buf, 1, b"console", 0, 0);

    let inode_addr = BLOCK_SIZE;
    let data_addr = inode_addr + BLOCK_SIZE;

    let file_len = 28u32;
    write_u32(buf, inode_addr, file_len);
    write_u32(buf, inode_addr + 4, 0); // block 0 index

    let data = &mut buf[data_addr..data_addr + BLOCK_SIZE];
    data[0] = 0x7F;
    data[1..4].copy_from_slice(b"ELF");
    write_u32(data, 24, 0x0804_8000);

    buf.as_ptr() as usize
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial_println!("Starting filesystem tests...");

    let mods_addr = build_image();
    fs::init(mods_addr);

    test_dentry_lookup_by_name_and_index();
    test_read_file_contents();
    test_is_executable_ignores_byte_zero();
    test_entry_point_reads_little_endian();
    test_read_directory_cursor_is_global();
    test_unknown_file_lookup_fails();

    serial_println!("All filesystem tests passed!");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_dentry_lookup_by_name_and_index() {
    let by_name = fs::dentry_by_name(b"hello").expect("hello dentry");
    let by_index = fs::dentry_by_index(0).expect("dentry 0");
    assert_eq!(by_name.inode_num, by_index.inode_num);
    assert_eq!(by_name.file_type, fs::FileType::Regular);

    let console = fs::dentry_by_name(b"console").expect("console dentry");
    assert_eq!(console.file_type, fs::FileType::Rtc);
}

fn test_read_file_contents() {
    let mut buf = [0u8; 4];
    let n = fs::read_file(b"hello", 24, &mut buf).expect("read entry point bytes");
    assert_eq!(n, 4);
    assert_eq!(u32::from_le_bytes(buf), 0x0804_8000);
}

fn test_is_executable_ignores_byte_zero() {
    // Byte 0 is 0x7F, nothing like 'E'; bytes 1..4 spell "ELF". The check
    // only inspects the latter, so this still reports executable.
    assert!(fs::is_executable(b"hello"));
    assert!(!fs::is_executable(b"console"));
}

fn test_entry_point_reads_little_endian() {
    let entry = fs::entry_point(b"hello").expect("entry point");
    assert_eq!(entry, 0x0804_8000);
}

fn test_read_directory_cursor_is_global() {
    // Re-init to reset the cursor for this test's own expectations.
    let mods_addr = build_image();
    fs::init(mods_addr);

    let mut buf = [0u8; 32];
    let n1 = fs::read_directory(&mut buf);
    assert_eq!(n1, b"hello".len());
    assert_eq!(&buf[..n1], b"hello");

    let n2 = fs::read_directory(&mut buf);
    assert_eq!(n2, b"console".len());
    assert_eq!(&buf[..n2], b"console");

    // Every dentry has now been listed once; the cursor wraps to 0.
    let n3 = fs::read_directory(&mut buf);
    assert_eq!(n3, 0);

    // The next read starts the listing over, proving the cursor is a
    // single counter rather than per-caller state.
    let n4 = fs::read_directory(&mut buf);
    assert_eq!(&buf[..n4], b"hello");
}

fn test_unknown_file_lookup_fails() {
    assert!(fs::dentry_by_name(b"nonexistent").is_err());
    let mut buf = [0u8; 4];
    assert!(fs::read_file(b"nonexistent", 0, &mut buf).is_err());
}
