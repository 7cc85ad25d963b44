//! PID allocation and PCB storage/retrieval at their fixed physical
//! addresses.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use tercio_kernel::process::pcb::{initial_kernel_esp, pcb_address, MAX_PROC};
use tercio_kernel::process::{find_free_pid, release_pid, FdKind, Pcb};
use tercio_kernel::{exit_qemu, serial_println, test_panic_handler, QemuExitCode};

#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial_println!("Starting process tests...");

    test_pcb_roundtrip_through_fixed_address();
    test_new_pcb_preopens_stdin_and_stdout();
    test_pid_exhaustion_and_release();

    serial_println!("All process tests passed!");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_pcb_roundtrip_through_fixed_address() {
    let pid = find_free_pid().expect("a free pid");
    let pcb = Pcb::new(pid, None, 0, b"arg one");

    // SAFETY: pid was just allocated and holds no live PCB.
    let stored = unsafe { pcb.store() };
    assert_eq!(stored.pid, pid);

    // SAFETY: pid's PCB was just written above.
    let fetched = unsafe { Pcb::at(pid) };
    assert_eq!(fetched.pid, pid);
    assert_eq!(&fetched.args[..fetched.args_len], b"arg one");
    assert_eq!(fetched.parent_pid, None);
    assert_eq!(fetched.terminal_id, 0);

    release_pid(pid);
}

fn test_new_pcb_preopens_stdin_and_stdout() {
    let pid = find_free_pid().expect("a free pid");
    let pcb = Pcb::new(pid, Some(0), 1, b"");

    assert!(pcb.fd_table[0].in_use);
    assert_eq!(pcb.fd_table[0].kind, Some(FdKind::Terminal));
    assert!(pcb.fd_table[1].in_use);
    assert_eq!(pcb.fd_table[1].kind, Some(FdKind::Terminal));
    for fd in &pcb.fd_table[2..] {
        assert!(!fd.in_use);
        assert_eq!(fd.kind, None);
    }

    release_pid(pid);
}

fn test_pid_exhaustion_and_release() {
    let mut held = [0usize; MAX_PROC];
    for slot in held.iter_mut() {
        *slot = find_free_pid().expect("pid should still be available");
    }
    assert!(find_free_pid().is_err());

    // Every pid's computed PCB/stack address is distinct and strictly
    // decreasing as pid increases, matching the fixed 8 KiB-slot layout.
    for window in held.windows(2) {
        let (a, b) = (window[0], window[1]);
        assert!(pcb_address(a) > pcb_address(b));
        assert!(initial_kernel_esp(a) > initial_kernel_esp(b));
    }

    for pid in held {
        release_pid(pid);
    }

    let reclaimed = find_free_pid().expect("a slot freed above should be available again");
    release_pid(reclaimed);
}
