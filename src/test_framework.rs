//! No-std test framework: works by reporting results over the serial port
//! and telling QEMU to exit with a code reflecting pass/fail.

use core::{panic::PanicInfo, time::Duration};

use crate::{error::KernelError, serial_print, serial_println};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Trait all testable functions must implement.
pub trait Testable {
    fn run(&self) -> Result<(), KernelError>;
}

impl<T> Testable for T
where
    T: Fn() -> Result<(), KernelError>,
{
    fn run(&self) -> Result<(), KernelError> {
        serial_print!("{}...\t", core::any::type_name::<T>());
        match self() {
            Ok(()) => {
                serial_println!("[ok]");
                Ok(())
            }
            Err(e) => {
                serial_println!("[failed]: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub fn test_runner(tests: &[&dyn Testable]) -> ! {
    serial_println!("Running {} tests", tests.len());
    let mut passed = 0;
    let mut failed = 0;

    for test in tests {
        match test.run() {
            Ok(()) => passed += 1,
            Err(_) => failed += 1,
        }
    }

    serial_println!("\nTest Results: {} passed, {} failed", passed, failed);
    exit_qemu(if failed == 0 {
        QemuExitCode::Success
    } else {
        QemuExitCode::Failed
    })
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed)
}

/// Tell QEMU's `isa-debug-exit` device (port `0xf4`) to shut down with
/// `exit_code`. Never returns: QEMU terminates before the next instruction.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    #[cfg(target_os = "none")]
    {
        // SAFETY: writing to the debug-exit port is only reachable from a
        // QEMU instance booted with `-device isa-debug-exit,iobase=0xf4`,
        // which this kernel's `.cargo/config.toml` test runner always passes.
        unsafe { crate::arch::x86::port::outb(0xf4, exit_code as u32 as u8) };
        loop {
            core::hint::spin_loop();
        }
    }
    #[cfg(not(target_os = "none"))]
    {
        let _ = exit_code;
        unreachable!("exit_qemu is only meaningful on the bare-metal test target")
    }
}

/// Define a `#[test_case]` entry whose body returns `Result<(), KernelError>`.
#[macro_export]
macro_rules! kernel_test {
    ($name:ident, $test:expr) => {
        #[test_case]
        const $name: &dyn $crate::test_framework::Testable =
            &|| -> Result<(), $crate::error::KernelError> { $test };
    };
}

#[macro_export]
macro_rules! kernel_assert {
    ($cond:expr) => {
        if !$cond {
            panic!("assertion failed: {}", stringify!($cond));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            panic!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! kernel_assert_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            panic!(
                "assertion failed: {} != {}\n  left: {:?}\n right: {:?}",
                stringify!($left),
                stringify!($right),
                $left,
                $right
            );
        }
    };
}

// ===== Benchmark infrastructure =====

/// Read the CPU's timestamp counter. Used only by [`BenchmarkRunner`]; not
/// precise enough to drive anything timing-sensitive in the kernel proper.
#[cfg(target_arch = "x86")]
fn read_timestamp() -> u64 {
    // SAFETY: RDTSC is available on every CPU this kernel's Multiboot
    // trampoline can boot on.
    unsafe {
        let lo: u32;
        let hi: u32;
        core::arch::asm!("rdtsc", out("eax") lo, out("edx") hi, options(nomem, nostack));
        ((hi as u64) << 32) | lo as u64
    }
}

#[cfg(not(target_arch = "x86"))]
fn read_timestamp() -> u64 {
    0
}

fn cycles_to_ns(cycles: u64) -> u64 {
    const ASSUMED_CPU_FREQ_GHZ: u64 = 2;
    cycles / ASSUMED_CPU_FREQ_GHZ
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkResult {
    pub name: &'static str,
    pub iterations: u64,
    pub total_time: Duration,
    pub avg_time_ns: u64,
    pub min_time_ns: u64,
    pub max_time_ns: u64,
}

pub struct BenchmarkRunner {
    iterations: u64,
    warmup_iterations: u64,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkRunner {
    pub const fn new() -> Self {
        Self {
            iterations: 1000,
            warmup_iterations: 100,
        }
    }

    pub fn run_benchmark<F>(&self, name: &'static str, mut f: F) -> BenchmarkResult
    where
        F: FnMut(),
    {
        serial_print!("{}...\t", name);

        for _ in 0..self.warmup_iterations {
            f();
        }

        let mut min_cycles = u64::MAX;
        let mut max_cycles = 0u64;
        let mut total_cycles = 0u64;

        for _ in 0..self.iterations {
            let start = read_timestamp();
            f();
            let elapsed = read_timestamp().saturating_sub(start);

            total_cycles += elapsed;
            min_cycles = min_cycles.min(elapsed);
            max_cycles = max_cycles.max(elapsed);
        }

        let avg_cycles = total_cycles / self.iterations;
        let result = BenchmarkResult {
            name,
            iterations: self.iterations,
            total_time: Duration::from_nanos(cycles_to_ns(total_cycles)),
            avg_time_ns: cycles_to_ns(avg_cycles),
            min_time_ns: cycles_to_ns(min_cycles),
            max_time_ns: cycles_to_ns(max_cycles),
        };

        serial_println!("[ok] avg: {} ns", result.avg_time_ns);
        result
    }
}

#[macro_export]
macro_rules! kernel_bench {
    ($name:ident, $body:expr) => {
        #[test_case]
        fn $name() {
            use $crate::test_framework::BenchmarkRunner;
            let runner = BenchmarkRunner::new();
            let result = runner.run_benchmark(stringify!($name), || $body);
            serial_println!(
                "  Min: {} ns, Max: {} ns",
                result.min_time_ns,
                result.max_time_ns
            );
        }
    };
}
