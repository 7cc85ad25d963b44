//! PID allocation: a fixed-size in-use bitmap, grounded on `pid_array` in
//! `systemcalls.c` (`execute_find_pid`/`halt`'s slot-clearing write).

use spin::Mutex;

use super::pcb::MAX_PROC;
use crate::error::ProcessError;

static PID_ARRAY: Mutex<[bool; MAX_PROC]> = Mutex::new([false; MAX_PROC]);

/// `execute_find_pid`: lowest-numbered free slot, or [`ProcessError::NoFreePid`]
/// if all [`MAX_PROC`] slots are in use.
pub fn find_free_pid() -> Result<usize, ProcessError> {
    let mut table = PID_ARRAY.lock();
    for (pid, in_use) in table.iter_mut().enumerate() {
        if !*in_use {
            *in_use = true;
            return Ok(pid);
        }
    }
    Err(ProcessError::NoFreePid)
}

/// Release `pid`'s slot back to the free pool (`halt`'s `pid_array[...] = 0`).
pub fn release_pid(pid: usize) {
    PID_ARRAY.lock()[pid] = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_slot_and_releases() {
        let a = find_free_pid().unwrap();
        let b = find_free_pid().unwrap();
        assert!(b > a);
        release_pid(a);
        let c = find_free_pid().unwrap();
        assert_eq!(c, a);
        release_pid(b);
        release_pid(c);
    }

    #[test]
    fn reports_no_free_pid_once_exhausted() {
        let mut held = [0usize; MAX_PROC];
        for slot in held.iter_mut() {
            *slot = find_free_pid().unwrap();
        }
        assert_eq!(find_free_pid(), Err(ProcessError::NoFreePid));
        for pid in held {
            release_pid(pid);
        }
    }
}
