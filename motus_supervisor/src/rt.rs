//! PREEMPT_RT setup for the control loop.
//!
//! Sequence (performed before entering the cycle loop):
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` — lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` — pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)` — RT priority.
//!
//! All calls are no-ops when the `rt` feature is disabled, so the same
//! binary logic runs in simulation and on a PREEMPT_RT kernel.

use crate::cycle::CycleError;

/// Prefault stack pages to prevent page faults during RT execution.
fn prefault_stack() {
    // Touch 1 MB of stack to force page allocation.
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        // Volatile: the write must not be optimized away.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
mod imp {
    use super::CycleError;

    pub fn mlockall() -> Result<(), CycleError> {
        use nix::sys::mman::{MlockallFlags, mlockall};
        mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
            .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
    }

    pub fn set_affinity(cpu: usize) -> Result<(), CycleError> {
        use nix::sched::{CpuSet, sched_setaffinity};
        use nix::unistd::Pid;

        let mut cpuset = CpuSet::new();
        cpuset
            .set(cpu)
            .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
        sched_setaffinity(Pid::from_raw(0), &cpuset)
            .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
    }

    pub fn set_scheduler(priority: i32) -> Result<(), CycleError> {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            return Err(CycleError::RtSetup(format!(
                "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
            )));
        }
        Ok(())
    }
}

#[cfg(not(feature = "rt"))]
mod imp {
    use super::CycleError;

    pub fn mlockall() -> Result<(), CycleError> {
        Ok(())
    }

    pub fn set_affinity(_cpu: usize) -> Result<(), CycleError> {
        Ok(())
    }

    pub fn set_scheduler(_priority: i32) -> Result<(), CycleError> {
        Ok(())
    }
}

/// Perform the full RT setup sequence.
///
/// Must be called before entering the cycle loop. Without the `rt`
/// feature every system call is a no-op and only the stack prefault runs.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    imp::mlockall()?;
    prefault_stack();
    imp::set_affinity(cpu_core)?;
    imp::set_scheduler(rt_priority)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rt_setup_without_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            assert!(rt_setup(0, 80).is_ok());
        }
    }
}
