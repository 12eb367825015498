//  SEMAPHORE.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 11:14:02
//  Last edited:
//    14 Jan 2023, 12:24:50
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the counting semaphore that the main thread and the
//!   render thread hand frames off with. Built on a mutex-guarded
//!   counter and a condition variable.
//

use std::sync::{Condvar, Mutex};


/***** LIBRARY *****/
/// A counting semaphore with post/wait semantics.
///
/// Every frame slot carries two of these: a `wait` semaphore (initial count 1) that the main thread posts when the frame is prepared, and a `signal` semaphore (initial count 0) that the render thread posts when it is done with the frame.
pub struct Semaphore {
    /// The current count.
    count : Mutex<u32>,
    /// The condition variable that waiters sleep on.
    cond  : Condvar,
}

impl Semaphore {
    /// Constructor for the Semaphore.
    ///
    /// # Arguments
    /// - `count`: The initial count of the semaphore.
    pub fn new(count: u32) -> Self {
        Self {
            count : Mutex::new(count),
            cond  : Condvar::new(),
        }
    }



    /// Increments the count, waking up one waiter if any.
    pub fn post(&self) {
        let mut count = self.count.lock().expect("Could not lock semaphore count");
        *count += 1;
        self.cond.notify_one();
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("Could not lock semaphore count");
        while *count == 0 {
            count = self.cond.wait(count).expect("Could not wait on semaphore");
        }
        *count -= 1;
    }

    /// Decrements the count if it is positive, without blocking.
    ///
    /// # Returns
    /// True if the count was decremented, or false if it was zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().expect("Could not lock semaphore count");
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// Overwrites the count.
    ///
    /// A counting semaphore with outstanding posts cannot simply be re-used after the frame protocol restarts, so the resize handshake resets both per-frame semaphores to their initial counts with this.
    pub fn reset(&self, count: u32) {
        let mut c = self.count.lock().expect("Could not lock semaphore count");
        *c = count;
        if count > 0 { self.cond.notify_all(); }
    }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use super::*;

    /// Tests post/wait counting behaviour on a single thread.
    #[test]
    fn test_semaphore_count() {
        let sem = Semaphore::new(1);
        assert_eq!(sem.try_wait(), true);
        assert_eq!(sem.try_wait(), false);

        sem.post();
        sem.post();
        assert_eq!(sem.try_wait(), true);
        assert_eq!(sem.try_wait(), true);
        assert_eq!(sem.try_wait(), false);
    }

    /// Tests that reset overwrites any outstanding posts.
    #[test]
    fn test_semaphore_reset() {
        let sem = Semaphore::new(0);
        sem.post();
        sem.post();
        sem.reset(1);
        assert_eq!(sem.try_wait(), true);
        assert_eq!(sem.try_wait(), false);
    }

    /// Tests that a blocking wait is woken up by a post from another thread.
    #[test]
    fn test_semaphore_cross_thread() {
        use std::sync::Arc;
        use std::thread;

        let sem = Arc::new(Semaphore::new(0));
        let thread_sem = sem.clone();
        let handle = thread::spawn(move || {
            thread_sem.wait();
        });
        sem.post();
        handle.join().expect("Waiting thread panicked");
    }
}
