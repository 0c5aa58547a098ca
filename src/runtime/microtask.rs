//! Microtask queue.
//!
//! Tasks queued here run after the current synchronous turn and before the
//! next refresh callback. `run_microtasks` drains until the queue is empty,
//! so tasks queued by other tasks run in the same drain.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
}

pub fn queue_microtask(task: impl FnOnce() + 'static) {
    QUEUE.with(|q| q.borrow_mut().push_back(Box::new(task)));
}

/// Drain the queue. Returns the number of tasks run.
pub fn run_microtasks() -> usize {
    let mut ran = 0;
    loop {
        let next = QUEUE.with(|q| q.borrow_mut().pop_front());
        match next {
            Some(task) => {
                task();
                ran += 1;
            }
            None => break,
        }
    }
    ran
}

pub fn pending_microtasks() -> usize {
    QUEUE.with(|q| q.borrow().len())
}

pub fn reset_microtasks() {
    QUEUE.with(|q| q.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_drains_nested_tasks() {
        reset_microtasks();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        queue_microtask(move || {
            o.borrow_mut().push(1);
            let o2 = o.clone();
            queue_microtask(move || o2.borrow_mut().push(3));
        });
        let o = order.clone();
        queue_microtask(move || o.borrow_mut().push(2));

        assert_eq!(pending_microtasks(), 2);
        assert_eq!(run_microtasks(), 3);
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reset_discards_tasks() {
        queue_microtask(|| panic!("discarded task ran"));
        reset_microtasks();
        assert_eq!(run_microtasks(), 0);
    }
}
