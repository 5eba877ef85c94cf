// Copyright @yucwang 2026

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Evaluates `f(i)` for every `i` in `0..count` on a scoped worker pool and
/// returns the results in index order. Each call only produces its own slot;
/// returning from this function is the barrier.
pub fn parallel_map<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if count == 0 {
        return Vec::new();
    }

    let thread_count = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(count);
    if thread_count <= 1 {
        return (0..count).map(f).collect();
    }

    let next_unit = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel::<(usize, T)>();
    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    let f_ref = &f;

    thread::scope(|scope| {
        for _ in 0..thread_count {
            let next_unit = Arc::clone(&next_unit);
            let tx = tx.clone();
            scope.spawn(move || loop {
                let unit = next_unit.fetch_add(1, Ordering::Relaxed);
                if unit >= count {
                    break;
                }
                if tx.send((unit, f_ref(unit))).is_err() {
                    break;
                }
            });
        }

        drop(tx);
        for (unit, value) in rx.iter() {
            slots[unit] = Some(value);
        }
    });

    slots
        .into_iter()
        .map(|slot| match slot {
            Some(v) => v,
            None => panic!("parallel_map: a worker exited without producing its unit"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parallel_map;

    #[test]
    fn results_follow_index_order() {
        let out = parallel_map(1000, |i| i * 2);
        assert_eq!(out.len(), 1000);
        assert!(out.iter().enumerate().all(|(i, v)| *v == i * 2));
    }

    #[test]
    fn empty_input() {
        let out: Vec<u32> = parallel_map(0, |_| 1);
        assert!(out.is_empty());
    }
}
