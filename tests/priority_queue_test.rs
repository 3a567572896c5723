//! Heap ordering properties over randomized input.

use std::cmp::Ordering;

use prometheus_task_scheduler::PriorityQueue;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn test_pops_are_non_decreasing_for_random_input() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..50 {
        let n = rng.random_range(0..300);
        let mut q = PriorityQueue::new();
        for _ in 0..n {
            q.push(rng.random_range(-1_000..1_000_i32));
        }
        assert_eq!(q.len(), n);

        let mut popped = Vec::with_capacity(n);
        for i in 0..n {
            assert!(!q.is_empty(), "round {round}: empty after {i} pops of {n}");
            popped.push(q.pop().unwrap());
        }
        assert!(q.is_empty());
        assert!(q.pop().is_none());
        assert!(popped.windows(2).all(|w| w[0] <= w[1]), "round {round}");
    }
}

#[test]
fn test_interleaved_push_pop_matches_sorted_model() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut q = PriorityQueue::new();
    let mut model: Vec<u16> = Vec::new();

    for _ in 0..2_000 {
        if rng.random_bool(0.6) {
            let v = rng.random::<u16>();
            q.push(v);
            model.push(v);
        } else {
            model.sort_unstable();
            let expected = if model.is_empty() { None } else { Some(model.remove(0)) };
            assert_eq!(q.pop(), expected);
        }
        assert_eq!(q.len(), model.len());
        assert_eq!(q.peek().copied(), model.iter().min().copied());
    }
}

#[test]
fn test_custom_comparator_max_first() {
    let mut q = PriorityQueue::with_comparator(|a: &u32, b: &u32| b.cmp(a));
    q.extend([3, 9, 1, 7]);
    assert_eq!(q.pop(), Some(9));
    assert_eq!(q.pop(), Some(7));
    assert_eq!(q.into_sorted_vec(), vec![3, 1]);
}

#[test]
fn test_comparator_on_records() {
    #[derive(Debug, PartialEq)]
    struct Job {
        priority: i32,
        name: &'static str,
    }

    let by_priority = |a: &Job, b: &Job| -> Ordering { a.priority.cmp(&b.priority) };
    let mut q = PriorityQueue::with_capacity_and_comparator(4, by_priority);
    q.push(Job { priority: 5, name: "x" });
    q.push(Job { priority: 1, name: "y" });
    q.push(Job { priority: 3, name: "z" });

    assert_eq!(q.peek().map(|j| j.name), Some("y"));
    let names: Vec<_> = std::iter::from_fn(|| q.pop()).map(|j| j.name).collect();
    assert_eq!(names, vec!["y", "z", "x"]);
}

#[test]
fn test_retain_keeps_heap_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut q: PriorityQueue<i64> = (0..500).map(|_| rng.random_range(0..10_000)).collect();

    let removed = q.retain(|v| v % 3 != 0);
    assert!(removed > 0);
    let rest = q.into_sorted_vec();
    assert!(rest.iter().all(|v| v % 3 != 0));
    assert!(rest.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(rest.len() + removed, 500);
}

#[test]
fn test_empty_queue() {
    let mut q: PriorityQueue<u8> = PriorityQueue::default();
    assert!(q.is_empty());
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
    q.push(1);
    q.clear();
    assert!(q.is_empty());
}
