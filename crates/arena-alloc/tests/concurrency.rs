#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]
#![cfg(test)]

use std::{sync::Barrier, thread};

use arena_alloc::{
    ArenaAllocator as _, Block, ReleaseError, SlotPoolConfig, SplitConfig,
    fixed_slot::{FixedSlotPool, SLOT_HEADER_SIZE},
    splitting::{SPLIT_HEADER_SIZE, SplittingAllocator},
    sync::{DefaultMode, GlobalArena, SharedArena, ThreadLocalArena},
};

const THREADS: usize = 4;
const ROUNDS: usize = 200;

fn init_logger() {
    // several tests race to install the logger; only the first one wins
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Every thread repeatedly allocates, stamps and checks a block.
fn hammer<S>(arena: &S, size: usize)
where
    S: SharedArena,
{
    thread::scope(|s| {
        for id in 0..THREADS {
            s.spawn(move || {
                let stamp = u8::try_from(id + 1).unwrap();
                for _ in 0..ROUNDS {
                    let block = arena.allocate(size).unwrap();
                    arena
                        .with(|a| a.body_mut(&block).unwrap().fill(stamp))
                        .unwrap();
                    thread::yield_now();
                    let intact = arena
                        .with(|a| a.body(&block).unwrap().iter().all(|&b| b == stamp))
                        .unwrap();
                    assert!(intact, "block at {} was overwritten", block.offset());
                    arena.release(block).unwrap();
                }
            });
        }
    });
}

#[test]
fn global_splitting_survives_contention() {
    init_logger();
    let size = 48;
    let arena = GlobalArena::<SplittingAllocator>::new(SplitConfig);
    // leaves room for the holes first-fit strands between live blocks
    arena
        .init(4 * THREADS * (size + SPLIT_HEADER_SIZE) + SPLIT_HEADER_SIZE)
        .unwrap();
    hammer(&arena, size);

    let stats = arena.stats().unwrap();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.free_blocks, 1);
    assert!(arena.destroy());
}

#[test]
fn global_fixed_slot_survives_contention() {
    init_logger();
    let config = SlotPoolConfig::new().with_slot_size(32);
    let arena = GlobalArena::<FixedSlotPool>::new(config);
    arena.init(THREADS * (SLOT_HEADER_SIZE + 32)).unwrap();
    hammer(&arena, 32);

    let stats = arena.stats().unwrap();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.free_blocks, THREADS);
}

#[test]
fn thread_local_instances_are_independent() {
    init_logger();
    let arena = ThreadLocalArena::<SplittingAllocator>::new(SplitConfig);
    arena.init(4096).unwrap();

    let barrier = Barrier::new(THREADS);
    let offsets: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    let block = arena.allocate(100).unwrap();
                    // every thread holds its block while the others allocate
                    barrier.wait();
                    let stats = arena.stats().unwrap();
                    assert_eq!(stats.live_blocks, 1);
                    arena.release(block).unwrap();
                    block.offset()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // each thread carved its block from the start of its own arena
    assert!(offsets.iter().all(|&offset| offset == SPLIT_HEADER_SIZE));
}

#[test]
fn thread_local_hammer() {
    init_logger();
    let config = SlotPoolConfig::new().with_slot_size(16);
    let arena = ThreadLocalArena::<FixedSlotPool>::new(config);
    arena.init(SLOT_HEADER_SIZE + 16).unwrap();
    // one slot per thread is enough since nothing is shared
    hammer(&arena, 16);
}

#[test]
fn foreign_block_is_rejected() {
    init_logger();
    let arena = ThreadLocalArena::<SplittingAllocator>::new(SplitConfig);
    arena.init(2048).unwrap();
    let block = arena.allocate(64).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            // no instance on this thread yet
            assert!(matches!(
                arena.release(block),
                Err(ReleaseError::Uninitialized { .. })
            ));
            // an instance without live blocks does not own it either
            arena.init(2048).unwrap();
            assert!(matches!(
                arena.release(block),
                Err(ReleaseError::InvalidRelease { .. })
            ));
        });
    });

    arena.release(block).unwrap();
}

#[test]
fn default_mode_serves_allocations() {
    init_logger();
    let arena = DefaultMode::<SplittingAllocator>::default();
    arena.init(1024).unwrap();
    let block: Block = arena.allocate(10).unwrap();
    arena.release(block).unwrap();
    assert!(arena.destroy());
}
