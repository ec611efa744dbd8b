#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]
#![cfg(test)]

use arena_alloc::{
    ArenaAllocator, Block, SlotPoolConfig,
    fixed_slot::{FixedSlotPool, SLOT_HEADER_SIZE},
    splitting::{SPLIT_HEADER_SIZE, SplittingAllocator},
};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

const STEPS: usize = 2000;

/// Live bodies must be pairwise disjoint and lie inside the arena.
fn assert_disjoint<A>(allocator: &A, live: &[Block])
where
    A: ArenaAllocator,
{
    let mut ranges: Vec<_> = live.iter().map(Block::range).collect();
    ranges.sort_unstable_by_key(|range| range.start);
    for pair in ranges.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "{:?} overlaps {:?}",
            pair[0],
            pair[1]
        );
    }
    for block in live {
        assert!(allocator.arena().contains(&block.range()));
    }
}

/// Drives `allocator` with a seeded mix of allocations and releases.
fn run<A, F>(allocator: &mut A, seed: u64, max_size: usize, mut check: F)
where
    F: FnMut(&A, &[Block]),
    A: ArenaAllocator,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut live: Vec<Block> = Vec::new();
    for _ in 0..STEPS {
        if live.is_empty() || rng.gen_bool(0.55) {
            let size = rng.gen_range(1..=max_size);
            let before = allocator.stats();
            match allocator.allocate(size) {
                Ok(block) => {
                    assert!(block.len() >= size);
                    live.push(block);
                }
                Err(_) => assert_eq!(allocator.stats(), before),
            }
        } else {
            let block = live.swap_remove(rng.gen_range(0..live.len()));
            allocator.release(block).unwrap();
        }
        assert_eq!(allocator.stats().live_blocks, live.len());
        assert_disjoint(allocator, &live);
        check(allocator, &live);
    }
    for block in live.drain(..) {
        allocator.release(block).unwrap();
    }
    check(allocator, &live);
}

#[test]
fn splitting_conserves_bytes() {
    const CAPACITY: usize = 16 * 1024;
    for seed in 0..8 {
        let mut allocator = SplittingAllocator::init(CAPACITY, &Default::default()).unwrap();
        run(&mut allocator, seed, 700, |allocator, _| {
            let stats = allocator.stats();
            assert_eq!(
                stats.header_bytes + stats.used_bytes + stats.free_bytes,
                CAPACITY
            );
            // released neighbours are always merged
            let blocks: Vec<_> = allocator.blocks().collect();
            assert!(
                blocks
                    .windows(2)
                    .all(|pair| pair[0].occupied || pair[1].occupied)
            );
        });

        let blocks: Vec<_> = allocator.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body_size, CAPACITY - SPLIT_HEADER_SIZE);
        allocator.destroy();
    }
}

#[test]
fn fixed_slot_keeps_free_list_consistent() {
    const SLOT_SIZE: usize = 96;
    const SLOTS: usize = 40;
    let config = SlotPoolConfig::new().with_slot_size(SLOT_SIZE);
    for seed in 0..8 {
        let mut pool =
            FixedSlotPool::init(SLOTS * (SLOT_HEADER_SIZE + SLOT_SIZE), &config).unwrap();
        run(&mut pool, seed, SLOT_SIZE, |pool, live| {
            assert_eq!(pool.free_slots(), SLOTS - live.len());
            let stats = pool.stats();
            assert_eq!(stats.used_bytes, live.len() * SLOT_SIZE);
        });

        // with every slot free again, allocation walks the slots in address order
        let offsets: Vec<_> = (0..SLOTS)
            .map(|_| pool.allocate(SLOT_SIZE).unwrap().offset())
            .collect();
        let expected: Vec<_> = (0..SLOTS)
            .map(|index| index * pool.stride() + SLOT_HEADER_SIZE)
            .collect();
        assert_eq!(offsets, expected);
        pool.destroy();
    }
}
