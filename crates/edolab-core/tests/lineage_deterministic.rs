use edolab_core::SeedLineage;
use rand::RngCore;

#[test]
fn lineage_seed_is_stable() {
    let a = SeedLineage::new(3, 1, 4);
    let b = SeedLineage::new(3, 1, 4);
    assert_eq!(a.individual_seed(), b.individual_seed());
    let mut rng_a = a.rng();
    let mut rng_b = b.rng();
    for _ in 0..16 {
        assert_eq!(rng_a.next_u64(), rng_b.next_u64());
    }
}

#[test]
fn lineage_positions_diverge() {
    let base = SeedLineage::new(0, 0, 0).individual_seed();
    assert_ne!(base, SeedLineage::new(0, 0, 1).individual_seed());
    assert_ne!(base, SeedLineage::new(0, 1, 0).individual_seed());
    assert_ne!(base, SeedLineage::new(1, 0, 0).individual_seed());
}
