//! Randomized model test: a sequence of virtual-buffer mutations must keep
//! the buffer in agreement with a plain `Vec<u8>` oracle at every step.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tablecore::VirtualBuffer;

#[test]
fn random_mutation_sequence_matches_a_vec_oracle() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut vb = VirtualBuffer::new();
    let mut oracle: Vec<u8> = Vec::new();

    for _ in 0..500 {
        let op = rng.gen_range(0..3);
        match op {
            0 => {
                // pwrite: pick an offset within [0, len], allow growth.
                let offset = if oracle.is_empty() { 0 } else { rng.gen_range(0..=oracle.len()) };
                let len = rng.gen_range(1..=32);
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen::<u8>()).collect();
                vb.pwrite(&bytes, offset as u64, true).unwrap();
                let end = offset + bytes.len();
                if oracle.len() < end {
                    oracle.resize(end, 0);
                }
                oracle[offset..end].copy_from_slice(&bytes);
            }
            1 => {
                // pinsert: pick any offset in [0, len].
                let offset = if oracle.is_empty() { 0 } else { rng.gen_range(0..=oracle.len()) };
                let len = rng.gen_range(1..=32);
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen::<u8>()).collect();
                vb.pinsert(&bytes, offset as u64).unwrap();
                oracle.splice(offset..offset, bytes);
            }
            _ => {
                // perase: pick an offset and a size, clamped like the real op.
                if oracle.is_empty() {
                    continue;
                }
                let offset = rng.gen_range(0..oracle.len());
                let size = rng.gen_range(1..=32usize).min(oracle.len() - offset);
                vb.perase(size as u64, offset as u64);
                oracle.drain(offset..offset + size);
            }
        }

        assert_eq!(vb.size(), oracle.len() as u64);
        let mut actual = vec![0u8; oracle.len()];
        vb.pread(&mut actual, 0, true).unwrap();
        assert_eq!(actual, oracle);
    }
}
