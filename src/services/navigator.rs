//! Checkpoint arithmetic over the solicitud id space.
//!
//! Valid ids tend to start at positions whose last two digits are one of
//! 10, 30, 50, 70 or 90; scans probe those first.

/// Last two digits that mark a checkpoint, ascending
pub const CHECKPOINT_SUFFIXES: [i64; 5] = [10, 30, 50, 70, 90];

pub fn is_checkpoint(i: i64) -> bool {
    CHECKPOINT_SUFFIXES.contains(&i.rem_euclid(100))
}

/// Smallest checkpoint `j >= i`. Never moves the cursor backwards.
pub fn next_checkpoint(i: i64) -> i64 {
    let last2 = i.rem_euclid(100);
    match CHECKPOINT_SUFFIXES.iter().find(|c| last2 <= **c) {
        Some(c) => i + (c - last2),
        // 91..=99 wraps to the next hundred
        None => (i - last2) + 100 + CHECKPOINT_SUFFIXES[0],
    }
}
