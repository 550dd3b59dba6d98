use std::num::NonZeroUsize;

/// Lane index for `conversation_id`.
///
/// Pure and deterministic: the same id always maps to the same lane for a
/// given lane count. Negative ids (group chats) wrap with Euclidean modulo.
#[must_use]
pub fn shard(conversation_id: i64, lanes: NonZeroUsize) -> usize {
    let lanes = lanes.get() as i128;
    // Result is in 0..lanes, so the narrowing cast is lossless.
    i128::from(conversation_id).rem_euclid(lanes) as usize
}
