//! Quota arithmetic. Everything here is integer math on non-negative
//! quantities; a quota of zero megabytes is rejected at the account
//! validation boundary and never reaches these functions.

/// Bytes in one megabyte of configured quota.
pub const BYTES_PER_MB: u64 = 1 << 20;

/// Converts a measured byte total and a configured quota into the quota in
/// bytes and the integer percentage used.
pub fn compute_usage(total_bytes: u64, quota_mb: u32) -> (u64, u32) {
    let quota_bytes = u64::from(quota_mb) * BYTES_PER_MB;
    let percent = div_round_half_up(u128::from(total_bytes) * 100, u128::from(quota_bytes));
    (quota_bytes, u32::try_from(percent).unwrap_or(u32::MAX))
}

/// Rounds a byte count to whole megabytes for the report line.
pub fn whole_megabytes(total_bytes: u64) -> u64 {
    let mb = div_round_half_up(u128::from(total_bytes), u128::from(BYTES_PER_MB));
    u64::try_from(mb).unwrap_or(u64::MAX)
}

/// Usage strictly above the threshold is a warning; exactly at the
/// threshold is not.
pub fn is_warning(percent: u32, threshold: u32) -> bool {
    percent > threshold
}

// Same result as truncating quotient + 0.5 on non-negative inputs, without
// going through floating point.
fn div_round_half_up(numerator: u128, denominator: u128) -> u128 {
    (2 * numerator + denominator) / (2 * denominator)
}
