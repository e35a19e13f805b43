use alloy_primitives::U256;

/// Q96 constant: 2^96, the fixed-point base for `sqrtPriceX96`.
pub fn q96() -> U256 {
    U256::from(1u128) << 96
}

/// Convert a tick to a sqrtPriceX96 using the standard formula:
/// sqrtPrice = sqrt(1.0001^tick) * 2^96.
///
/// Used only by `chain_client::mock` to synthesize realistic v3 state for
/// tests and the demo binary — the engine itself never derives prices from
/// ticks, only from the `sqrtPriceX96` a provider returns (spec §4.6).
pub fn tick_to_sqrt_price_x96(tick: i32) -> U256 {
    let sqrt_ratio = (1.0001_f64).powf(tick as f64 / 2.0);
    let q96_f64 = 2.0_f64.powi(96);
    let value = sqrt_ratio * q96_f64;
    if value <= 0.0 || !value.is_finite() {
        return q96();
    }
    U256::from(value as u128)
}

/// Compute `(sqrtPriceX96 / 2^96)^2`, the raw token1-per-token0 price
/// implied by a v3 pool's slot0, as an f64. Spec §4.6 step 6.
pub fn sqrt_price_x96_to_raw_price(sqrt_price_x96: U256) -> f64 {
    let sqrt_price = crate::utils::types::u256_ext::to_f64(sqrt_price_x96);
    let q96 = 2.0_f64.powi(96);
    let ratio = sqrt_price / q96;
    ratio * ratio
}

/// Adjust a raw v3 price by the decimals of both tokens:
/// `raw * 10^(dec(token0) - dec(token1))`, per spec §4.6 step 6.
pub fn adjust_for_decimals(raw: f64, dec_token0: u8, dec_token1: u8) -> f64 {
    let exp = dec_token0 as i32 - dec_token1 as i32;
    raw * 10f64.powi(exp)
}
