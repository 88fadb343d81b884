/// Patoshis per PSL. Both the credit-pack burn amount (spec §4.3's
/// `round(total_cost × 10⁵)/10⁵`) and the inference confirmation amount
/// (spec §4.4's `amount_in_patoshis / 10⁵`) scale by this factor, so it is
/// named once rather than inlined as a magic `100_000.0` in two engines.
pub const PATOSHIS_PER_PSL: f64 = 100_000.0;

/// Round `amount_psl` down to the nearest whole patoshi. Spec §4.3's prose
/// says `round(total_cost × 10⁵)/10⁵` but §8's quantified invariant says
/// `floor(total_cost × 10⁵)/10⁵`; DESIGN.md records why this crate follows
/// the testable invariant.
pub fn floor_to_patoshi(amount_psl: f64) -> f64 {
    (amount_psl * PATOSHIS_PER_PSL).floor() / PATOSHIS_PER_PSL
}

pub fn patoshis_to_psl(patoshis: u64) -> f64 {
    patoshis as f64 / PATOSHIS_PER_PSL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_to_the_nearest_patoshi() {
        assert_eq!(floor_to_patoshi(1.234567), 1.23456);
    }

    #[test]
    fn patoshis_convert_back_to_psl() {
        assert_eq!(patoshis_to_psl(500_000), 5.0);
    }
}
