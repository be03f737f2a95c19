/// A percentage discount applied to the first captured payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coupon {
    pub code: &'static str,
    pub percent_off: u8,
}

const COUPONS: &[Coupon] = &[
    Coupon {
        code: "DESCUENTO20",
        percent_off: 20,
    },
    Coupon {
        code: "DESCUENTO50",
        percent_off: 50,
    },
];

impl Coupon {
    /// Look up a coupon code, ignoring case and surrounding whitespace.
    pub fn find(code: &str) -> Option<Coupon> {
        let code = code.trim();
        COUPONS
            .iter()
            .copied()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    /// Discounted amount, rounded half up.
    pub fn apply(&self, amount: i64) -> i64 {
        let keep = 100 - i128::from(self.percent_off);
        let discounted = (i128::from(amount) * keep + 50) / 100;
        i64::try_from(discounted).unwrap_or(i64::MAX)
    }
}
