const MAX_NUMBER_DIGITS: usize = 16;
const MAX_CVV_DIGITS: usize = 4;
const MAX_EXPIRY_DIGITS: usize = 4;

/// Card details as typed into the payment form, normalized on construction.
///
/// Digits only for number, expiry and CVV; expiry is kept as `MM/YY`.
/// Never persisted and never logged in full.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    number: String,
    holder_name: String,
    expiry: String,
    cvv: String,
}

fn digits(input: &str, max: usize) -> String {
    input.chars().filter(char::is_ascii_digit).take(max).collect()
}

fn format_expiry(input: &str) -> String {
    let raw = digits(input, MAX_EXPIRY_DIGITS);
    if raw.len() > 2 {
        format!("{}/{}", &raw[..2], &raw[2..])
    } else {
        raw
    }
}

impl CardDetails {
    pub fn new(number: &str, holder_name: &str, expiry: &str, cvv: &str) -> Self {
        Self {
            number: digits(number, MAX_NUMBER_DIGITS),
            holder_name: holder_name.trim().to_string(),
            expiry: format_expiry(expiry),
            cvv: digits(cvv, MAX_CVV_DIGITS),
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn expiry(&self) -> &str {
        &self.expiry
    }

    pub fn cvv(&self) -> &str {
        &self.cvv
    }

    /// Expiry month and two-digit year, when the expiry is complete.
    pub fn expiry_parts(&self) -> Option<(u32, u32)> {
        let (month, year) = self.expiry.split_once('/')?;
        if month.len() != 2 || year.len() != 2 {
            return None;
        }
        Some((month.parse().ok()?, year.parse().ok()?))
    }

    pub fn last4(&self) -> &str {
        let start = self.number.len().saturating_sub(4);
        &self.number[start..]
    }

    pub fn brand(&self) -> &'static str {
        if self.number.starts_with('4') {
            "Visa"
        } else if self.number.starts_with('5') {
            "Mastercard"
        } else if self.number.starts_with("34") || self.number.starts_with("37") {
            "Amex"
        } else {
            "Card"
        }
    }

    /// Display summary stored on the subscription, e.g. `Visa **** 4242`.
    pub fn summary(&self) -> String {
        format!("{} **** {}", self.brand(), self.last4())
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("summary", &self.summary())
            .field("holder_name", &self.holder_name)
            .finish_non_exhaustive()
    }
}
