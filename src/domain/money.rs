use std::fmt;

/// Money is represented as unsigned integer cents to avoid floating-point drift.
/// Balances can never be negative, so the type makes that unrepresentable.
/// For EUR/USD, 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = u64;

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", 1 -> "0.01"
pub fn format_cents(cents: Cents) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parse a non-negative decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseCentsError::Negative);
    }
    if input.starts_with('+') {
        return Err(ParseCentsError::InvalidFormat);
    }

    let (units, decimals) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if !decimals.bytes().all(|b| b.is_ascii_digit()) || (units.is_empty() && decimals.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: u64 = if units.is_empty() {
        0
    } else {
        units.parse().map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate the fractional part to exactly two digits
    let decimal_cents: u64 = match decimals.len() {
        0 => 0,
        1 => decimals.parse::<u64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => decimals[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    units
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(decimal_cents))
        .ok_or(ParseCentsError::TooLarge)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Negative,
    TooLarge,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Negative => write!(f, "amount must not be negative"),
            ParseCentsError::TooLarge => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
