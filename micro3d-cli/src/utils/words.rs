//! Text form of command lists
//!
//! One 32-bit word per token. Tokens are separated by whitespace or commas
//! and may be decimal (optionally negative) or `0x` hexadecimal. A `#`
//! starts a comment running to the end of the line.

use anyhow::{Context, Result, bail};

/// Parse a single word
pub fn parse_word(token: &str) -> Result<i32> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let bits = u32::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex word '{token}'"))?;
        i64::from(bits)
    } else {
        digits
            .parse::<i64>()
            .with_context(|| format!("Invalid word '{token}'"))?
    };

    let value = if negative { -value } else { value };
    if value > i64::from(u32::MAX) || value < i64::from(i32::MIN) {
        bail!("Word '{token}' does not fit in 32 bits");
    }
    // Unsigned decimals above i32::MAX keep their bit pattern
    Ok(value as u32 as i32)
}

/// Parse a whole command list
pub fn parse_words(text: &str) -> Result<Vec<i32>> {
    let mut words = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.split_once('#').map_or(line, |(code, _)| code);
        for token in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            words.push(parse_word(token).with_context(|| format!("line {}", number + 1))?);
        }
    }
    Ok(words)
}
