use color_eyre::eyre::eyre;
use color_eyre::Result;
use dialoguer::{Confirm, Input};

/// Prompt for a string value; an existing value is offered as the default
pub fn prompt_string(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
    if let Some(default_value) = default {
        input = input.default(default_value.to_string());
    }
    input
        .interact_text()
        .map(|value| value.trim().to_string())
        .map_err(|e| eyre!("Failed to read input: {}", e))
}

/// Prompt until a non-empty value is given
pub fn prompt_required(prompt: &str, default: Option<&str>) -> Result<String> {
    loop {
        let value = prompt_string(prompt, default)?;
        if !value.is_empty() {
            return Ok(value);
        }
        eprintln!("A value is required.");
    }
}

pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}

/// Read a password without echoing it
pub fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", prompt))
        .map_err(|e| eyre!("Failed to read password: {}", e))
}

/// Prompt for an integer in `min..=max`, re-asking on invalid input
pub fn prompt_bounded(prompt: &str, default: u64, min: u64, max: u64) -> Result<u64> {
    let answer = Input::<String>::new()
        .with_prompt(format!("{} ({}-{})", prompt, min, max))
        .default(default.to_string())
        .validate_with(move |input: &String| parse_bounded(input, min, max).map(|_| ()))
        .interact_text()
        .map_err(|e| eyre!("Failed to read input: {}", e))?;
    parse_bounded(&answer, min, max).map_err(|e| eyre!("{}", e))
}

/// Validate an integer prompt answer within `min..=max`
pub fn parse_bounded(input: &str, min: u64, max: u64) -> std::result::Result<u64, String> {
    let value: u64 = input
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", input.trim()))?;
    if value < min || value > max {
        return Err(format!("must be between {} and {}", min, max));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounded() {
        assert_eq!(parse_bounded(" 500 ", 0, 10_000), Ok(500));
        assert!(parse_bounded("abc", 0, 10).is_err());
        assert!(parse_bounded("0", 1, 10).is_err());
    }
}
