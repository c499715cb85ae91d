//! Terminal input helpers

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use zeroize::Zeroizing;

/// Read one trimmed line from stdin after printing `label`
pub fn line(label: &str) -> Result<Zeroizing<String>> {
    print!("{}: ", label);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut input = Zeroizing::new(String::new());
    let read = io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    if read == 0 {
        bail!("No input for {}", label.to_lowercase());
    }

    Ok(Zeroizing::new(input.trim().to_string()))
}

/// Use the PIN given as a flag, or prompt for it
pub fn pin(label: &str, provided: Option<String>) -> Result<Zeroizing<String>> {
    match provided {
        Some(pin) => Ok(Zeroizing::new(pin)),
        None => line(label),
    }
}

/// Yes/no question, defaulting to no
pub fn confirm(question: &str) -> Result<bool> {
    let answer = line(&format!("{} [y/N]", question))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}
