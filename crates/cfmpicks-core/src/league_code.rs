// Shareable league join codes: `XXX-XXX-XXXX` over `[A-Z0-9]`.

use rand::Rng;
use thiserror::Error;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GROUPS: [usize; 3] = [3, 3, 4];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeagueCodeError {
    #[error("league code must look like XXX-XXX-XXXX, got `{0}`")]
    Malformed(String),

    #[error("could not find an unused league code after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Generate a random code. Does not check for collisions; see
/// [`generate_unique_code`].
pub fn generate_league_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(12);
    for (i, len) in GROUPS.iter().enumerate() {
        if i > 0 {
            code.push('-');
        }
        for _ in 0..*len {
            let idx = rng.gen_range(0..ALPHABET.len());
            code.push(ALPHABET[idx] as char);
        }
    }
    code
}

/// Whether `code` matches `^[A-Z0-9]{3}-[A-Z0-9]{3}-[A-Z0-9]{4}$` exactly.
pub fn is_valid_league_code(code: &str) -> bool {
    let groups: Vec<&str> = code.split('-').collect();
    groups.len() == GROUPS.len()
        && groups.iter().zip(GROUPS).all(|(group, len)| {
            group.len() == len
                && group
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
}

/// Trim and uppercase user input, then validate it.
pub fn normalize_league_code(input: &str) -> Result<String, LeagueCodeError> {
    let code = input.trim().to_ascii_uppercase();
    if is_valid_league_code(&code) {
        Ok(code)
    } else {
        Err(LeagueCodeError::Malformed(input.trim().to_string()))
    }
}

/// Generate codes until one is not already taken according to `exists`.
///
/// `exists` is consulted for every candidate; an error from it aborts the
/// search and is returned as-is.
pub fn generate_unique_code<R, F>(
    rng: &mut R,
    max_attempts: u32,
    mut exists: F,
) -> anyhow::Result<String>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> anyhow::Result<bool>,
{
    for attempt in 1..=max_attempts {
        let candidate = generate_league_code(rng);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(attempt, "league code collision, retrying");
    }
    Err(LeagueCodeError::Exhausted {
        attempts: max_attempts,
    }
    .into())
}
