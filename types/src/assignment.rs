//! Role list construction and the secure shuffle used to deal it.

use rand::{CryptoRng, RngCore};

use crate::{error::GameError, role::Role, settings::GameSettings};

pub const MIN_PLAYERS: usize = 3;
pub const MAX_PLAYERS: usize = 20;

/// Every game-affecting random draw goes through one of these.
pub trait SecureRng: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRng for T {}

pub fn default_mafia_count(player_count: usize) -> usize {
    match player_count {
        0..=5 => 1,
        6..=8 => 2,
        9..=12 => 3,
        _ => 4,
    }
}

/// Applies the room override when it is a positive integer strictly below
/// `ceil(player_count / 2)`, otherwise falls back to the default.
pub fn mafia_count(player_count: usize, requested: Option<i64>) -> usize {
    let default = default_mafia_count(player_count);
    let Some(requested) = requested else {
        return default;
    };
    let ceiling = player_count.div_ceil(2);
    match usize::try_from(requested) {
        Ok(count) if count > 0 && count < ceiling => count,
        _ => {
            log::warn!(
                "Ignoring mafia count override {requested} for {player_count} players, using {default}"
            );
            default
        }
    }
}

/// Mafia first, then sheikh, girl and boy while citizen slots remain, then
/// plain citizens.
pub fn build_role_list(player_count: usize, settings: &GameSettings) -> Result<Vec<Role>, GameError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
        return Err(GameError::InvalidPlayerCount(player_count));
    }
    let mut roles = vec![Role::Mafia; mafia_count(player_count, settings.mafia_count)];
    for (enabled, role) in [
        (settings.enable_sheikh, Role::Sheikh),
        (settings.enable_girl, Role::Girl),
        (settings.enable_boy, Role::Boy),
    ] {
        if enabled && roles.len() < player_count {
            roles.push(role);
        }
    }
    roles.resize(player_count, Role::Citizen);
    Ok(roles)
}

/// Uniform draw from `0..bound` with rejection sampling over `u32`, so no
/// residue class is favoured. A failing source is fatal.
pub fn uniform_index<R>(rng: &mut R, bound: usize) -> Result<usize, GameError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let bound = u64::try_from(bound)
        .ok()
        .filter(|&b| b > 0 && b <= u64::from(u32::MAX))
        .ok_or_else(|| GameError::InvalidTarget(format!("cannot draw from 0..{bound}")))?;
    let range = 1u64 << 32;
    let limit = range - range % bound;
    loop {
        let mut buf = [0u8; 4];
        rng.try_fill_bytes(&mut buf)
            .map_err(|err| GameError::SecureRandomUnavailable(err.to_string()))?;
        let value = u64::from(u32::from_le_bytes(buf));
        if value < limit {
            return Ok((value % bound) as usize);
        }
    }
}

/// Fisher-Yates over `items`.
pub fn secure_shuffle<T, R>(items: &mut [T], rng: &mut R) -> Result<(), GameError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = uniform_index(rng, i + 1)?;
        items.swap(i, j);
    }
    Ok(())
}

/// The shuffled role list, one entry per seat in seating order.
pub fn deal_roles<R>(
    player_count: usize,
    settings: &GameSettings,
    rng: &mut R,
) -> Result<Vec<Role>, GameError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut roles = build_role_list(player_count, settings)?;
    secure_shuffle(&mut roles, rng)?;
    Ok(roles)
}
