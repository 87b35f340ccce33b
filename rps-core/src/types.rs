use crate::error::{Result, RpsError};
use crate::rules::{self, Move};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Amount in the smallest currency unit (nano, 10^-9 of a display unit)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const NANO_PER_UNIT: u64 = 1_000_000_000;
    const DISPLAY_DECIMALS: u32 = 4;

    pub const fn from_nano(nano: u64) -> Self {
        Self(nano)
    }

    pub const fn to_nano(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_mul(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// Fixed 4-decimal rendering in display units, rounded half up
    pub fn to_display(self) -> String {
        let step = 10u128.pow(9 - Self::DISPLAY_DECIMALS);
        let scaled = (self.0 as u128 + step / 2) / step;
        let denom = 10u128.pow(Self::DISPLAY_DECIMALS);
        format!("{}.{:04}", scaled / denom, scaled % denom)
    }

    /// Parse a decimal display-unit string such as `"1"`, `"0.5"` or `"2.125"`
    pub fn from_display(input: &str) -> Result<Self> {
        let input = input.trim();
        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(RpsError::InvalidAmount(input.to_string()));
        }
        if frac.len() > 9 {
            return Err(RpsError::InvalidAmount(format!(
                "{} has more than 9 decimal places",
                input
            )));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| RpsError::InvalidAmount(input.to_string()))?
        };
        let frac_nano: u64 = if frac.is_empty() {
            0
        } else {
            format!("{:0<9}", frac)
                .parse()
                .map_err(|_| RpsError::InvalidAmount(input.to_string()))?
        };

        whole
            .checked_mul(Self::NANO_PER_UNIT)
            .and_then(|n| n.checked_add(frac_nano))
            .map(Self)
            .ok_or_else(|| RpsError::InvalidAmount(format!("{} is too large", input)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl FromStr for Amount {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_display(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(RpsError::config(format!("Unknown network: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Revealing,
    Completed,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Revealing => "revealing",
            GameStatus::Completed => "completed",
            GameStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            GameStatus::Waiting => 0,
            GameStatus::Active => 1,
            GameStatus::Revealing => 2,
            GameStatus::Completed => 3,
            GameStatus::Cancelled => 3,
        }
    }

    /// Forward-only lifecycle; cancellation only from `waiting`
    pub fn can_advance_to(&self, next: GameStatus) -> bool {
        match (self, next) {
            (GameStatus::Waiting, GameStatus::Cancelled) => true,
            (_, GameStatus::Cancelled) => false,
            (current, next) if current.is_terminal() => *current == next,
            (current, next) => next.rank() >= current.rank(),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(GameStatus::Waiting),
            "active" => Ok(GameStatus::Active),
            "revealing" => Ok(GameStatus::Revealing),
            "completed" => Ok(GameStatus::Completed),
            "cancelled" => Ok(GameStatus::Cancelled),
            other => Err(RpsError::internal(format!("Unknown game status: {}", other))),
        }
    }
}

/// Which side of a game a wallet plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Creator,
    Joiner,
}

impl Role {
    /// Resolve the role of `address` in `game`, if it takes part
    pub fn of(game: &Game, address: &str) -> Option<Role> {
        if game.creator_address == address {
            Some(Role::Creator)
        } else if game.joiner_address.as_deref() == Some(address) {
            Some(Role::Joiner)
        } else {
            None
        }
    }

    pub fn opponent(&self) -> Role {
        match self {
            Role::Creator => Role::Joiner,
            Role::Joiner => Role::Creator,
        }
    }

    pub fn choice_in(&self, game: &Game) -> Option<Move> {
        match self {
            Role::Creator => game.creator_choice,
            Role::Joiner => game.joiner_choice,
        }
    }

    pub fn opponent_choice_in(&self, game: &Game) -> Option<Move> {
        self.opponent().choice_in(game)
    }

    pub fn address_in<'a>(&self, game: &'a Game) -> Option<&'a str> {
        match self {
            Role::Creator => Some(game.creator_address.as_str()),
            Role::Joiner => game.joiner_address.as_deref(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Creator => f.write_str("creator"),
            Role::Joiner => f.write_str("joiner"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub creator_address: String,
    pub joiner_address: Option<String>,
    pub bet_amount: Amount,
    pub status: GameStatus,
    pub creator_choice: Option<Move>,
    pub joiner_choice: Option<Move>,
    pub creator_choice_hash: Option<String>,
    pub joiner_choice_hash: Option<String>,
    pub winner_address: Option<String>,
    pub prize_amount: Option<Amount>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Game {
    pub fn new(
        creator_address: String,
        bet_amount: Amount,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_address,
            joiner_address: None,
            bet_amount,
            status: GameStatus::Waiting,
            creator_choice: None,
            joiner_choice: None,
            creator_choice_hash: None,
            joiner_choice_hash: None,
            winner_address: None,
            prize_amount: None,
            created_at: now,
            updated_at: now,
            expires_at,
            version: 1,
        }
    }

    pub fn both_choices_made(&self) -> bool {
        self.creator_choice.is_some() && self.joiner_choice.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |deadline| now > deadline)
    }

    /// Both stakes together
    pub fn prize_pool(&self) -> Option<Amount> {
        self.bet_amount.checked_mul(2)
    }

    /// Apply an update in place, enforcing the lifecycle invariants.
    ///
    /// Written choices and the joiner are never overwritten, status only moves
    /// forward. The first choice moves the game to `revealing`; the second one
    /// settles it.
    pub fn apply(&mut self, update: &GameUpdate) -> Result<()> {
        let mut next = self.clone();

        if let Some(joiner) = &update.joiner_address {
            if next.joiner_address.is_some() {
                return Err(RpsError::invalid_update(format!(
                    "game {} already has a joiner",
                    self.id
                )));
            }
            if *joiner == next.creator_address {
                return Err(RpsError::invalid_update("creator cannot join own game"));
            }
            next.joiner_address = Some(joiner.clone());
        }

        if let Some(status) = update.status {
            if !next.status.can_advance_to(status) {
                return Err(RpsError::invalid_update(format!(
                    "status cannot move from {} to {}",
                    next.status, status
                )));
            }
            next.status = status;
        }

        for (role, choice, hash) in [
            (Role::Creator, update.creator_choice, &update.creator_choice_hash),
            (Role::Joiner, update.joiner_choice, &update.joiner_choice_hash),
        ] {
            let Some(choice) = choice else { continue };
            if role.choice_in(&next).is_some() {
                return Err(RpsError::ChoiceAlreadySet { id: self.id, role });
            }
            if !matches!(next.status, GameStatus::Active | GameStatus::Revealing) {
                return Err(RpsError::invalid_update(format!(
                    "choices cannot be submitted while game is {}",
                    next.status
                )));
            }
            match role {
                Role::Creator => {
                    next.creator_choice = Some(choice);
                    next.creator_choice_hash = hash.clone();
                }
                Role::Joiner => {
                    next.joiner_choice = Some(choice);
                    next.joiner_choice_hash = hash.clone();
                }
            }
        }

        if next.joiner_address.is_none() && next.status != GameStatus::Waiting
            && next.status != GameStatus::Cancelled
        {
            return Err(RpsError::invalid_update(format!(
                "game {} cannot be {} without a joiner",
                self.id, next.status
            )));
        }

        if next.both_choices_made() {
            rules::settle(&mut next)?;
        } else if next.status == GameStatus::Active
            && (next.creator_choice.is_some() || next.joiner_choice.is_some())
        {
            next.status = GameStatus::Revealing;
        }

        next.version += 1;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

/// Partial write against a game row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameUpdate {
    pub joiner_address: Option<String>,
    pub status: Option<GameStatus>,
    pub creator_choice: Option<Move>,
    pub joiner_choice: Option<Move>,
    pub creator_choice_hash: Option<String>,
    pub joiner_choice_hash: Option<String>,
}

impl GameUpdate {
    pub fn join(joiner_address: impl Into<String>) -> Self {
        Self {
            joiner_address: Some(joiner_address.into()),
            status: Some(GameStatus::Active),
            ..Default::default()
        }
    }

    pub fn choice(role: Role, choice: Move, hash: Option<String>) -> Self {
        match role {
            Role::Creator => Self {
                creator_choice: Some(choice),
                creator_choice_hash: hash,
                ..Default::default()
            },
            Role::Joiner => Self {
                joiner_choice: Some(choice),
                joiner_choice_hash: hash,
                ..Default::default()
            },
        }
    }

    pub fn cancel() -> Self {
        Self {
            status: Some(GameStatus::Cancelled),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub address: String,
    pub games_played: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Listing filter for stored games
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub status: Option<GameStatus>,
    pub address: Option<String>,
    pub include_expired: bool,
    pub limit: Option<usize>,
}

impl GameFilter {
    /// Games still open for a second player
    pub fn open() -> Self {
        Self {
            status: Some(GameStatus::Waiting),
            ..Default::default()
        }
    }

    pub fn involving(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            include_expired: true,
            ..Default::default()
        }
    }
}
