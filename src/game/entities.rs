use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum seats a table can be configured with. Nine-handed is the largest
/// ring game a 52-card deck comfortably supports with burn-free dealing.
pub const MAX_SEATS: usize = 9;

/// Minimum seated players with chips required to start a hand.
pub const MIN_PLAYERS: usize = 2;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Card rank as its numeric value, deuce=2 through ace=14. The ace doubles
/// as 1 only when the evaluator checks for the wheel straight.
pub type Rank = u8;

pub const RANK_ACE: Rank = 14;
pub const RANK_KING: Rank = 13;
pub const RANK_QUEEN: Rank = 12;
pub const RANK_JACK: Rank = 11;
pub const RANK_TWO: Rank = 2;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Rank, pub Suit);

impl Card {
    #[must_use]
    pub fn rank(self) -> Rank {
        self.0
    }

    #[must_use]
    pub fn suit(self) -> Suit {
        self.1
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.0 {
            RANK_ACE => "A",
            RANK_KING => "K",
            RANK_QUEEN => "Q",
            RANK_JACK => "J",
            10 => "T",
            v => &v.to_string(),
        };
        write!(f, "{rank}{}", self.1)
    }
}

/// A standard 52-card deck. Instantiated once per table and reshuffled at
/// the start of every hand.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: [Card; 52],
    next: usize,
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = [Card(RANK_TWO, Suit::Club); 52];
        for (i, rank) in (RANK_TWO..=RANK_ACE).enumerate() {
            for (j, suit) in Suit::ALL.into_iter().enumerate() {
                cards[4 * i + j] = Card(rank, suit);
            }
        }
        Self { cards, next: 0 }
    }
}

impl Deck {
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
        self.next = 0;
    }

    /// Deal the next card off the top.
    ///
    /// # Panics
    ///
    /// Panics if all 52 cards have been dealt. A nine-handed hand consumes at
    /// most 23 cards, so running dry indicates engine state corruption.
    pub fn deal(&mut self) -> Card {
        let card = self.cards[self.next];
        self.next += 1;
        card
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        52 - self.next
    }
}

/// Money in integer minor-currency units (cents). Signed so intermediate
/// arithmetic can be checked for underflow; every stored amount is >= 0.
pub type Chips = i64;

/// Durable player identity, assigned by the external account system.
pub type PlayerId = i64;

/// Position at a table, clockwise from seat zero.
pub type SeatIndex = usize;

/// Monotonic per-table state version. Bumped on every accepted transition;
/// used to detect stale actions and to cancel superseded timers.
pub type StateVersion = u64;

/// Identifier for one dealt hand at one table.
pub type HandId = uuid::Uuid;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DisplayName(String);

impl DisplayName {
    const MAX_LEN: usize = 24;

    pub fn new(s: &str) -> Self {
        let mut name: String = s
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        name.truncate(Self::MAX_LEN);
        Self(name)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for DisplayName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for DisplayName {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.small, self.big)
    }
}

/// A player's choice on their turn. Amounts on `Bet` and `Raise` are the
/// total the seat wagers this round, not the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "folds".to_string(),
            Self::Check => "checks".to_string(),
            Self::Call => "calls".to_string(),
            Self::Bet(amount) => format!("bets {amount}"),
            Self::Raise(amount) => format!("raises to {amount}"),
            Self::AllIn => "goes all-in".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// The actions legal for the seat currently to act, with the amounts that
/// make them legal. Sent alongside the turn signal so clients can render
/// exactly the buttons the engine will accept.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionChoices {
    pub can_check: bool,
    /// Amount owed to call, if there is an outstanding bet.
    pub call: Option<Chips>,
    /// Minimum total for an opening bet, if no bet is outstanding.
    pub min_bet: Option<Chips>,
    /// Minimum total for a raise, if a bet is outstanding and the seat can
    /// still raise.
    pub min_raise_to: Option<Chips>,
    /// The seat's remaining stack (the all-in total).
    pub all_in: Chips,
}

impl ActionChoices {
    /// Whether `action` is of a kind this choice set offers. Amount
    /// validation happens in the engine; this is the coarse filter.
    #[must_use]
    pub fn allows(&self, action: &Action) -> bool {
        match action {
            Action::Fold | Action::AllIn => true,
            Action::Check => self.can_check,
            Action::Call => self.call.is_some(),
            Action::Bet(_) => self.min_bet.is_some(),
            Action::Raise(_) => self.min_raise_to.is_some(),
        }
    }
}

impl fmt::Display for ActionChoices {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut options = vec!["fold".to_string()];
        if self.can_check {
            options.push("check".to_string());
        }
        if let Some(amount) = self.call {
            options.push(format!("call {amount}"));
        }
        if let Some(min) = self.min_bet {
            options.push(format!("bet >= {min}"));
        }
        if let Some(min) = self.min_raise_to {
            options.push(format!("raise to >= {min}"));
        }
        options.push(format!("all-in {}", self.all_in));
        write!(f, "{}", options.join(", "))
    }
}

/// Seat occupancy status. `Empty` is represented by the absence of an
/// occupant; these are the states of an occupied seat.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SeatStatus {
    /// Live and able to act.
    Seated,
    /// Skipped when dealing; stood up at the next hand boundary.
    SittingOut,
    /// Connection lost; keeps its stack and cards while the grace timer runs.
    DisconnectedGrace,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Seated => "seated",
            Self::SittingOut => "sitting out",
            Self::DisconnectedGrace => "disconnected",
        };
        write!(f, "{repr}")
    }
}

/// A player occupying a seat. The stack is owned by the seat while seated;
/// money moves between it and the player balance only through the ledger.
#[derive(Clone, Debug)]
pub struct Occupant {
    pub player: PlayerId,
    pub name: DisplayName,
    pub stack: Chips,
    pub status: SeatStatus,
    /// Two cards while a hand is live, empty between hands.
    pub hole: Vec<Card>,
    /// Amount wagered in the current betting round.
    pub round_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
}

impl Occupant {
    #[must_use]
    pub fn new(player: PlayerId, name: DisplayName, stack: Chips) -> Self {
        Self {
            player,
            name,
            stack,
            status: SeatStatus::Seated,
            hole: Vec::with_capacity(2),
            round_bet: 0,
            folded: false,
            all_in: false,
        }
    }

    /// Reset per-hand state at a hand boundary.
    pub fn reset_for_hand(&mut self) {
        self.hole.clear();
        self.round_bet = 0;
        self.folded = false;
        self.all_in = false;
    }

    /// Whether this seat is dealt into the next hand.
    #[must_use]
    pub fn deals_in(&self) -> bool {
        self.status == SeatStatus::Seated && self.stack > 0
    }

    /// Whether the seat still has a decision to make: in the hand, with
    /// chips behind.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.folded && !self.all_in && !self.hole.is_empty()
    }

    /// Whether the seat is contesting the pot (not folded, dealt in).
    #[must_use]
    pub fn in_hand(&self) -> bool {
        !self.folded && !self.hole.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Seat {
    pub occupant: Option<Occupant>,
}

impl Seat {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Redacted view of one seat. Hole cards are present only in the view built
/// for their owner, or for everyone once the hand reaches showdown.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatView {
    pub index: SeatIndex,
    pub name: DisplayName,
    pub stack: Chips,
    pub status: SeatStatus,
    pub round_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub hole: Option<Vec<Card>>,
}
