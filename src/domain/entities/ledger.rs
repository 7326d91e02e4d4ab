use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::{DrawId, DrawOutcome, LuckyDraw, User};
use crate::application::errors::CommandError;

pub const MIN_MINUTES: i64 = 1;
/// Seven days
pub const MAX_MINUTES: i64 = 10_080;
pub const MIN_WINNERS: i64 = 1;
pub const MAX_WINNERS: i64 = 100;

/// Parameters of a draw about to be created
#[derive(Debug, Clone)]
pub struct NewDraw {
    pub prize: String,
    pub minutes: i64,
    pub winners: i64,
    pub channel_id: u64,
    pub creator: User,
}

/// All known draws plus the id allocator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawLedger {
    draws: BTreeMap<DrawId, LuckyDraw>,
    last_draw_id: DrawId,
}

impl DrawLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. The allocator never goes below the
    /// highest stored id.
    pub fn from_parts(last_draw_id: DrawId, draws: impl IntoIterator<Item = LuckyDraw>) -> Self {
        let draws: BTreeMap<_, _> = draws.into_iter().map(|d| (d.id, d)).collect();
        let highest = draws.keys().next_back().copied().unwrap_or(0);
        Self {
            draws,
            last_draw_id: last_draw_id.max(highest),
        }
    }

    pub fn validate(minutes: i64, winners: i64) -> Result<(), CommandError> {
        if minutes < MIN_MINUTES {
            return Err(CommandError::DurationTooShort);
        }
        if minutes > MAX_MINUTES {
            return Err(CommandError::DurationTooLong);
        }
        if winners < MIN_WINNERS {
            return Err(CommandError::TooFewWinners);
        }
        if winners > MAX_WINNERS {
            return Err(CommandError::TooManyWinners);
        }
        Ok(())
    }

    pub fn create(&mut self, req: NewDraw, now: DateTime<Utc>) -> Result<&LuckyDraw, CommandError> {
        Self::validate(req.minutes, req.winners)?;

        self.last_draw_id += 1;
        let id = self.last_draw_id;
        let draw = LuckyDraw {
            id,
            prize: req.prize,
            end_time: now + Duration::minutes(req.minutes),
            participants: BTreeSet::new(),
            channel_id: req.channel_id,
            creator_id: req.creator.id,
            creator_name: req.creator.display_name(),
            active: true,
            created_at: now,
            ended_at: None,
            winners_count: req.winners as u32,
            winner_ids: Vec::new(),
            message_id: None,
        };
        let draw = self.draws.entry(id).or_insert(draw);
        Ok(&*draw)
    }

    pub fn get(&self, id: DrawId) -> Option<&LuckyDraw> {
        self.draws.get(&id)
    }

    pub fn get_mut(&mut self, id: DrawId) -> Option<&mut LuckyDraw> {
        self.draws.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LuckyDraw> {
        self.draws.values()
    }

    /// Active draws in creation order
    pub fn active(&self) -> Vec<&LuckyDraw> {
        self.draws.values().filter(|d| d.active).collect()
    }

    /// Most recently created ended draws first
    pub fn ended(&self, limit: usize) -> Vec<&LuckyDraw> {
        self.draws
            .values()
            .rev()
            .filter(|d| !d.active)
            .take(limit)
            .collect()
    }

    /// Ids of active draws whose end time has passed
    pub fn due(&self, now: DateTime<Utc>) -> Vec<DrawId> {
        self.draws
            .values()
            .filter(|d| d.is_due(now))
            .map(|d| d.id)
            .collect()
    }

    pub fn finish<R: Rng + ?Sized>(
        &mut self,
        id: DrawId,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<DrawOutcome, CommandError> {
        let draw = self.draws.get_mut(&id).ok_or(CommandError::DrawNotFound(id))?;
        draw.finish(rng, now).ok_or(CommandError::DrawAlreadyEnded(id))
    }

    pub fn last_draw_id(&self) -> DrawId {
        self.last_draw_id
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.draws.values().filter(|d| d.active).count()
    }
}
