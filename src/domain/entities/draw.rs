use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::UserId;

/// Draw identifier, allocated sequentially from 1
pub type DrawId = u64;

/// Represents a single lucky draw (giveaway)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuckyDraw {
    pub id: DrawId,
    pub prize: String,
    pub end_time: DateTime<Utc>,
    pub participants: BTreeSet<UserId>,
    pub channel_id: u64,
    pub creator_id: UserId,
    pub creator_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub winners_count: u32,
    pub winner_ids: Vec<UserId>,
    /// Announcement message carrying the join button
    pub message_id: Option<u64>,
}

/// Why a join attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    Closed,
    AlreadyJoined,
    IsCreator,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Closed => write!(f, "此抽獎活動已結束或不存在！"),
            JoinError::AlreadyJoined => write!(f, "你已經參加過這個抽獎了！"),
            JoinError::IsCreator => write!(f, "創建者沒辦法參與抽獎！"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Result of ending a draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    pub draw_id: DrawId,
    pub winners: Vec<UserId>,
    pub requested: u32,
    pub participants: usize,
}

impl DrawOutcome {
    /// Fewer people joined than there were winner slots
    pub fn is_short(&self) -> bool {
        self.participants > 0 && self.winners.len() < self.requested as usize
    }
}

impl LuckyDraw {
    /// Add a participant, returning the new participant count
    pub fn join(&mut self, user_id: UserId) -> Result<usize, JoinError> {
        if !self.active {
            return Err(JoinError::Closed);
        }
        if self.participants.contains(&user_id) {
            return Err(JoinError::AlreadyJoined);
        }
        if user_id == self.creator_id {
            return Err(JoinError::IsCreator);
        }
        self.participants.insert(user_id);
        Ok(self.participants.len())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && now >= self.end_time
    }

    /// Whole minutes left, never negative
    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_minutes().max(0)
    }

    /// First winner, kept for older readers of the data file
    pub fn winner_id(&self) -> Option<UserId> {
        self.winner_ids.first().copied()
    }

    /// Close the draw and pick up to `winners_count` distinct winners.
    ///
    /// Returns `None` when the draw was already closed.
    pub fn finish<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Option<DrawOutcome> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.ended_at = Some(now);

        let pool: Vec<UserId> = self.participants.iter().copied().collect();
        let amount = (self.winners_count as usize).min(pool.len());
        self.winner_ids = rand::seq::index::sample(rng, pool.len(), amount)
            .into_iter()
            .map(|i| pool[i])
            .collect();

        Some(DrawOutcome {
            draw_id: self.id,
            winners: self.winner_ids.clone(),
            requested: self.winners_count,
            participants: pool.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn draw(winners_count: u32) -> LuckyDraw {
        let now = Utc::now();
        LuckyDraw {
            id: 1,
            prize: "Steam 1000".to_string(),
            end_time: now + Duration::minutes(10),
            participants: BTreeSet::new(),
            channel_id: 10,
            creator_id: 99,
            creator_name: "host".to_string(),
            active: true,
            created_at: now,
            ended_at: None,
            winners_count,
            winner_ids: Vec::new(),
            message_id: None,
        }
    }

    #[test]
    fn join_rules() {
        let mut d = draw(1);
        assert_eq!(d.join(1), Ok(1));
        assert_eq!(d.join(2), Ok(2));
        assert_eq!(d.join(1), Err(JoinError::AlreadyJoined));
        assert_eq!(d.join(99), Err(JoinError::IsCreator));

        d.active = false;
        assert_eq!(d.join(3), Err(JoinError::Closed));
        assert_eq!(d.participants.len(), 2);
    }

    #[test]
    fn finish_picks_distinct_participants() {
        let mut d = draw(3);
        for id in 1..=10 {
            d.join(id).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = d.finish(&mut rng, Utc::now()).unwrap();

        assert_eq!(outcome.winners.len(), 3);
        let unique: BTreeSet<_> = outcome.winners.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(outcome.winners.iter().all(|w| d.participants.contains(w)));
        assert!(!d.active);
        assert!(d.ended_at.is_some());
        assert_eq!(d.winner_id(), outcome.winners.first().copied());
        assert!(!outcome.is_short());
    }

    #[test]
    fn finish_with_fewer_participants_than_slots() {
        let mut d = draw(5);
        d.join(1).unwrap();
        d.join(2).unwrap();
        let outcome = d.finish(&mut StdRng::seed_from_u64(1), Utc::now()).unwrap();
        assert_eq!(outcome.winners.len(), 2);
        assert!(outcome.is_short());
    }

    #[test]
    fn finish_without_participants() {
        let mut d = draw(1);
        let outcome = d.finish(&mut StdRng::seed_from_u64(1), Utc::now()).unwrap();
        assert!(outcome.winners.is_empty());
        assert!(d.winner_ids.is_empty());
        assert!(!outcome.is_short());
        assert!(d.finish(&mut StdRng::seed_from_u64(1), Utc::now()).is_none());
    }

    #[test]
    fn minutes_left_is_clamped() {
        let d = draw(1);
        let later = d.end_time + Duration::minutes(5);
        assert_eq!(d.minutes_left(later), 0);
        assert!(d.is_due(later));
        assert_eq!(d.minutes_left(d.end_time - Duration::seconds(90)), 1);
    }
}
