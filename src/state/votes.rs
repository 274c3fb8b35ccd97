//! Vote collection, tally, and round scoring.

use std::collections::BTreeMap;

use crate::error::Rejection;
use crate::state::player::{PlayerId, PlayerRoster};

/// Votes for the current round, voter -> target.
#[derive(Debug, Default, Clone)]
pub struct VoteBoard {
    votes: BTreeMap<PlayerId, PlayerId>,
}

impl VoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite `voter`'s vote.
    pub fn cast(&mut self, voter: PlayerId, target: PlayerId) -> Result<(), Rejection> {
        if voter == target {
            return Err(Rejection::SelfVote);
        }
        self.votes.insert(voter, target);
        Ok(())
    }

    /// Current target of `voter`.
    pub fn vote_of(&self, voter: PlayerId) -> Option<PlayerId> {
        self.votes.get(&voter).copied()
    }

    /// Drop every vote cast by or against `player`.
    pub fn purge(&mut self, player: PlayerId) {
        self.votes
            .retain(|voter, target| *voter != player && *target != player);
    }

    /// Number of voters with a recorded vote.
    pub fn received(&self) -> usize {
        self.votes.len()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    /// (voter, target) pairs in voter order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, PlayerId)> + '_ {
        self.votes.iter().map(|(v, t)| (*v, *t))
    }

    /// Most-voted target. Ties go to the lowest player id.
    pub fn tally(&self) -> Option<PlayerId> {
        tally(self.iter())
    }
}

fn tally(votes: impl Iterator<Item = (PlayerId, PlayerId)>) -> Option<PlayerId> {
    let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
    for (_, target) in votes {
        *counts.entry(target).or_default() += 1;
    }
    // Ascending id order, so only a strictly higher count displaces the leader.
    let mut best: Option<(PlayerId, usize)> = None;
    for (target, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((target, count));
        }
    }
    best.map(|(target, _)| target)
}

/// Outcome of scoring one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundScore {
    pub impostor: PlayerId,
    pub voted_out: Option<PlayerId>,
    pub correct: bool,
    pub num_correct: usize,
    pub num_possible: usize,

    /// Points to add per player
    pub awards: BTreeMap<PlayerId, i64>,
}

/// Score a round against `impostor`.
///
/// Only votes whose voter is still on the roster count. Returns `None` when
/// the impostor has left the roster.
pub fn score_round(
    votes: &VoteBoard,
    impostor: PlayerId,
    roster: &PlayerRoster,
) -> Option<RoundScore> {
    if !roster.contains(impostor) {
        return None;
    }

    let counted: Vec<(PlayerId, PlayerId)> = votes
        .iter()
        .filter(|(voter, _)| roster.contains(*voter))
        .collect();

    let mut awards: BTreeMap<PlayerId, i64> = BTreeMap::new();
    let mut num_correct: usize = 0;
    let mut confusion: i64 = 0;
    for (voter, target) in &counted {
        if *voter == impostor {
            continue;
        }
        if *target == impostor {
            num_correct += 1;
            *awards.entry(*voter).or_default() += 1;
        } else {
            confusion += 1;
        }
    }
    if confusion > 0 {
        *awards.entry(impostor).or_default() += confusion;
    }

    let voted_out = tally(counted.iter().copied());
    Some(RoundScore {
        impostor,
        voted_out,
        correct: voted_out == Some(impostor),
        num_correct,
        num_possible: roster.connected_count().saturating_sub(1),
        awards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::connection::ConnectionId;
    use pretty_assertions::assert_eq;

    fn roster_of(n: usize) -> (PlayerRoster, Vec<PlayerId>) {
        let mut roster = PlayerRoster::new();
        let mut ids: Vec<PlayerId> = (0..n)
            .map(|i| {
                roster
                    .join(Some(format!("P{}", i).as_str()), None, ConnectionId::new(i as u64))
                    .unwrap()
                    .id
            })
            .collect();
        ids.sort();
        (roster, ids)
    }

    #[test]
    fn test_self_vote_rejected() {
        let mut board = VoteBoard::new();
        let a = PlayerId::new();
        assert_eq!(board.cast(a, a), Err(Rejection::SelfVote));
        assert_eq!(board.received(), 0);
    }

    #[test]
    fn test_recast_overwrites() {
        let mut board = VoteBoard::new();
        let (a, b, c) = (PlayerId::new(), PlayerId::new(), PlayerId::new());
        board.cast(a, b).unwrap();
        board.cast(a, c).unwrap();

        assert_eq!(board.received(), 1);
        assert_eq!(board.vote_of(a), Some(c));
    }

    #[test]
    fn test_tally_majority() {
        let (_, ids) = roster_of(3);
        let mut board = VoteBoard::new();
        board.cast(ids[0], ids[2]).unwrap();
        board.cast(ids[1], ids[2]).unwrap();
        board.cast(ids[2], ids[0]).unwrap();

        assert_eq!(board.tally(), Some(ids[2]));
    }

    #[test]
    fn test_tally_tie_goes_to_lowest_id() {
        let (_, ids) = roster_of(4);
        let mut board = VoteBoard::new();
        board.cast(ids[0], ids[3]).unwrap();
        board.cast(ids[3], ids[1]).unwrap();
        board.cast(ids[1], ids[3]).unwrap();
        board.cast(ids[2], ids[1]).unwrap();

        assert_eq!(board.tally(), Some(ids[1]));
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(VoteBoard::new().tally(), None);
    }

    #[test]
    fn test_purge_removes_both_sides() {
        let (_, ids) = roster_of(3);
        let mut board = VoteBoard::new();
        board.cast(ids[0], ids[1]).unwrap();
        board.cast(ids[1], ids[2]).unwrap();
        board.cast(ids[2], ids[0]).unwrap();

        board.purge(ids[1]);
        assert_eq!(board.received(), 1);
        assert_eq!(board.vote_of(ids[2]), Some(ids[0]));
    }

    #[test]
    fn test_scoring_correct_vote() {
        let (roster, ids) = roster_of(3);
        let impostor = ids[0];
        let mut board = VoteBoard::new();
        board.cast(ids[1], impostor).unwrap();
        board.cast(ids[2], impostor).unwrap();
        board.cast(impostor, ids[1]).unwrap();

        let score = score_round(&board, impostor, &roster).unwrap();
        assert_eq!(score.voted_out, Some(impostor));
        assert!(score.correct);
        assert_eq!(score.num_correct, 2);
        assert_eq!(score.num_possible, 2);
        assert_eq!(score.awards.get(&ids[1]), Some(&1));
        assert_eq!(score.awards.get(&ids[2]), Some(&1));
        assert_eq!(score.awards.get(&impostor), None);
    }

    #[test]
    fn test_scoring_rewards_impostor_for_confusion() {
        let (roster, ids) = roster_of(4);
        let impostor = ids[3];
        let mut board = VoteBoard::new();
        board.cast(ids[0], ids[1]).unwrap();
        board.cast(ids[1], ids[0]).unwrap();
        board.cast(ids[2], impostor).unwrap();
        // The impostor's own vote never scores
        board.cast(impostor, ids[0]).unwrap();

        let score = score_round(&board, impostor, &roster).unwrap();
        assert_eq!(score.awards.get(&impostor), Some(&2));
        assert_eq!(score.awards.get(&ids[2]), Some(&1));
        assert_eq!(score.num_correct, 1);
        assert_eq!(score.voted_out, Some(ids[0]));
        assert!(!score.correct);
    }

    #[test]
    fn test_scoring_skipped_without_impostor() {
        let (mut roster, ids) = roster_of(3);
        let mut board = VoteBoard::new();
        board.cast(ids[1], ids[0]).unwrap();
        roster.remove(ids[0]);

        assert_eq!(score_round(&board, ids[0], &roster), None);
    }

    #[test]
    fn test_scoring_ignores_departed_voters() {
        let (mut roster, ids) = roster_of(4);
        let impostor = ids[0];
        let mut board = VoteBoard::new();
        board.cast(ids[1], impostor).unwrap();
        board.cast(ids[2], impostor).unwrap();
        roster.remove(ids[2]);

        let score = score_round(&board, impostor, &roster).unwrap();
        assert_eq!(score.num_correct, 1);
        assert_eq!(score.awards.get(&ids[2]), None);
    }
}
