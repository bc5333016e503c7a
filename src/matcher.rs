//! Counter-offer selection for shift trades
//!
//! A counter-offer for a requesting shift `r` is any other shift `c` with
//! `c.date == r.date`, `c.trade == true` and `r.slot` in `c.wanted`. When
//! several shifts qualify the one with the smallest id wins, so repeated runs
//! over the same rows always pick the same partner.
use super::error::StoreError;
use super::shift::Shift;
use super::shift::ShiftId;
use super::store::ShiftRead;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Only the counter-offer's wanted slots are checked against the requester.
    #[default]
    OneWay,
    /// Both owners must want the slot the other one gives away.
    Mutual,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Whether `candidate` can be swapped against `request`.
    ///
    /// A request that is not advertised never matches, whatever its wanted slots.
    pub fn is_counter_offer(&self, request: &Shift, candidate: &Shift) -> bool {
        if !request.trade || !candidate.trade {
            return false;
        }
        if candidate.id == request.id || candidate.date != request.date {
            return false;
        }
        if !candidate.wanted.contains(request.slot) {
            return false;
        }
        match self.policy {
            MatchPolicy::OneWay => true,
            MatchPolicy::Mutual => request.wanted.contains(candidate.slot),
        }
    }

    /// Looks up the counter-offer for `request`, reading through `store`.
    ///
    /// `Ok(None)` means no shift qualifies; read failures are returned as errors.
    pub fn find_counter_offer<S>(
        &self,
        store: &S,
        request: &Shift,
    ) -> Result<Option<ShiftId>, StoreError>
    where
        S: ShiftRead + ?Sized,
    {
        if !request.trade {
            return Ok(None);
        }

        let best = store
            .list_all()?
            .into_iter()
            .filter(|candidate| self.is_counter_offer(request, candidate))
            .map(|candidate| candidate.id)
            .min();

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::{EmployeeId, ShiftDate, TimeSlot, WantedSlots};
    use std::cell::Cell;

    struct Rows {
        shifts: Vec<Shift>,
        reads: Cell<usize>,
        fail: bool,
    }

    impl Rows {
        fn new(shifts: Vec<Shift>) -> Self {
            Self {
                shifts,
                reads: Cell::new(0),
                fail: false,
            }
        }
    }

    impl ShiftRead for Rows {
        fn get_by_id(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
            Ok(self.shifts.iter().find(|s| &s.id == id).cloned())
        }
        fn list_all(&self) -> Result<Vec<Shift>, StoreError> {
            self.reads.set(self.reads.get() + 1);
            if self.fail {
                return Err(StoreError::Encode("broken backend".into()));
            }
            Ok(self.shifts.clone())
        }
    }

    fn shift(id: &str, day: u32, slot: TimeSlot, trade: bool, wanted: &[TimeSlot]) -> Shift {
        Shift {
            id: ShiftId::new(id),
            owner: EmployeeId::new(format!("owner-of-{id}")),
            date: ShiftDate::from_ymd(2024, 5, day).unwrap(),
            slot,
            weekday: "Mi".into(),
            trade,
            wanted: wanted.iter().copied().collect::<WantedSlots>(),
        }
    }

    #[test]
    fn picks_compatible_offer() {
        let request = shift("a", 1, TimeSlot::Early, true, &[]);
        let rows = Rows::new(vec![
            request.clone(),
            shift("b", 1, TimeSlot::Late, true, &[TimeSlot::Early]),
        ]);

        let found = Matcher::default().find_counter_offer(&rows, &request).unwrap();
        assert_eq!(found, Some(ShiftId::new("b")));
    }

    #[test]
    fn never_matches_itself() {
        let request = shift("a", 1, TimeSlot::Early, true, &[TimeSlot::Early]);
        let rows = Rows::new(vec![request.clone()]);

        assert_eq!(Matcher::default().find_counter_offer(&rows, &request).unwrap(), None);
    }

    #[test]
    fn ignores_other_dates_and_withdrawn_offers() {
        let request = shift("a", 1, TimeSlot::Early, true, &[]);
        let rows = Rows::new(vec![
            shift("b", 2, TimeSlot::Late, true, &[TimeSlot::Early]),
            shift("c", 1, TimeSlot::Late, false, &[TimeSlot::Early]),
            shift("d", 1, TimeSlot::Late, true, &[TimeSlot::Night]),
        ]);

        assert_eq!(Matcher::default().find_counter_offer(&rows, &request).unwrap(), None);
    }

    #[test]
    fn lowest_id_wins_regardless_of_row_order() {
        let request = shift("m", 1, TimeSlot::Night, true, &[]);
        let rows = Rows::new(vec![
            shift("z", 1, TimeSlot::Early, true, &[TimeSlot::Night]),
            shift("k", 1, TimeSlot::Late, true, &[TimeSlot::Night]),
            shift("q", 1, TimeSlot::Early, true, &[TimeSlot::Night]),
        ]);

        let found = Matcher::default().find_counter_offer(&rows, &request).unwrap();
        assert_eq!(found, Some(ShiftId::new("k")));
    }

    #[test]
    fn one_way_rule_ignores_requester_wishes() {
        // shift 1 gives early and wants nothing, shift 2 gives late and wants early
        let one = shift("1", 1, TimeSlot::Early, true, &[]);
        let two = shift("2", 1, TimeSlot::Late, true, &[TimeSlot::Early]);
        let rows = Rows::new(vec![one.clone(), two.clone()]);
        let matcher = Matcher::new(MatchPolicy::OneWay);

        assert_eq!(matcher.find_counter_offer(&rows, &two).unwrap(), None);
        assert_eq!(
            matcher.find_counter_offer(&rows, &one).unwrap(),
            Some(ShiftId::new("2"))
        );
    }

    #[test]
    fn mutual_rule_requires_both_wishes() {
        let one = shift("1", 1, TimeSlot::Early, true, &[]);
        let two = shift("2", 1, TimeSlot::Late, true, &[TimeSlot::Early]);
        let matcher = Matcher::new(MatchPolicy::Mutual);

        assert!(!matcher.is_counter_offer(&one, &two));

        let one = shift("1", 1, TimeSlot::Early, true, &[TimeSlot::Late]);
        assert!(matcher.is_counter_offer(&one, &two));
        assert!(matcher.is_counter_offer(&two, &one));
    }

    #[test]
    fn untraded_request_does_not_query() {
        let request = shift("a", 1, TimeSlot::Early, false, &[]);
        let rows = Rows::new(vec![shift("b", 1, TimeSlot::Late, true, &[TimeSlot::Early])]);

        assert_eq!(Matcher::default().find_counter_offer(&rows, &request).unwrap(), None);
        assert_eq!(rows.reads.get(), 0);
    }

    #[test]
    fn read_failure_is_an_error_not_a_miss() {
        let request = shift("a", 1, TimeSlot::Early, true, &[]);
        let mut rows = Rows::new(vec![]);
        rows.fail = true;

        assert!(Matcher::default().find_counter_offer(&rows, &request).is_err());
    }
}
