//! Core shift types and the input builders that validate them
use super::error::ValidationError;
use bech32::{Bech32m, Hrp};
use chrono::NaiveDate;
use std::{fmt, str::FromStr};

pub const MAX_WEEKDAY_LEN: usize = 32;
pub const SHIFT_ID_PREFIX: &str = "shift_";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftId(String);

// opaque employee identity handed over by the session gate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmployeeId(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftDate(NaiveDate);

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum TimeSlot {
    #[n(0)]
    Early,
    #[n(1)]
    Late,
    #[n(2)]
    Night,
}

/// The set of slots an owner accepts in exchange, one bit per [`TimeSlot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WantedSlots(u8);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    #[n(0)]
    pub id: ShiftId,
    #[n(1)]
    pub owner: EmployeeId,
    #[n(2)]
    pub date: ShiftDate,
    #[n(3)]
    pub slot: TimeSlot,
    #[n(4)]
    pub weekday: String,
    #[n(5)]
    pub trade: bool,
    #[n(6)]
    pub wanted: WantedSlots,
}

/// Validated date, slot and weekday of a shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftAttributes {
    pub date: ShiftDate,
    pub slot: TimeSlot,
    pub weekday: String,
}

// Draft of a new shift, trade fields are never part of creation
#[derive(Debug, Default, Clone)]
pub struct NewShift {
    date: Option<String>,
    slot: Option<String>,
    weekday: Option<String>,
}

// Draft of an update, every field of the shift except the owner is replaced
#[derive(Debug, Default, Clone)]
pub struct ShiftUpdate {
    id: String,
    date: Option<String>,
    slot: Option<String>,
    weekday: Option<String>,
    trade: bool,
    wanted: WantedSlots,
    expected_revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpdate {
    pub id: ShiftId,
    pub attributes: ShiftAttributes,
    pub trade: bool,
    pub wanted: WantedSlots,
    pub expected_revision: Option<String>,
}

impl ShiftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    /// Fresh id for a new row.
    ///
    /// The payload is a uuid7, so ids sort by creation time both as strings
    /// and as sled keys. It is bech32m encoded under [`SHIFT_ID_PREFIX`], which
    /// adds a checksum and keeps ids readable in logs.
    pub fn generate() -> anyhow::Result<Self> {
        let hrp = Hrp::parse(SHIFT_ID_PREFIX)?;
        let id = bech32::encode::<Bech32m>(hrp, uuid7::uuid7().as_bytes())?;
        Ok(Self(id))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ShiftDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for ShiftDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate(s.to_string()))
    }
}

impl fmt::Display for ShiftDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Early, TimeSlot::Late, TimeSlot::Night];

    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Early => "früh",
            TimeSlot::Late => "spät",
            TimeSlot::Night => "nacht",
        }
    }
    fn bit(self) -> u8 {
        match self {
            TimeSlot::Early => 0b001,
            TimeSlot::Late => 0b010,
            TimeSlot::Night => 0b100,
        }
    }
}

impl FromStr for TimeSlot {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "früh" | "early" => Ok(TimeSlot::Early),
            "spät" | "late" => Ok(TimeSlot::Late),
            "nacht" | "night" => Ok(TimeSlot::Night),
            _ => Err(ValidationError::InvalidSlot(s.to_string())),
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl WantedSlots {
    const MASK: u8 = 0b111;

    pub fn empty() -> Self {
        Self(0)
    }
    pub fn with(mut self, slot: TimeSlot) -> Self {
        self.insert(slot);
        self
    }
    pub fn insert(&mut self, slot: TimeSlot) {
        self.0 |= slot.bit();
    }
    pub fn remove(&mut self, slot: TimeSlot) {
        self.0 &= !slot.bit();
    }
    pub fn contains(&self, slot: TimeSlot) -> bool {
        self.0 & slot.bit() != 0
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn clear(&mut self) {
        self.0 = 0;
    }
    pub fn iter(&self) -> impl Iterator<Item = TimeSlot> + use<> {
        let wanted = *self;
        TimeSlot::ALL
            .into_iter()
            .filter(move |slot| wanted.contains(*slot))
    }
}

impl FromIterator<TimeSlot> for WantedSlots {
    fn from_iter<I: IntoIterator<Item = TimeSlot>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), WantedSlots::with)
    }
}

impl Shift {
    /// Content hash of the stored record, changes whenever any field changes.
    pub fn revision(&self) -> anyhow::Result<String> {
        let cbor = minicbor::to_vec(self)?;
        Ok(sha256::digest(&cbor))
    }
    /// Withdraws the offer, used on both sides of a completed swap.
    pub fn clear_trade(&mut self) {
        self.trade = false;
        self.wanted.clear();
    }
    // owner is never touched by an update, only by a swap
    pub fn with_update(&self, update: &ValidatedUpdate) -> Shift {
        Shift {
            id: self.id.clone(),
            owner: self.owner.clone(),
            date: update.attributes.date,
            slot: update.attributes.slot,
            weekday: update.attributes.weekday.clone(),
            trade: update.trade,
            wanted: update.wanted,
        }
    }
}

fn validate_attributes(
    date: Option<&String>,
    slot: Option<&String>,
    weekday: Option<&String>,
) -> Result<ShiftAttributes, ValidationError> {
    let date: ShiftDate = date.ok_or(ValidationError::Missing("date"))?.parse()?;
    let slot: TimeSlot = slot.ok_or(ValidationError::Missing("time"))?.parse()?;
    let weekday = weekday.ok_or(ValidationError::Missing("day"))?.trim();

    let len = weekday.chars().count();
    if len == 0 || len > MAX_WEEKDAY_LEN {
        return Err(ValidationError::InvalidWeekday {
            len,
            max: MAX_WEEKDAY_LEN,
        });
    }

    Ok(ShiftAttributes {
        date,
        slot,
        weekday: weekday.to_string(),
    })
}

impl NewShift {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }
    pub fn set_slot(mut self, slot: &str) -> Self {
        self.slot = Some(slot.to_string());
        self
    }
    pub fn set_weekday(mut self, weekday: &str) -> Self {
        self.weekday = Some(weekday.to_string());
        self
    }
    pub fn validate_and_finalise(&self) -> Result<ShiftAttributes, ValidationError> {
        validate_attributes(
            self.date.as_ref(),
            self.slot.as_ref(),
            self.weekday.as_ref(),
        )
    }
}

impl ShiftUpdate {
    /// Starts an update of the shift with the given id.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
    /// Prefills an update with the current attributes of `shift`.
    pub fn from_shift(shift: &Shift) -> Self {
        Self::new(shift.id.as_str())
            .set_date(&shift.date.to_string())
            .set_slot(shift.slot.label())
            .set_weekday(&shift.weekday)
            .set_trade(shift.trade)
            .set_wanted(shift.wanted)
    }
    pub fn set_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }
    pub fn set_slot(mut self, slot: &str) -> Self {
        self.slot = Some(slot.to_string());
        self
    }
    pub fn set_weekday(mut self, weekday: &str) -> Self {
        self.weekday = Some(weekday.to_string());
        self
    }
    pub fn set_trade(mut self, trade: bool) -> Self {
        self.trade = trade;
        self
    }
    pub fn set_wanted(mut self, wanted: WantedSlots) -> Self {
        self.wanted = wanted;
        self
    }
    pub fn want(mut self, slot: TimeSlot) -> Self {
        self.wanted.insert(slot);
        self
    }
    pub fn expect_revision(mut self, revision: String) -> Self {
        self.expected_revision = Some(revision);
        self
    }
    pub fn validate_and_finalise(&self) -> Result<ValidatedUpdate, ValidationError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyShiftId);
        }
        let attributes = validate_attributes(
            self.date.as_ref(),
            self.slot.as_ref(),
            self.weekday.as_ref(),
        )?;

        Ok(ValidatedUpdate {
            id: ShiftId::new(id),
            attributes,
            trade: self.trade,
            wanted: self.wanted,
            expected_revision: self.expected_revision.clone(),
        })
    }
}

impl<C> minicbor::Encode<C> for ShiftId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for ShiftId {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(ShiftId(d.str()?.to_owned()))
    }
}

impl<C> minicbor::Encode<C> for EmployeeId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for EmployeeId {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(EmployeeId(d.str()?.to_owned()))
    }
}

// dates are stored as days since 0001-01-01
impl<C> minicbor::Encode<C> for ShiftDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        use chrono::Datelike;
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for ShiftDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(ShiftDate)
            .ok_or(minicbor::decode::Error::message("shift date out of range"))
    }
}

impl<C> minicbor::Encode<C> for WantedSlots {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u8(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for WantedSlots {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bits = d.u8()?;
        if bits & !Self::MASK != 0 {
            return Err(minicbor::decode::Error::message("unknown wanted slot bits"));
        }
        Ok(WantedSlots(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Shift {
        Shift {
            id: ShiftId::new("shift_a"),
            owner: EmployeeId::new("alice"),
            date: ShiftDate::from_ymd(2024, 5, 1).unwrap(),
            slot: TimeSlot::Early,
            weekday: "Mi".into(),
            trade: true,
            wanted: WantedSlots::empty().with(TimeSlot::Night),
        }
    }

    #[test]
    fn shift_encoding() {
        let original = sample();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Shift = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn generated_ids_carry_prefix_and_are_unique() {
        let first = ShiftId::generate().unwrap();
        let second = ShiftId::generate().unwrap();

        assert!(first.as_str().starts_with("shift_1"));
        assert_ne!(first, second);
        let (hrp, payload) = bech32::decode(second.as_str()).unwrap();
        assert_eq!(hrp.as_str(), SHIFT_ID_PREFIX);
        assert_eq!(payload.len(), 16);
    }

    #[test]
    fn slot_labels_parse_in_both_languages() {
        assert_eq!("früh".parse::<TimeSlot>().unwrap(), TimeSlot::Early);
        assert_eq!("Late".parse::<TimeSlot>().unwrap(), TimeSlot::Late);
        assert_eq!(" nacht ".parse::<TimeSlot>().unwrap(), TimeSlot::Night);
        assert!("noon".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn wanted_slots_behave_as_a_set() {
        let mut wanted = WantedSlots::empty().with(TimeSlot::Early).with(TimeSlot::Early);
        assert!(wanted.contains(TimeSlot::Early));
        assert!(!wanted.contains(TimeSlot::Late));
        assert_eq!(wanted.iter().count(), 1);

        wanted.insert(TimeSlot::Night);
        wanted.remove(TimeSlot::Early);
        assert_eq!(wanted.iter().collect::<Vec<_>>(), vec![TimeSlot::Night]);

        wanted.clear();
        assert!(wanted.is_empty());
    }

    #[test]
    fn wanted_slots_reject_unknown_bits() {
        let encoding = minicbor::to_vec(0b1000u8).unwrap();
        assert!(minicbor::decode::<WantedSlots>(&encoding).is_err());
    }

    #[test]
    fn revision_tracks_content() {
        let shift = sample();
        let mut changed = shift.clone();
        changed.clear_trade();

        assert_eq!(shift.revision().unwrap(), sample().revision().unwrap());
        assert_ne!(shift.revision().unwrap(), changed.revision().unwrap());
    }

    #[test]
    fn update_validation_reports_bad_fields() {
        let base = ShiftUpdate::new("shift_a")
            .set_date("2024-05-01")
            .set_slot("früh")
            .set_weekday("Mi");
        assert!(base.validate_and_finalise().is_ok());

        let bad_date = base.clone().set_date("01.05.2024");
        assert_eq!(
            bad_date.validate_and_finalise(),
            Err(ValidationError::InvalidDate("01.05.2024".into()))
        );

        let bad_day = base.clone().set_weekday("   ");
        assert!(matches!(
            bad_day.validate_and_finalise(),
            Err(ValidationError::InvalidWeekday { len: 0, .. })
        ));

        let no_id = ShiftUpdate::new(" ")
            .set_date("2024-05-01")
            .set_slot("früh")
            .set_weekday("Mi");
        assert_eq!(no_id.validate_and_finalise(), Err(ValidationError::EmptyShiftId));

        let missing_slot = NewShift::new().set_date("2024-05-01").set_weekday("Mi");
        assert_eq!(
            missing_slot.validate_and_finalise(),
            Err(ValidationError::Missing("time"))
        );
    }

    #[test]
    fn update_keeps_owner() {
        let shift = sample();
        let update = ShiftUpdate::from_shift(&shift)
            .set_slot("spät")
            .set_trade(false)
            .validate_and_finalise()
            .unwrap();

        let updated = shift.with_update(&update);
        assert_eq!(updated.owner, shift.owner);
        assert_eq!(updated.slot, TimeSlot::Late);
        assert!(!updated.trade);
    }
}
