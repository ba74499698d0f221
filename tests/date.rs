use proptest::prelude::*;
use wdm_rs::date::{parse_date, time_difference, TimeCode, WdmDate};
use wdm_rs::error::WdmError;

#[test]
fn hour_24_rolls_to_next_day() -> Result<(), WdmError> {
    let d = WdmDate::new(1999, 12, 31, 24, 0, 0);
    assert_eq!(d.normalize()?, WdmDate::ymd(2000, 1, 1));
    let d = WdmDate::new(2000, 2, 28, 24, 0, 0);
    assert_eq!(d.normalize()?, WdmDate::ymd(2000, 2, 29));
    let plain = WdmDate::new(1970, 6, 1, 13, 30, 0);
    assert_eq!(plain.normalize()?, plain);
    Ok(())
}

#[test]
fn hour_24_needs_zero_minutes() {
    assert!(WdmDate::from_parts([1970, 1, 1, 24, 30, 0]).is_err());
    assert!(WdmDate::from_parts([1970, 2, 30, 0, 0, 0]).is_err());
    assert!(WdmDate::from_parts([1970, 1, 1, 24, 0, 0]).is_ok());
}

#[test]
fn calendar_intervals() -> Result<(), WdmError> {
    let jan = WdmDate::ymd(1970, 1, 1);
    assert_eq!(time_difference(jan, WdmDate::ymd(1970, 3, 1), TimeCode::Month, 1)?, 2);
    assert_eq!(time_difference(WdmDate::ymd(1970, 1, 15), WdmDate::ymd(1970, 3, 10), TimeCode::Month, 1)?, 1);
    assert_eq!(time_difference(jan, WdmDate::ymd(1980, 1, 1), TimeCode::Year, 5)?, 2);
    assert_eq!(time_difference(jan, WdmDate::ymd(1971, 1, 1), TimeCode::Day, 1)?, 365);
    assert_eq!(time_difference(jan, WdmDate::ymd(1970, 1, 2), TimeCode::Minute, 15)?, 96);
    assert_eq!(time_difference(WdmDate::ymd(1970, 1, 2), jan, TimeCode::Hour, 1)?, -24);
    assert!(time_difference(jan, jan, TimeCode::Day, 0).is_err());
    Ok(())
}

#[test]
fn advance_steps_months_on_the_calendar() -> Result<(), WdmError> {
    let start = WdmDate::ymd(1970, 1, 1);
    assert_eq!(start.advance(TimeCode::Month, 1, 13)?, WdmDate::ymd(1971, 2, 1));
    assert_eq!(start.advance(TimeCode::Year, 1, -1)?, WdmDate::ymd(1969, 1, 1));
    assert_eq!(start.advance(TimeCode::Minute, 15, 96)?, WdmDate::ymd(1970, 1, 2));
    assert_eq!(
        WdmDate::new(1970, 1, 1, 24, 0, 0).advance(TimeCode::Hour, 1, 1)?,
        WdmDate::new(1970, 1, 2, 1, 0, 0)
    );
    Ok(())
}

#[test]
fn truncate_keeps_significant_fields() {
    let d = WdmDate::new(1985, 7, 14, 13, 45, 30);
    assert_eq!(d.truncate(TimeCode::Day), WdmDate::ymd(1985, 7, 14));
    assert_eq!(d.truncate(TimeCode::Month), WdmDate::ymd(1985, 7, 1));
    assert_eq!(d.truncate(TimeCode::Year), WdmDate::ymd(1985, 1, 1));
    assert_eq!(d.truncate(TimeCode::Minute), WdmDate::new(1985, 7, 14, 13, 45, 0));
    assert_eq!(d.truncate(TimeCode::Second), d);
}

#[test]
fn parse_free_form_dates() -> Result<(), WdmError> {
    assert_eq!(parse_date("1970-01-01T00:00")?, WdmDate::ymd(1970, 1, 1));
    assert_eq!(parse_date("1970 1 1")?, WdmDate::ymd(1970, 1, 1));
    assert_eq!(parse_date("1970")?, WdmDate::ymd(1970, 1, 1));
    assert_eq!(parse_date("2001-03-04 05:06:07")?, WdmDate::new(2001, 3, 4, 5, 6, 7));
    assert_eq!("1999-12-31T24:00".parse::<WdmDate>()?, WdmDate::new(1999, 12, 31, 24, 0, 0));
    assert!(parse_date("no digits").is_err());
    assert!(parse_date("1970-13-01").is_err());
    Ok(())
}

#[test]
fn display_is_iso_like() {
    assert_eq!(WdmDate::new(1970, 1, 2, 3, 4, 5).to_string(), "1970-01-02T03:04:05");
}

#[test]
fn time_codes_map_both_ways() {
    for tcode in TimeCode::ALL {
        assert_eq!(TimeCode::from_code(tcode.code()), Some(tcode));
    }
    assert_eq!(TimeCode::from_code(7), None);
    assert_eq!(TimeCode::Day.freq_alias(), "D");
    assert_eq!(TimeCode::Month.freq_alias(), "MS");
    assert_eq!(TimeCode::Minute.name(), "minute");
}

fn any_date() -> impl Strategy<Value = WdmDate> {
    (1900i32..2100, 1u32..=12, 1u32..=28, 0u32..=24, 0u32..60, 0u32..60).prop_map(
        |(year, month, day, hour, minute, second)| {
            if hour == 24 {
                WdmDate::new(year, month, day, 24, 0, 0)
            } else {
                WdmDate::new(year, month, day, hour, minute, second)
            }
        },
    )
}

fn any_tcode() -> impl Strategy<Value = TimeCode> {
    prop::sample::select(TimeCode::ALL.to_vec())
}

proptest! {
    #[test]
    fn normalize_is_idempotent(date in any_date()) {
        let once = date.normalize().unwrap();
        prop_assert_eq!(once.normalize().unwrap(), once);
        prop_assert!(once.hour < 24);
    }

    #[test]
    fn difference_inverts_advance(
        date in any_date(),
        tcode in any_tcode(),
        tsstep in 1i32..=10,
        n in 0i64..500,
    ) {
        let start = date.normalize().unwrap().truncate(tcode);
        let end = start.advance(tcode, tsstep, n).unwrap();
        prop_assert_eq!(time_difference(start, end, tcode, tsstep).unwrap(), n);
    }
}
