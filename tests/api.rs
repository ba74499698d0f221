use std::path::{Path, PathBuf};

use tempfile::TempDir;
use wdm_rs::blocks::common::INITIAL_FILE_LEN;
use wdm_rs::{
    AttributeSelection, AttributeValue, DsnSpec, ErrorClass, TimeCode, Wdm, WdmDate, WdmError,
};

fn spec(tcode: TimeCode, tsstep: i32, base_year: i32) -> DsnSpec {
    DsnSpec {
        tstype: "FLOW".into(),
        base_year,
        tcode,
        tsstep,
        statid: "01234567".into(),
        scenario: "OBSERVED".into(),
        location: "LOC1".into(),
        description: "Test series".into(),
        constituent: "FLOW".into(),
        tsfill: -999.0,
    }
}

fn new_file(dir: &TempDir, wdm: &mut Wdm) -> Result<PathBuf, WdmError> {
    let path = dir.path().join("test.wdm");
    wdm.create_wdm(&path, false)?;
    Ok(path)
}

fn setup() -> Result<(TempDir, Wdm, PathBuf), WdmError> {
    let dir = tempfile::tempdir()?;
    let mut wdm = Wdm::new();
    let path = new_file(&dir, &mut wdm)?;
    Ok((dir, wdm, path))
}

fn text(s: &str) -> AttributeValue {
    AttributeValue::Text(s.to_string())
}

fn exists(wdm: &mut Wdm, path: &Path, dsn: i32) -> Result<bool, WdmError> {
    match wdm.describe_dsn(path, dsn, &AttributeSelection::Default) {
        Ok(_) => Ok(true),
        Err(WdmError::DsnNotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[test]
fn create_wdm_lays_out_empty_file() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    assert_eq!(std::fs::metadata(&path)?.len(), INITIAL_FILE_LEN);
    assert_eq!(INITIAL_FILE_LEN, 40 * 1024);
    assert!(wdm.list_dsns(&path)?.is_empty());
    assert_eq!(wdm.open_file_count(), 0);
    Ok(())
}

#[test]
fn create_wdm_respects_overwrite() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1900))?;

    let err = wdm.create_wdm(&path, false).unwrap_err();
    assert!(matches!(err, WdmError::FileExists(_)));
    assert_eq!(err.class(), ErrorClass::Io);
    assert!(exists(&mut wdm, &path, 1)?);

    wdm.create_wdm(&path, true)?;
    assert!(!exists(&mut wdm, &path, 1)?);
    Ok(())
}

#[test]
fn missing_file_is_reported() -> Result<(), WdmError> {
    let dir = tempfile::tempdir()?;
    let mut wdm = Wdm::new();
    let err = wdm
        .describe_dsn(dir.path().join("absent.wdm"), 1, &AttributeSelection::Default)
        .unwrap_err();
    assert!(matches!(err, WdmError::FileNotFound(_)));
    Ok(())
}

#[test]
fn corrupt_file_is_rejected() -> Result<(), WdmError> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("junk.wdm");
    std::fs::write(&path, vec![0u8; 4096])?;
    let mut wdm = Wdm::new();
    let err = wdm.describe_dsn(&path, 1, &AttributeSelection::Default).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert_eq!(wdm.open_file_count(), 0);
    Ok(())
}

#[test]
fn dsn_lifecycle() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let s = spec(TimeCode::Day, 1, 1970);
    wdm.create_dsn(&path, 101, &s)?;

    let err = wdm.create_dsn(&path, 101, &s).unwrap_err();
    assert!(matches!(err, WdmError::DsnExists(101)));
    assert_eq!(err.retcode(), Some(-71));
    assert_eq!(err.class(), ErrorClass::Directory);
    assert_eq!(wdm.open_file_count(), 0);

    wdm.delete_dsn(&path, 101)?;
    assert!(!exists(&mut wdm, &path, 101)?);
    wdm.create_dsn(&path, 101, &s)?;
    assert!(exists(&mut wdm, &path, 101)?);
    Ok(())
}

#[test]
fn deleting_missing_dsn_succeeds() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.delete_dsn(&path, 55)?;
    Ok(())
}

#[test]
fn dsn_range_is_checked() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let s = spec(TimeCode::Day, 1, 1970);
    assert!(matches!(wdm.create_dsn(&path, 0, &s), Err(WdmError::DsnOutOfRange(0))));
    assert!(matches!(wdm.create_dsn(&path, 32001, &s), Err(WdmError::DsnOutOfRange(32001))));
    wdm.create_dsn(&path, 32000, &s)?;
    assert_eq!(wdm.list_dsns(&path)?.keys().copied().collect::<Vec<_>>(), vec![32000]);
    Ok(())
}

#[test]
fn renumber_moves_metadata() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 101, &spec(TimeCode::Day, 1, 1970))?;
    let before = wdm.describe_dsn(&path, 101, &AttributeSelection::All)?;

    wdm.renumber_dsn(&path, 101, 201)?;
    assert!(matches!(
        wdm.describe_dsn(&path, 101, &AttributeSelection::All),
        Err(WdmError::DsnNotFound(101))
    ));
    let after = wdm.describe_dsn(&path, 201, &AttributeSelection::All)?;
    assert_eq!(after.dsn, 201);
    assert_eq!(after.attributes, before.attributes);
    Ok(())
}

#[test]
fn renumber_checks_both_numbers() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let s = spec(TimeCode::Day, 1, 1970);
    wdm.create_dsn(&path, 1, &s)?;
    wdm.create_dsn(&path, 2, &s)?;
    assert!(matches!(wdm.renumber_dsn(&path, 3, 4), Err(WdmError::DsnNotFound(3))));
    assert!(matches!(wdm.renumber_dsn(&path, 1, 2), Err(WdmError::DsnExists(2))));
    assert!(exists(&mut wdm, &path, 1)?);
    Ok(())
}

#[test]
fn too_long_attribute_leaves_no_partial_dsn() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let mut s = spec(TimeCode::Minute, 15, 1970);
    s.location = "ABCDEFGHI".into();
    match wdm.create_dsn(&path, 101, &s) {
        Err(WdmError::AttributeTooLong { field, max_len, .. }) => {
            assert_eq!(field, "IDLOCN");
            assert_eq!(max_len, 8);
        }
        other => panic!("expected AttributeTooLong, got {other:?}"),
    }
    assert!(!exists(&mut wdm, &path, 101)?);

    s.location = "ABCDEFGH".into();
    wdm.create_dsn(&path, 101, &s)?;
    let d = wdm.describe_dsn(&path, 101, &AttributeSelection::Default)?;
    assert_eq!(d.get("LOCATION"), Some(&text("ABCDEFGH")));
    Ok(())
}

#[test]
fn non_finite_fill_is_rejected() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let mut s = spec(TimeCode::Day, 1, 1970);
    s.tsfill = f32::NAN;
    let err = wdm.create_dsn(&path, 1, &s).unwrap_err();
    assert!(matches!(err, WdmError::AttributeTypeMismatch { ref name, .. } if name == "TSFILL"));
    assert!(!exists(&mut wdm, &path, 1)?);

    s.tsfill = f32::INFINITY;
    assert!(wdm.create_dsn(&path, 1, &s).is_err());
    assert!(!exists(&mut wdm, &path, 1)?);

    s.tsfill = -999.0;
    wdm.create_dsn(&path, 1, &s)?;
    for bad in ["NaN", "inf", "-inf"] {
        let err = wdm.set_attribute(&path, 1, "TSFILL", bad).unwrap_err();
        assert!(matches!(err, WdmError::AttributeTypeMismatch { .. }));
    }
    let d = wdm.describe_dsn(&path, 1, &AttributeSelection::names(["TSFILL"]))?;
    assert_eq!(d.get("TSFILL"), Some(&AttributeValue::Real(-999.0)));

    wdm.write_series(&path, 1, &[1.0, f64::NAN, 3.0], WdmDate::ymd(1970, 1, 1), TimeCode::Day, 1)?;
    let series = wdm.read_series(&path, 1, None, None)?;
    assert_eq!(series.values, vec![Some(1.0), None, Some(3.0)]);
    Ok(())
}

#[test]
fn describe_reports_broken_layout() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1970))?;
    wdm.set_attribute(&path, 1, "TGROUP", "9")?;
    let err = wdm.describe_dsn(&path, 1, &AttributeSelection::Default).unwrap_err();
    assert_eq!(err.retcode(), Some(-101));
    assert_eq!(wdm.open_file_count(), 0);
    Ok(())
}

#[test]
fn describe_default_set() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 101, &spec(TimeCode::Minute, 15, 1970))?;
    let d = wdm.describe_dsn(&path, 101, &AttributeSelection::Default)?;

    assert_eq!(d.dsn, 101);
    assert_eq!(d.attributes.len(), 10);
    assert_eq!(d.get("TSSTEP"), Some(&AttributeValue::Int(15)));
    assert_eq!(d.get("TCODE"), Some(&AttributeValue::Int(2)));
    assert_eq!(d.get("TSBYR"), Some(&AttributeValue::Int(1970)));
    assert_eq!(d.get("TSFILL"), Some(&AttributeValue::Real(-999.0)));
    assert_eq!(d.get("SCENARIO"), Some(&text("OBSERVED")));
    assert_eq!(d.get("CONSTITUENT"), Some(&text("FLOW")));
    assert_eq!(d.get("DESCRIPTION"), Some(&text("Test series")));
    assert_eq!(d.get("STATID"), Some(&text("01234567")));
    assert_eq!(d.tcode, Some(TimeCode::Minute));
    assert_eq!(d.tcode_name, Some("T"));
    assert_eq!(d.tsstep, Some(15));
    assert_eq!(d.start_date, None);
    assert_eq!(d.llsdat, None);
    Ok(())
}

#[test]
fn describe_is_idempotent() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 7, &spec(TimeCode::Day, 1, 1970))?;
    wdm.write_series(&path, 7, &[1.0, 2.0, 3.0], WdmDate::ymd(1975, 6, 1), TimeCode::Day, 1)?;
    let first = wdm.describe_dsn(&path, 7, &AttributeSelection::All)?;
    let second = wdm.describe_dsn(&path, 7, &AttributeSelection::All)?;
    assert_eq!(first, second);
    assert_eq!(first.to_json()?, second.to_json()?);
    Ok(())
}

#[test]
fn describe_all_omits_absent_attributes() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1970))?;
    let all = wdm.describe_dsn(&path, 1, &AttributeSelection::All)?;
    assert_eq!(all.get("TGROUP"), Some(&AttributeValue::Int(6)));
    assert_eq!(all.get("VBTIME"), Some(&AttributeValue::Int(1)));
    assert!(!all.attributes.contains_key("ELEV"));
    assert_eq!(all.attributes.len(), 14);

    let named = wdm.describe_dsn(
        &path,
        1,
        &AttributeSelection::names(["ELEV", "location", "START_DATE", "DSN"]),
    )?;
    assert_eq!(named.attributes.len(), 2);
    assert_eq!(named.get("ELEV"), Some(&AttributeValue::NotPresent));
    assert_eq!(named.get("IDLOCN"), Some(&text("LOC1")));

    let err = wdm
        .describe_dsn(&path, 1, &AttributeSelection::names(["NOSUCH"]))
        .unwrap_err();
    assert!(matches!(err, WdmError::UnknownAttribute(_)));
    Ok(())
}

#[test]
fn description_serializes_absent_as_null() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1970))?;
    let d = wdm.describe_dsn(&path, 1, &AttributeSelection::names(["ELEV", "IDLOCN"]))?;
    let json: serde_json::Value = serde_json::from_str(&d.to_json()?)?;
    assert_eq!(json["dsn"], 1);
    assert!(json["attributes"]["ELEV"].is_null());
    assert_eq!(json["attributes"]["IDLOCN"], "LOC1");
    Ok(())
}

#[test]
fn set_attribute_parses_by_type() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1970))?;

    wdm.set_attribute(&path, 1, "elev", "123.5")?;
    wdm.set_attribute(&path, 1, "LOCATION", "NEWLOC  ")?;
    wdm.set_attribute(&path, 1, "SCENARIO", "  ABC")?;
    wdm.set_attribute(&path, 1, "STFIPS", "51")?;
    let d = wdm.describe_dsn(&path, 1, &AttributeSelection::names(["ELEV", "IDLOCN", "STFIPS"]))?;
    assert_eq!(d.get("ELEV"), Some(&AttributeValue::Real(123.5)));
    assert_eq!(d.get("IDLOCN"), Some(&text("NEWLOC")));
    assert_eq!(d.get("STFIPS"), Some(&AttributeValue::Int(51)));
    let d = wdm.describe_dsn(&path, 1, &AttributeSelection::names(["SCENARIO"]))?;
    assert_eq!(d.get("IDSCEN"), Some(&text("  ABC")));

    let err = wdm.set_attribute(&path, 1, "STFIPS", "fifty").unwrap_err();
    assert!(matches!(err, WdmError::AttributeTypeMismatch { .. }));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(matches!(
        wdm.set_attribute(&path, 1, "IDLOCN", "TOOLONGNAME"),
        Err(WdmError::AttributeTooLong { max_len: 8, .. })
    ));
    assert!(matches!(
        wdm.set_attribute(&path, 1, "IDLOCN", "CAFÉ"),
        Err(WdmError::AttributeTypeMismatch { .. })
    ));
    assert!(matches!(
        wdm.set_attribute(&path, 1, "NOSUCH", "1"),
        Err(WdmError::UnknownAttribute(_))
    ));
    assert!(matches!(
        wdm.set_attribute(&path, 2, "ELEV", "1"),
        Err(WdmError::DsnNotFound(2))
    ));
    assert_eq!(wdm.open_file_count(), 0);
    Ok(())
}

#[test]
fn layout_attributes_are_frozen_by_data() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    wdm.create_dsn(&path, 1, &spec(TimeCode::Day, 1, 1970))?;
    wdm.set_attribute(&path, 1, "TSSTEP", "2")?;
    wdm.set_attribute(&path, 1, "TSSTEP", "1")?;
    wdm.write_series(&path, 1, &[1.0], WdmDate::ymd(1970, 1, 1), TimeCode::Day, 1)?;

    let err = wdm.set_attribute(&path, 1, "TCODE", "3").unwrap_err();
    assert_eq!(err.retcode(), Some(-104));
    assert_eq!(err.class(), ErrorClass::Protocol);
    wdm.set_attribute(&path, 1, "STANAM", "still editable")?;

    wdm.clear_series(&path, 1)?;
    wdm.set_attribute(&path, 1, "TCODE", "3")?;
    Ok(())
}

#[test]
fn list_dsns_describes_every_dsn() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    for dsn in [3, 1, 600, 2] {
        wdm.create_dsn(&path, dsn, &spec(TimeCode::Hour, 1, 1980))?;
    }
    wdm.delete_dsn(&path, 2)?;
    let listing = wdm.list_dsns(&path)?;
    assert_eq!(listing.keys().copied().collect::<Vec<_>>(), vec![1, 3, 600]);
    assert_eq!(listing[&600].get("TSBYR"), Some(&AttributeValue::Int(1980)));
    Ok(())
}

#[test]
fn deleted_records_are_reused() -> Result<(), WdmError> {
    let (_dir, mut wdm, path) = setup()?;
    let s = spec(TimeCode::Day, 1, 1970);
    // Roughly 55 years of daily values: one data record per year.
    let values: Vec<f64> = (0..20_000).map(f64::from).collect();
    wdm.create_dsn(&path, 1, &s)?;
    wdm.write_series(&path, 1, &values, WdmDate::ymd(1970, 1, 1), TimeCode::Day, 1)?;
    let len = std::fs::metadata(&path)?.len();
    assert!(len > INITIAL_FILE_LEN);

    for _ in 0..3 {
        wdm.delete_dsn(&path, 1)?;
        wdm.create_dsn(&path, 1, &s)?;
        wdm.write_series(&path, 1, &values, WdmDate::ymd(1970, 1, 1), TimeCode::Day, 1)?;
    }
    assert_eq!(std::fs::metadata(&path)?.len(), len);
    Ok(())
}
