use wdm_rs::blocks::common::AttributeKind;
use wdm_rs::catalog::{canonical_name, AttributeCatalog, AttributeDef};
use wdm_rs::error::{ErrorClass, WdmError};
use wdm_rs::retcode::{self, Retcode};
use wdm_rs::{AttributeSelection, AttributeValue, DsnSpec, EngineConfig, Wdm};

#[test]
fn builtin_catalog_resolves_names_and_aliases() -> Result<(), WdmError> {
    let catalog = AttributeCatalog::builtin();
    let loc = catalog.resolve("location")?;
    assert_eq!((loc.index, loc.kind, loc.len), (290, AttributeKind::String, 8));
    assert_eq!(catalog.resolve("IDSCEN")?.index, 288);
    assert_eq!(catalog.resolve("Constituent")?.index, 289);
    assert_eq!(catalog.resolve("TSTEP")?.name, "TSSTEP");
    assert_eq!(catalog.resolve("DESCRIPTION")?.len, 48);
    assert_eq!(catalog.resolve("STATID")?.len, 16);
    assert_eq!(catalog.resolve("TSFILL")?.kind, AttributeKind::Real);
    assert!(matches!(catalog.resolve("TOOLONGNAME"), Err(WdmError::UnknownAttribute(_))));
    assert!(matches!(catalog.resolve("ZZZ"), Err(WdmError::UnknownAttribute(_))));
    assert_eq!(canonical_name(" scenario "), "IDSCEN");
    Ok(())
}

#[test]
fn catalog_rejects_duplicates() {
    let entries = vec![
        AttributeDef { index: 5, name: "A".into(), kind: AttributeKind::Int, len: 1 },
        AttributeDef { index: 5, name: "B".into(), kind: AttributeKind::Int, len: 1 },
    ];
    assert!(AttributeCatalog::from_entries(entries).is_err());
}

#[test]
fn catalog_file_replaces_builtin() -> Result<(), WdmError> {
    let dir = tempfile::tempdir()?;
    let mut entries = AttributeCatalog::builtin().entries().to_vec();
    entries.push(AttributeDef { index: 400, name: "basin".into(), kind: AttributeKind::String, len: 12 });
    let catalog_path = dir.path().join("catalog.json");
    std::fs::write(&catalog_path, serde_json::to_string(&entries)?)?;

    let config = EngineConfig { catalog_path: Some(catalog_path), ..EngineConfig::default() };
    let mut wdm = Wdm::with_config(config)?;
    assert_eq!(wdm.catalog().resolve("BASIN")?.index, 400);

    let path = dir.path().join("c.wdm");
    wdm.create_wdm(&path, false)?;
    wdm.create_dsn(&path, 1, &DsnSpec::default())?;
    wdm.set_attribute(&path, 1, "basin", "Potomac")?;
    let all = wdm.describe_dsn(&path, 1, &AttributeSelection::All)?;
    assert_eq!(all.get("BASIN"), Some(&AttributeValue::Text("Potomac".into())));
    Ok(())
}

#[test]
fn config_file_fills_defaults() -> Result<(), WdmError> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wdm.json");
    std::fs::write(&path, r#"{ "lock_timeout_ms": 5 }"#)?;
    let config = EngineConfig::from_file(&path)?;
    assert_eq!(config.lock_timeout_ms, 5);
    assert_eq!(config.lock_poll_ms, 50);
    assert_eq!(config.lock_suffix, ".lock");
    assert_eq!(config.default_fill, -999.0);

    std::fs::write(&path, "not json")?;
    let err = EngineConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, WdmError::Config(_)));
    assert_eq!(err.class(), ErrorClass::Validation);
    Ok(())
}

#[test]
fn retcode_table_decodes_known_codes() -> Result<(), WdmError> {
    assert_eq!(Retcode::new(-81).message(), "data set does not exist");
    assert_eq!(Retcode::new(-107).message(), "attribute not present on this data set");
    assert!(Retcode::new(-6).is_known());
    assert!(!Retcode::new(-9999).is_known());

    Retcode::new(retcode::ATTRIBUTE_NOT_PRESENT).check(retcode::OPTIONAL_ATTRIBUTE_BENIGN, String::new)?;
    let err = Retcode::new(retcode::DSN_OUT_OF_RANGE)
        .check(retcode::OPTIONAL_ATTRIBUTE_BENIGN, || "lookup dsn=0".to_string())
        .unwrap_err();
    match &err {
        WdmError::Engine { code, message, context } => {
            assert_eq!(*code, -84);
            assert_eq!(*message, "data set number out of valid range");
            assert_eq!(context, "lookup dsn=0");
        }
        other => panic!("expected Engine, got {other:?}"),
    }
    assert!(err.to_string().contains("-84"));
    Ok(())
}

#[test]
fn attribute_values_parse_by_kind() -> Result<(), WdmError> {
    let catalog = AttributeCatalog::builtin();
    assert_eq!(AttributeValue::parse(catalog.resolve("TSSTEP")?, " 15 ")?, AttributeValue::Int(15));
    assert_eq!(AttributeValue::parse(catalog.resolve("ELEV")?, "2.5")?, AttributeValue::Real(2.5));
    assert_eq!(
        AttributeValue::parse(catalog.resolve("STANAM")?, "Big Creek")?,
        AttributeValue::Text("Big Creek".into())
    );
    assert!(AttributeValue::parse(catalog.resolve("TCODE")?, "4.5").is_err());
    Ok(())
}
