use std::collections::HashSet;
use std::str::FromStr;

use super::*;

#[test]
fn parse_forms() -> anyhow::Result<()> {
    let c = Coordinate::from_str("com.example:app")?;
    assert_eq!(c.version(), "latest");
    assert_eq!(c.extension(), Extension::Archive);

    let c = Coordinate::from_str("com.example:app:1.2.0")?;
    assert_eq!(c.version(), "1.2.0");
    assert_eq!(c.extension(), Extension::Archive);

    let c = Coordinate::from_str("com.example:app:lib")?;
    assert_eq!(c.version(), "latest");
    assert_eq!(c.extension(), Extension::Binary);

    let c = Coordinate::from_str("com.example:app:lib:2.0.0")?;
    assert_eq!(c.version(), "2.0.0");
    assert_eq!(c.extension(), Extension::Binary);

    assert!(Coordinate::from_str("com.example").is_err());
    assert!(Coordinate::from_str("com.example::1.0.0").is_err());
    assert!(Coordinate::from_str("a:b:c:d:e").is_err());

    Ok(())
}

#[test]
fn display_is_pattern_form() {
    let c = Coordinate::new("com.example", "app", "1.0.0", Extension::Archive);
    insta::assert_snapshot!(c.to_string(), @"com.example:app:arc:1.0.0");
}

#[test]
fn identity_ignores_classifier_and_location() {
    let plain = Coordinate::new("g", "a", "1.0.0", Extension::Binary);
    let mut located = plain.clone().with_classifier("sig");
    located.set_location("/tmp/somewhere");

    assert_eq!(plain, located);

    let mut set = HashSet::new();
    set.insert(plain);
    assert!(set.contains(&located));
}

#[test]
fn identity_distinguishes_extension() {
    let a = Coordinate::new("g", "a", "1.0.0", Extension::Binary);
    let b = Coordinate::new("g", "a", "1.0.0", Extension::Archive);
    assert_ne!(a, b);
}

#[test]
fn paths_and_companions() {
    let c = Coordinate::new("com.example.deep", "app", "1.0.0", Extension::Archive);
    assert_eq!(
        c.rel_path(),
        PathBuf::from("com/example/deep/app/1.0.0/app-1.0.0.arc")
    );

    let sig = c.signature_companion();
    assert_eq!(sig.classifier(), Some("sig"));
    assert_eq!(sig.file_name(), "app-1.0.0-sig.arc");

    let desc = c.descriptor_companion();
    assert_eq!(desc.extension(), Extension::Metadata);
    assert_eq!(desc.file_name(), "app-1.0.0.json");

    assert_eq!(c.lock_key(), "com.example.deep~app~1.0.0");
}
