use semver::Version;

use super::*;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[test]
fn parse_tokens() -> anyhow::Result<()> {
    assert_eq!("latest".parse::<VersionSpec>()?, VersionSpec::Latest);
    assert_eq!(
        "1.2.0".parse::<VersionSpec>()?,
        VersionSpec::Exact(v("1.2.0"))
    );
    // padded endpoints
    let spec: VersionSpec = "[1.2,2.0)".parse()?;
    insta::assert_snapshot!(spec.to_string(), @"[1.2.0,2.0.0)");

    let spec: VersionSpec = "(,3.0]".parse()?;
    insta::assert_snapshot!(spec.to_string(), @"(,3.0.0]");

    assert!("[1.0".parse::<VersionSpec>().is_err());
    assert!("[not.a.version,2.0)".parse::<VersionSpec>().is_err());
    Ok(())
}

#[test]
fn range_bounds_are_respected() -> anyhow::Result<()> {
    let spec: VersionSpec = "[1.0.0,2.0.0)".parse()?;
    assert!(spec.matches(&v("1.0.0")));
    assert!(spec.matches(&v("1.2.0")));
    assert!(!spec.matches(&v("2.0.0")));
    assert!(!spec.matches(&v("0.9.0")));

    let spec: VersionSpec = "(1.0.0,2.0.0]".parse()?;
    assert!(!spec.matches(&v("1.0.0")));
    assert!(spec.matches(&v("2.0.0")));
    Ok(())
}

#[test]
fn highest_match_respects_exclusive_upper() -> anyhow::Result<()> {
    let published = [v("1.0.0"), v("1.2.0"), v("2.0.0")];
    let spec: VersionSpec = "[1.0.0,2.0.0)".parse()?;
    assert_eq!(spec.highest_match(published.iter()), Some(&v("1.2.0")));

    let none: VersionSpec = "[3.0.0,4.0.0)".parse()?;
    assert_eq!(none.highest_match(published.iter()), None);
    Ok(())
}

#[test]
fn prerelease_sorts_below_release() -> anyhow::Result<()> {
    let published = [v("1.0.0-alpha.1"), v("1.0.0")];
    let spec: VersionSpec = "latest".parse()?;
    assert_eq!(spec.highest_match(published.iter()), Some(&v("1.0.0")));
    Ok(())
}
