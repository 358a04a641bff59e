//! Building a checker: required collaborators, lifetimes and their defaults.

use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;
use dialog_bakery::{
    Acl, Checker, CheckerBuilder, ConfigurationError, DEFAULT_AUTHENTICATION_LIFETIME,
    DEFAULT_CAPABILITY_LIFETIME, Operation,
};
use dialog_bakery_testkit::{Fixture, SERVICE_LOCATION, TestToken};
use pretty_assertions::assert_eq;
use testresult::TestResult;

const REQUIRED: [&str; 7] = [
    "verifier",
    "minter",
    "root_keys",
    "multi_op_store",
    "identity_service",
    "acls",
    "key",
];

/// A builder wired like the fixture's, minus the `missing` collaborator.
fn builder_without(fixture: &Fixture, missing: &str) -> CheckerBuilder<TestToken> {
    let mut builder = Checker::builder();
    if missing != "verifier" {
        builder = builder.verifier(Arc::new(fixture.bakery.clone()));
    }
    if missing != "minter" {
        builder = builder.minter(Arc::new(fixture.bakery.clone()));
    }
    if missing != "root_keys" {
        builder = builder.root_keys(Arc::new(fixture.root_keys.clone()));
    }
    if missing != "multi_op_store" {
        builder = builder.multi_op_store(Arc::new(fixture.multi_ops.clone()));
    }
    if missing != "identity_service" {
        builder = builder.identity_service(Arc::new(fixture.identities.clone()));
    }
    if missing != "acls" {
        builder = builder.acls(Arc::new(fixture.acls.clone()));
    }
    if missing != "key" {
        builder = builder.key(fixture.key.clone());
    }
    builder
}

#[test]
fn it_requires_every_collaborator() {
    let fixture = Fixture::new();
    for missing in REQUIRED {
        let error = builder_without(&fixture, missing).build().unwrap_err();
        assert_eq!(error, ConfigurationError::Missing(missing));
    }
}

#[test]
fn it_builds_with_defaults() -> TestResult {
    let fixture = Fixture::new();
    let checker = builder_without(&fixture, "").build()?;

    assert_eq!(checker.location(), "");
    assert_eq!(checker.capability_lifetime(), TimeDelta::minutes(5));
    assert_eq!(checker.authentication_lifetime(), TimeDelta::days(7));
    assert_eq!(DEFAULT_CAPABILITY_LIFETIME, Duration::from_secs(300));
    assert_eq!(DEFAULT_AUTHENTICATION_LIFETIME, Duration::from_secs(7 * 86_400));

    assert_eq!(fixture.checker()?.location(), SERVICE_LOCATION);
    Ok(())
}

#[test]
fn it_replaces_zero_lifetimes_with_the_defaults() -> TestResult {
    let checker = Fixture::new()
        .builder()
        .capability_lifetime(Duration::ZERO)
        .authentication_lifetime(Duration::ZERO)
        .build()?;

    assert_eq!(checker.capability_lifetime(), TimeDelta::minutes(5));
    assert_eq!(checker.authentication_lifetime(), TimeDelta::days(7));
    Ok(())
}

#[test]
fn it_keeps_configured_lifetimes() -> TestResult {
    let checker = Fixture::new()
        .builder()
        .capability_lifetime(Duration::from_secs(30))
        .authentication_lifetime(Duration::from_secs(3_600))
        .build()?;

    assert_eq!(checker.capability_lifetime(), TimeDelta::seconds(30));
    assert_eq!(checker.authentication_lifetime(), TimeDelta::hours(1));
    Ok(())
}

#[test]
fn it_rejects_lifetimes_no_expiry_can_hold() {
    let million_years = Duration::from_secs(1_000_000 * 365 * 86_400);
    let fixture = Fixture::new();

    let error = fixture
        .builder()
        .capability_lifetime(million_years)
        .build()
        .unwrap_err();
    assert_eq!(error, ConfigurationError::InvalidLifetime("capability_lifetime"));

    let error = fixture
        .builder()
        .authentication_lifetime(million_years)
        .build()
        .unwrap_err();
    assert_eq!(error, ConfigurationError::InvalidLifetime("authentication_lifetime"));

    let error = fixture
        .builder()
        .capability_lifetime(Duration::MAX)
        .build()
        .unwrap_err();
    assert_eq!(error, ConfigurationError::InvalidLifetime("capability_lifetime"));
}

#[test_log::test(tokio::test)]
async fn it_mints_with_century_long_lifetimes() -> TestResult {
    let century = Duration::from_secs(100 * 365 * 86_400);
    let fixture = Fixture::new();
    fixture.acls.set(Operation::new("doc1", "read"), Acl::everyone());
    let checker = fixture
        .builder()
        .capability_lifetime(century)
        .authentication_lifetime(century)
        .build()?;

    checker
        .capability(vec![], &[Operation::new("doc1", "read")], &[])
        .await?;

    let error = checker
        .authorize(vec![], &[Operation::login()], &[])
        .await
        .unwrap_err();
    assert!(error.discharge_required().is_some());
    Ok(())
}
