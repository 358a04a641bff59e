//! One authorizer shared by concurrent calls classifies its tokens once.

use std::sync::Arc;

use dialog_bakery::{Acl, AuthorizeError, Operation, TokenSlice};
use dialog_bakery_testkit::{BrokenStore, Fixture};
use futures::future::join_all;
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn op(entity: &str, action: &str) -> Operation {
    Operation::new(entity, action)
}

#[test_log::test(tokio::test)]
async fn it_verifies_tokens_once_per_session() -> TestResult {
    let fixture = Fixture::new();
    fixture.acls.set(op("doc3", "read"), Acl::everyone());
    let checker = fixture.checker()?;

    let tokens: Vec<TokenSlice<_>> = vec![
        fixture.capability("doc1", &["read"]).await?.into(),
        fixture.capability("doc2", &["read", "write"]).await?.into(),
        fixture.login("alice").await?,
    ];
    let authorizer = checker.authorizer(tokens);

    let requests = [
        vec![op("doc1", "read")],
        vec![op("doc2", "write")],
        vec![op("doc1", "read"), op("doc2", "read")],
        vec![op("doc3", "read")],
        vec![Operation::login()],
    ];
    let results = join_all(requests.iter().map(|ops| authorizer.allow(ops, &[]))).await;

    for result in results {
        result?;
    }
    assert_eq!(fixture.bakery.verifications(), 3);

    authorizer.allow(&[op("doc1", "read")], &[]).await?;
    assert_eq!(fixture.bakery.verifications(), 3);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_shares_a_storage_failure_across_calls() -> TestResult {
    let fixture = Fixture::new();
    let broken = BrokenStore::new();
    let checker = fixture
        .builder()
        .root_keys(Arc::new(broken.clone()))
        .build()?;

    let token = fixture.capability("doc1", &["read"]).await?;
    let authorizer = checker.authorizer([TokenSlice::from(token)]);

    let first = authorizer.allow(&[op("doc1", "read")], &[]).await;
    let second = authorizer.allow(&[op("doc2", "read")], &[]).await;

    assert!(matches!(first, Err(AuthorizeError::Storage(_))));
    assert!(matches!(second, Err(AuthorizeError::Storage(_))));
    assert_eq!(broken.calls(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_answers_each_call_on_its_own_terms() -> TestResult {
    let fixture = Fixture::new();
    fixture.acls.set(op("doc2", "read"), Acl::new(["bob"]));
    let checker = fixture.checker()?;

    let token = fixture.capability("doc1", &["read"]).await?;
    let authorizer = checker.authorizer([TokenSlice::from(token)]);

    let info = authorizer.allow(&[op("doc1", "read")], &[]).await?;
    assert_eq!(info.tokens.len(), 1);

    let error = authorizer
        .allow(&[op("doc2", "read")], &[])
        .await
        .unwrap_err();
    assert!(error.discharge_required().is_some());

    let info = authorizer.allow(&[op("doc1", "read")], &[]).await?;
    assert_eq!(info.tokens, authorizer.tokens());
    Ok(())
}
