mod common;

use anyhow::Result;
use serde_json::json;

use common::{Event, Recorder};
use fury_api::database::models::{Earthquake, Organization, User};
use fury_api::database::{DatabaseError, ListQuery, UnitOfWorkError};
use fury_api::filter::Sort;

#[tokio::test]
async fn add_returns_the_stored_row() -> Result<()> {
    let recorder = Recorder::new();
    recorder.push_rows(vec![json!({ "id": 11, "name": "Acme" })]);
    let mut uow = recorder.uow(true, true);

    let stored = uow
        .scope(|uow| {
            Box::pin(async move {
                Ok::<_, UnitOfWorkError>(uow.repository::<Organization>()?.add(&Organization::new("Acme")).await?)
            })
        })
        .await?;

    assert_eq!(stored, Organization { id: Some(11), name: "Acme".to_string() });
    assert_eq!(
        recorder.statements(),
        vec!["INSERT INTO \"organization\" (\"name\") VALUES ($1::text) RETURNING *".to_string()]
    );
    assert_eq!(recorder.params()[0], vec![json!("Acme")]);
    Ok(())
}

#[tokio::test]
async fn missing_rows_come_back_as_none() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);

    let (found, deleted) = uow
        .scope(|uow| {
            Box::pin(async move {
                let mut repo = uow.repository::<Earthquake>()?;
                let found = repo.get_by_id(404).await?;
                let deleted = repo.delete(404).await?;
                Ok::<_, UnitOfWorkError>((found, deleted))
            })
        })
        .await?;

    assert!(found.is_none());
    assert!(deleted.is_none());
    let statements = recorder.statements();
    assert_eq!(statements[0], "SELECT * FROM \"earthquake\" WHERE \"id\" = $1::bigint ORDER BY \"id\" ASC");
    assert_eq!(statements[1], "DELETE FROM \"earthquake\" WHERE \"id\" = $1::bigint RETURNING *");
    Ok(())
}

#[tokio::test]
async fn every_repository_uses_the_same_session() -> Result<()> {
    let recorder = Recorder::new();
    recorder.push_rows(vec![json!({ "id": 1, "title": "M 5.1 - Kermadec Islands", "magnitude": 5.1 })]);
    recorder.push_rows(vec![json!({
        "id": 3,
        "name": "Ada",
        "email": "ada@example.com",
        "organization_id": 1,
        "status": 1,
        "is_system": false
    })]);
    let mut uow = recorder.uow(true, true);

    let (earthquakes, user) = uow
        .scope(|uow| {
            Box::pin(async move {
                let query = ListQuery::new().sorts(vec![Sort::desc("magnitude")]).limit(5, None);
                let earthquakes = uow.repository::<Earthquake>()?.list(&query).await?;
                let user = uow.repository::<User>()?.get_by_email("ada@example.com").await?;
                Ok::<_, UnitOfWorkError>((earthquakes, user))
            })
        })
        .await?;

    assert_eq!(earthquakes.len(), 1);
    assert_eq!(earthquakes[0].magnitude, Some(5.1));
    assert_eq!(user.and_then(|u| u.id), Some(3));
    assert_eq!(recorder.count(|e| matches!(e, Event::Open { .. })), 1);
    assert_eq!(
        recorder.statements()[1],
        "SELECT * FROM \"user\" WHERE \"email\" = $1::text ORDER BY \"id\" ASC LIMIT 1"
    );
    Ok(())
}

#[tokio::test]
async fn empty_id_list_skips_the_store() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);

    let found = uow
        .scope(|uow| {
            Box::pin(async move { Ok::<_, UnitOfWorkError>(uow.repository::<Earthquake>()?.list_by_ids(&[]).await?) })
        })
        .await?;

    assert!(found.is_empty());
    assert!(recorder.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn store_errors_roll_back_and_propagate() -> Result<()> {
    let recorder = Recorder::new();
    recorder.fail_statement("DELETE FROM");
    let mut uow = recorder.uow(true, true);

    let result = uow
        .scope(|uow| {
            Box::pin(async move { Ok::<_, UnitOfWorkError>(uow.repository::<Earthquake>()?.delete(9).await?) })
        })
        .await;

    assert!(matches!(result, Err(UnitOfWorkError::Database(DatabaseError::QueryError(_)))));
    assert_eq!(recorder.count(|e| *e == Event::Rollback), 1);
    assert_eq!(recorder.count(|e| *e == Event::Commit), 0);
    Ok(())
}

#[tokio::test]
async fn update_requires_an_id() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);

    let result = uow
        .scope(|uow| {
            Box::pin(async move {
                Ok::<_, UnitOfWorkError>(uow.repository::<Earthquake>()?.update(&Earthquake::new("untitled")).await?)
            })
        })
        .await;

    assert!(result.is_err());
    assert!(recorder.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn partial_update_leaves_other_columns_alone() -> Result<()> {
    let recorder = Recorder::new();
    recorder.push_rows(vec![json!({ "id": 9, "title": "M 4.8 - Offshore Chile", "magnitude": 4.9 })]);
    let mut uow = recorder.uow(true, true);

    let updates = json!({ "magnitude": 4.9 }).as_object().cloned().unwrap_or_default();
    let updated = uow
        .scope(|uow| {
            Box::pin(async move {
                Ok::<_, UnitOfWorkError>(uow.repository::<Earthquake>()?.update_by_id(9, &updates).await?)
            })
        })
        .await?;

    assert_eq!(updated.and_then(|e| e.magnitude), Some(4.9));
    assert_eq!(
        recorder.statements(),
        vec!["UPDATE \"earthquake\" SET \"magnitude\" = $1::double precision WHERE \"id\" = $2::bigint RETURNING *"
            .to_string()]
    );
    assert_eq!(recorder.params()[0], vec![json!(4.9), json!(9)]);
    Ok(())
}

#[tokio::test]
async fn delete_many_returns_every_deleted_row() -> Result<()> {
    let recorder = Recorder::new();
    recorder.push_rows(vec![json!({ "id": 1, "name": "Acme" }), json!({ "id": 2, "name": "Globex" })]);
    let mut uow = recorder.uow(true, true);

    let (deleted, none) = uow
        .scope(|uow| {
            Box::pin(async move {
                let mut repo = uow.repository::<Organization>()?;
                let deleted = repo.delete_many(&[1, 2]).await?;
                let none = repo.delete_many(&[]).await?;
                Ok::<_, UnitOfWorkError>((deleted, none))
            })
        })
        .await?;

    assert_eq!(deleted.iter().filter_map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(none.is_empty());
    assert_eq!(
        recorder.statements(),
        vec!["DELETE FROM \"organization\" WHERE \"id\" IN ($1::bigint, $2::bigint) RETURNING *".to_string()]
    );
    assert_eq!(recorder.count(|e| *e == Event::Commit), 1);
    Ok(())
}
