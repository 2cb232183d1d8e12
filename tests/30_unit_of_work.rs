mod common;

use anyhow::Result;
use serde_json::json;

use common::{Event, Recorder};
use fury_api::config::UnitOfWorkConfig;
use fury_api::database::models::{Earthquake, User};
use fury_api::database::{
    DatabaseError, NoopHooks, ScopeExit, TenantContext, TenantScope, UnitOfWorkError, UnitOfWorkFactory,
    UowOptions,
};
use fury_api::types::EntityKind;

fn addr<T>(value: &T) -> usize {
    value as *const T as usize
}

fn boom() -> UnitOfWorkError {
    UnitOfWorkError::Database(DatabaseError::QueryError("boom".to_string()))
}

// Three nested scopes, one session, one commit at the very end
#[tokio::test]
async fn nested_scopes_share_one_session_and_commit_once() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);

    uow.scope(|uow| {
        Box::pin(async move {
            assert_eq!(uow.context_depth(), 1);
            assert!(uow.is_root_context());
            uow.scope(|uow| {
                Box::pin(async move {
                    uow.scope(|uow| {
                        Box::pin(async move {
                            assert_eq!(uow.context_depth(), 3);
                            Ok::<_, UnitOfWorkError>(())
                        })
                    })
                    .await
                })
            })
            .await
        })
    })
    .await?;

    assert_eq!(uow.context_depth(), 0);
    assert_eq!(recorder.events(), vec![Event::Open { read_only: false }, Event::Commit, Event::Close]);
    Ok(())
}

#[tokio::test]
async fn without_autocommit_nothing_is_committed() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(false, true);

    for _ in 0..2 {
        uow.scope(|uow| Box::pin(async move { uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await }))
            .await?;
    }

    assert_eq!(recorder.count(|e| *e == Event::Commit), 0);
    assert_eq!(recorder.count(|e| matches!(e, Event::Open { .. })), 2);
    assert_eq!(recorder.count(|e| *e == Event::Close), 2);
    Ok(())
}

#[tokio::test]
async fn inner_failure_rolls_back_the_whole_unit() -> Result<()> {
    for ignore_nested in [true, false] {
        let recorder = Recorder::new();
        let mut uow = recorder.uow(true, ignore_nested);

        let result: Result<(), UnitOfWorkError> = uow
            .scope(|uow| {
                Box::pin(async move { uow.scope(|_| Box::pin(async { Err::<(), _>(boom()) })).await })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(uow.context_depth(), 0);
        assert_eq!(
            recorder.events(),
            vec![Event::Open { read_only: false }, Event::Rollback, Event::Close],
            "ignore_nested={}",
            ignore_nested
        );
    }
    Ok(())
}

// autocommit=true, autocommit_ignore_nested=true: the inner exit does not commit
#[tokio::test]
async fn inner_exit_defers_commit_to_outer_exit() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);
    let log = recorder.clone();

    uow.scope(move |uow| {
        Box::pin(async move {
            uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;
            assert_eq!(log.count(|e| *e == Event::Commit), 0);
            Ok::<_, UnitOfWorkError>(())
        })
    })
    .await?;

    assert_eq!(recorder.count(|e| *e == Event::Commit), 1);
    Ok(())
}

// autocommit=true, autocommit_ignore_nested=false commits while still nested.
// Kept for compatibility: the outer scope's transaction ends early.
#[tokio::test]
async fn nested_autocommit_commits_before_outer_exit() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, false);
    let log = recorder.clone();

    uow.scope(move |uow| {
        Box::pin(async move {
            uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;
            assert_eq!(log.count(|e| *e == Event::Commit), 1);
            assert_eq!(uow.context_depth(), 1);
            Ok::<_, UnitOfWorkError>(())
        })
    })
    .await?;

    assert_eq!(
        recorder.events(),
        vec![Event::Open { read_only: false }, Event::Commit, Event::Commit, Event::Close]
    );
    Ok(())
}

// Outer failure after a nested autocommit still rolls back what is left
#[tokio::test]
async fn nested_autocommit_then_outer_failure() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, false);

    let result: Result<(), UnitOfWorkError> = uow
        .scope(|uow| {
            Box::pin(async move {
                uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;
                Err::<(), _>(boom())
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(
        recorder.events(),
        vec![Event::Open { read_only: false }, Event::Commit, Event::Rollback, Event::Close]
    );
    Ok(())
}

#[tokio::test]
async fn tenant_session_sets_role_then_parameter() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::tenant(7));

    uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Open { read_only: false },
            Event::Execute("SET SESSION ROLE \"tenant_user\"".to_string()),
            Event::Execute("SET app.current_organization_id = 7".to_string()),
            Event::Execute("RESET ROLE".to_string()),
            Event::Commit,
            Event::Close,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn role_follows_read_only_and_query_user() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::tenant(7).read_only(true));
    uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;

    let recorder_q = Recorder::new();
    let mut uow = recorder_q.tenant_uow(UowOptions::tenant(7).read_only(true).query_user(true));
    uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;

    assert_eq!(recorder.events()[0], Event::Open { read_only: true });
    assert_eq!(recorder.statements()[0], "SET SESSION ROLE \"tenant_user_ro\"");
    assert_eq!(recorder_q.statements()[0], "SET SESSION ROLE \"tenant_query_ro\"");
    Ok(())
}

#[tokio::test]
async fn role_reset_failure_does_not_block_commit() -> Result<()> {
    let recorder = Recorder::new();
    recorder.fail_statement("RESET ROLE");
    let mut uow = recorder.tenant_uow(UowOptions::tenant(7));

    uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;

    assert_eq!(recorder.count(|e| *e == Event::Commit), 1);
    Ok(())
}

#[tokio::test]
async fn switching_to_another_tenant_fails() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::default());

    uow.scope(|uow| {
        Box::pin(async move {
            uow.with_tenant(TenantScope::new(7), |uow| {
                Box::pin(async move {
                    let err = uow
                        .with_tenant(TenantScope::new(8), |_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) }))
                        .await
                        .unwrap_err();
                    assert!(matches!(err, UnitOfWorkError::InvalidTenantSwitch { current: 7, requested: 8 }));
                    assert_eq!(uow.context_depth(), 2);

                    // Same tenant is fine
                    uow.with_tenant(TenantScope::new(7), |uow| {
                        Box::pin(async move {
                            assert_eq!(uow.context_depth(), 3);
                            assert_eq!(uow.tenant().tenant_id, Some(7));
                            Ok::<_, UnitOfWorkError>(())
                        })
                    })
                    .await
                })
            })
            .await
        })
    })
    .await?;

    // Role and parameter are applied again on the re-entry
    let sets = recorder.count(|e| *e == Event::Execute("SET app.current_organization_id = 7".to_string()));
    assert_eq!(sets, 2);
    assert_eq!(recorder.count(|e| matches!(e, Event::Open { .. })), 1);
    Ok(())
}

#[tokio::test]
async fn tenant_is_restored_after_success() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::default());
    let before = uow.tenant();

    uow.with_tenant(TenantScope::new(5).query_user(true), |uow| {
        Box::pin(async move {
            assert_eq!(uow.tenant(), TenantContext { tenant_id: Some(5), read_only: false, query_user: true });
            Ok::<_, UnitOfWorkError>(())
        })
    })
    .await?;

    assert_eq!(uow.tenant(), before);
    assert_eq!(uow.context_depth(), 0);
    // Outermost switch resets the role after the body
    assert!(recorder.statements().contains(&"RESET ROLE".to_string()));
    Ok(())
}

#[tokio::test]
async fn tenant_is_restored_after_failure() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::default().read_only(false));
    let before = uow.tenant();

    let result: Result<(), UnitOfWorkError> = uow
        .with_tenant(TenantScope::new(5).read_only(true).query_user(true), |uow| {
            Box::pin(async move {
                assert_eq!(uow.tenant(), TenantContext { tenant_id: Some(5), read_only: true, query_user: true });
                Err::<(), _>(boom())
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(uow.tenant(), before);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Open { read_only: false },
            Event::Execute("SET SESSION ROLE \"tenant_query_ro\"".to_string()),
            Event::Execute("SET app.current_organization_id = 5".to_string()),
            Event::Rollback,
            Event::Close,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn invalid_tenant_id_is_rejected_before_opening() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.tenant_uow(UowOptions::default());

    let err = uow
        .with_tenant(TenantScope::new(0), |_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) }))
        .await
        .unwrap_err();

    assert!(matches!(err, UnitOfWorkError::InvalidTenantId(0)));
    assert_eq!(uow.tenant(), TenantContext::default());
    assert!(recorder.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_open_leaves_no_scope_behind() -> Result<()> {
    let recorder = Recorder::new();
    recorder.fail_open();
    let mut uow = recorder.uow(true, true);

    let result = uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await;

    assert!(result.is_err());
    assert!(!uow.is_in_context());
    assert!(uow.repositories().is_none());
    assert!(recorder.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_post_begin_closes_the_session() -> Result<()> {
    let recorder = Recorder::new();
    recorder.fail_statement("SET SESSION ROLE");
    let mut uow = recorder.tenant_uow(UowOptions::tenant(7));

    let result = uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await;

    assert!(matches!(result, Err(UnitOfWorkError::Database(DatabaseError::QueryError(_)))));
    assert_eq!(uow.context_depth(), 0);
    assert_eq!(recorder.events().last(), Some(&Event::Close));
    assert_eq!(recorder.count(|e| *e == Event::Commit), 0);
    Ok(())
}

#[tokio::test]
async fn commit_failure_is_reported_and_session_closed() -> Result<()> {
    let recorder = Recorder::new();
    recorder.fail_commit();
    let mut uow = recorder.uow(true, true);

    let result = uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(42) })).await;

    assert!(result.is_err());
    assert_eq!(uow.context_depth(), 0);
    assert_eq!(recorder.events(), vec![Event::Open { read_only: false }, Event::Commit, Event::Close]);
    Ok(())
}

#[tokio::test]
async fn explicit_enter_and_exit() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(true, true);

    assert!(matches!(uow.exit(ScopeExit::Success).await, Err(UnitOfWorkError::NotInContext)));

    uow.enter().await?;
    uow.enter().await?;
    assert_eq!(uow.context_depth(), 2);
    uow.exit(ScopeExit::Success).await?;
    assert!(uow.session_mut().is_some());
    uow.exit(ScopeExit::Success).await?;
    assert!(uow.session_mut().is_none());

    assert_eq!(recorder.events(), vec![Event::Open { read_only: false }, Event::Commit, Event::Close]);
    Ok(())
}

#[tokio::test]
async fn repositories_only_exist_inside_a_scope() -> Result<()> {
    let recorder = Recorder::new();
    let mut uow = recorder.uow(false, true);

    assert!(matches!(
        uow.repository::<Earthquake>(),
        Err(UnitOfWorkError::RepositoryNotFound(EntityKind::Earthquake))
    ));

    uow.scope(|uow| {
        Box::pin(async move {
            let first = addr(uow.repository::<User>()?.repository());
            let second = addr(uow.repository::<User>()?.repository());
            assert_eq!(first, second);

            let nested = uow
                .scope(|uow| Box::pin(async move { Ok::<_, UnitOfWorkError>(addr(uow.repository::<User>()?.repository())) }))
                .await?;
            assert_eq!(first, nested);
            Ok::<_, UnitOfWorkError>(())
        })
    })
    .await?;

    assert!(uow.repository::<User>().is_err());
    Ok(())
}

#[tokio::test]
async fn repository_statements_follow_the_tenant_statements() -> Result<()> {
    let recorder = Recorder::new();
    recorder.push_rows(vec![json!({ "count": 3 })]);
    let factory = recorder.tenant_factory(UnitOfWorkConfig::default());

    let count = factory
        .with_uow(UowOptions::tenant(7), |uow| {
            Box::pin(async move { Ok::<_, UnitOfWorkError>(uow.repository::<Earthquake>()?.count(&[]).await?) })
        })
        .await?;

    assert_eq!(count, 3);
    let statements = recorder.statements();
    assert_eq!(statements[0], "SET SESSION ROLE \"tenant_user\"");
    assert_eq!(statements[1], "SET app.current_organization_id = 7");
    assert!(statements[2].starts_with("SELECT COUNT(*) AS count FROM \"earthquake\""), "{}", statements[2]);
    Ok(())
}

#[tokio::test]
async fn read_only_factory_forces_read_only_role() -> Result<()> {
    let recorder = Recorder::new();
    let factory = UnitOfWorkFactory::new(
        recorder.factory(true),
        recorder.factory(true),
        std::sync::Arc::new(NoopHooks),
        UnitOfWorkConfig::default(),
    );

    let uow = factory.get_uow(UowOptions::tenant(3));
    assert!(uow.tenant().read_only);
    assert_eq!(uow.tenant().tenant_id, Some(3));

    let mut uow = factory.get_uow(UowOptions::default());
    uow.scope(|_| Box::pin(async { Ok::<_, UnitOfWorkError>(()) })).await?;
    assert_eq!(recorder.events()[0], Event::Open { read_only: true });
    Ok(())
}
