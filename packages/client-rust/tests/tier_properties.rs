//! End-to-end behaviour of the resolver, sweeper and prober over in-process
//! tiers with injected faults.

mod common;

use common::{key, stack};
use proptest::prelude::*;
use serde_json::{json, Value};
use stratum_client::storage::{Fault, FaultOp};
use stratum_client::SetOutcome;
use stratum_core::{
    DurableAdapter, LocalCache, Record, SyncState, TierKind, UserScope, PROBE_KEY_PREFIX,
};

fn record_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
        prop::collection::vec(("[a-z]{1,8}", any::<i32>()), 0..6).prop_map(|rows| {
            Value::Array(
                rows.into_iter()
                    .map(|(id, n)| json!({ "id": id, "n": n }))
                    .collect(),
            )
        }),
    ]
}

fn scope_strategy() -> impl Strategy<Value = UserScope> {
    prop_oneof![
        Just(UserScope::Guest),
        "[a-z0-9][a-z0-9-]{0,11}".prop_filter_map("guest sentinel", |id| UserScope::user(id).ok()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn round_trip_survives_unreachable_remotes(
        value in record_strategy(),
        scope in scope_strategy(),
        name in prop::sample::select(vec!["customers", "orders", "user-settings"]),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let s = stack(Some("user-42"));
            s.all_remotes_down();
            let k = key(name);

            let outcome = s.resolver.set(&k, &scope, &value).await.unwrap();
            prop_assert!(outcome.local);
            prop_assert!(!outcome.remote);

            let read = s.resolver.get(&k, &scope).await.unwrap();
            prop_assert_eq!(read, Some(Record::new(value.clone())));
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn graceful_degradation_when_every_remote_is_down() {
    let s = stack(Some("user-42"));
    s.all_remotes_down();
    let scope = UserScope::user("user-42").unwrap();

    let outcome = s
        .resolver
        .set(&key("orders"), &scope, &json!([{"id": "o1"}]))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SetOutcome {
            remote: false,
            local: true,
            remote_tier: None,
        }
    );
    assert!(s.resolver.get(&key("orders"), &scope).await.unwrap().is_some());
    assert_eq!(s.resolver.tracker().state(), SyncState::Idle);
}

#[tokio::test]
async fn migration_is_idempotent() {
    let s = stack(Some("u1"));
    let scope = UserScope::user("u1").unwrap();
    s.all_remotes_down();
    s.resolver.set(&key("customers"), &scope, &json!([1])).await.unwrap();
    s.resolver.set(&key("claims"), &scope, &json!([2])).await.unwrap();
    s.all_remotes_up();

    let first = s.sweeper.migrate(&scope).await.unwrap();
    assert_eq!(first.migrated_count, 2);
    assert!(first.failed_keys.is_empty());

    let second = s.sweeper.migrate(&scope).await.unwrap();
    assert_eq!(second.migrated_count, 0);
    assert!(second.failed_keys.is_empty());
}

#[tokio::test]
async fn guest_data_is_copied_to_the_signed_in_user() {
    let s = stack(None);
    let settings = key("user-settings");
    s.resolver
        .set(&settings, &UserScope::Guest, &json!({"theme": "dark"}))
        .await
        .unwrap();

    s.identity.sign_in("u7");
    let report = s.sweeper.migrate_current_user().await.unwrap();
    assert_eq!(report.migrated_count, 1);

    let user = UserScope::user("u7").unwrap();
    let expected = Some(Record::new(json!({"theme": "dark"})));
    assert_eq!(s.resolver.get(&settings, &user).await.unwrap(), expected);
    assert_eq!(
        s.resolver.get(&settings, &UserScope::Guest).await.unwrap(),
        expected
    );
}

#[tokio::test]
async fn probe_leaves_no_data_behind_even_when_a_tier_fails() {
    let s = stack(Some("user-42"));
    s.fallback.faults().set(FaultOp::Read, Some(Fault::Unreachable));
    s.customers.faults().set(FaultOp::Read, Some(Fault::Corrupt));

    let report = s.prober.probe().await;
    assert!(!report.tier("fallback").unwrap().reachable);
    assert!(!report.tier("durable:customers").unwrap().reachable);
    assert!(report.tier("local").unwrap().reachable);

    let probe_prefix = format!("stratum:{PROBE_KEY_PREFIX}");
    assert!(s.local.keys_with_prefix(&probe_prefix).is_empty());
    assert!(s
        .fallback
        .row_ids()
        .iter()
        .all(|(_, k)| !k.starts_with(PROBE_KEY_PREFIX)));
    assert!(s.customers.scopes().iter().all(|scope| !scope.starts_with("probe-")));
}

#[tokio::test]
async fn customers_scenario_recovers_through_migration() {
    let s = stack(Some("user-42"));
    let customers = key("customers");
    let scope = UserScope::user("user-42").unwrap();
    let value = json!([{"id": "c1", "name": "Ann"}]);

    s.customers.faults().make_unreachable();
    let outcome = s.resolver.set(&customers, &scope, &value).await.unwrap();
    assert!(outcome.remote);
    assert!(outcome.local);
    assert_eq!(outcome.remote_tier, Some(TierKind::Fallback));

    assert_eq!(
        s.resolver.get(&customers, &scope).await.unwrap(),
        Some(Record::new(value.clone()))
    );

    s.customers.faults().restore();
    let report = s.sweeper.migrate(&scope).await.unwrap();
    assert_eq!(report.migrated_count, 1);

    let durable = s.customers.read(&scope).await.unwrap();
    assert_eq!(durable, Some(Record::new(value)));
}

#[tokio::test]
async fn error_state_is_sticky_until_a_tier_succeeds() {
    let s = stack(Some("u1"));
    let scope = UserScope::user("u1").unwrap();
    s.fallback.faults().make_unreachable();
    s.resolver.set(&key("orders"), &scope, &json!(1)).await.unwrap();

    // Every tier fails: the sweep cannot reach a remote.
    s.sweeper.migrate(&scope).await.unwrap();
    assert_eq!(s.resolver.tracker().state(), SyncState::Error);
    assert!(s.resolver.tracker().is_warning());

    s.resolver.get(&key("orders"), &scope).await.unwrap();
    assert_eq!(s.resolver.tracker().state(), SyncState::Error);

    s.resolver.set(&key("orders"), &scope, &json!(2)).await.unwrap();
    assert_eq!(s.resolver.tracker().state(), SyncState::Idle);
    assert_eq!(s.resolver.tracker().last_synced_at(), Some(1_000));
}

#[tokio::test]
async fn offline_write_after_remote_read_is_not_lost() {
    let s = stack(Some("user-42"));
    let scope = UserScope::user("user-42").unwrap();
    let customers = key("customers");
    s.customers.write(&scope, &Record::new(json!("v1"))).await.unwrap();
    assert_eq!(
        s.resolver.get(&customers, &scope).await.unwrap(),
        Some(Record::new(json!("v1")))
    );

    s.all_remotes_down();
    let outcome = s.resolver.set(&customers, &scope, &json!("v2")).await.unwrap();
    assert!(outcome.local);
    assert!(!outcome.remote);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        s.resolver.get(&customers, &scope).await.unwrap(),
        Some(Record::new(json!("v2")))
    );
}

#[tokio::test]
async fn concurrent_sets_resolve_last_write_wins() {
    let s = stack(Some("u1"));
    let scope = UserScope::user("u1").unwrap();
    let k = key("orders");

    let va = json!("a");
    let vb = json!("b");
    let (a, b) = tokio::join!(
        s.resolver.set(&k, &scope, &va),
        s.resolver.set(&k, &scope, &vb),
    );
    a.unwrap();
    b.unwrap();

    let local = s
        .local
        .get(&s.resolver.native_key(&k, &scope))
        .unwrap()
        .unwrap();
    assert!(local == "\"a\"" || local == "\"b\"");
    assert_eq!(s.resolver.tracker().state(), SyncState::Idle);
}
