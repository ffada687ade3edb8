use anyhow::Result;
use replybot::db::*;
use replybot::store::{CandidateStore, ConnectionStore, QaPair, QaStore};
use sqlx::SqlitePool;

async fn setup_test_db() -> Result<SqlitePool> {
    let pool = connect_in_memory().await?;
    init_database_schema(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn test_user_registration_is_idempotent() -> Result<()> {
    let pool = setup_test_db().await?;

    assert!(add_user(&pool, 10, Some("alice"), None).await?);
    assert!(!add_user(&pool, 10, Some("alice_renamed"), Some(99)).await?);

    let user = get_user(&pool, 10).await?.expect("user should exist");
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert_eq!(user.referrer_id, None);
    assert_eq!(user.balance, 0);
    assert!(!user.rewarded);

    assert_eq!(get_user(&pool, 11).await?, None);
    assert_eq!(get_total_users(&pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_referral_reward_is_granted_once() -> Result<()> {
    let pool = setup_test_db().await?;
    add_user(&pool, 1, Some("referrer"), None).await?;
    add_user(&pool, 2, Some("friend"), Some(1)).await?;

    assert!(reward_referrer(&pool, 2, 1, 12).await?);
    assert!(!reward_referrer(&pool, 2, 1, 12).await?);

    let referrer = get_user(&pool, 1).await?.expect("referrer should exist");
    assert_eq!(referrer.balance, 12);
    assert_eq!(referrer.referrals_count, 1);
    assert!(get_user(&pool, 2).await?.expect("friend should exist").rewarded);
    assert_eq!(get_total_balance(&pool).await?, 12);
    Ok(())
}

#[tokio::test]
async fn test_referral_reward_rejects_self_and_unknown_referrer() -> Result<()> {
    let pool = setup_test_db().await?;
    add_user(&pool, 3, None, Some(3)).await?;
    assert!(!reward_referrer(&pool, 3, 3, 12).await?);

    add_user(&pool, 4, None, Some(404)).await?;
    assert!(!reward_referrer(&pool, 4, 404, 12).await?);
    // Nothing was credited, so the user can still be rewarded later
    assert!(!get_user(&pool, 4).await?.expect("user should exist").rewarded);
    Ok(())
}

#[tokio::test]
async fn test_settings_update() -> Result<()> {
    let pool = setup_test_db().await?;
    update_settings(&pool, "@news_room", true).await?;

    let settings = get_settings(&pool).await?;
    assert_eq!(settings.required_channel, "@news_room");
    assert!(settings.check_subscription);
    Ok(())
}

#[tokio::test]
async fn test_withdrawal_approval_debits_balance() -> Result<()> {
    let pool = setup_test_db().await?;
    add_user(&pool, 5, Some("saver"), None).await?;
    update_user_balance(&pool, 5, 700).await?;

    let id = add_withdrawal(&pool, 5, 700).await?;
    assert!(has_pending_withdrawal(&pool, 5).await?);
    assert_eq!(get_pending_withdrawals(&pool).await?.len(), 1);

    let decided = decide_withdrawal(&pool, id, WithdrawalStatus::Approved)
        .await?
        .expect("withdrawal should be pending");
    assert_eq!(decided.amount, 700);
    assert_eq!(get_user(&pool, 5).await?.expect("user should exist").balance, 0);

    // A second decision finds nothing pending
    assert_eq!(decide_withdrawal(&pool, id, WithdrawalStatus::Rejected).await?, None);
    assert_eq!(get_pending_withdrawal(&pool, id).await?, None);
    assert!(!has_pending_withdrawal(&pool, 5).await?);
    Ok(())
}

#[tokio::test]
async fn test_withdrawal_rejection_keeps_balance() -> Result<()> {
    let pool = setup_test_db().await?;
    add_user(&pool, 6, None, None).await?;
    update_user_balance(&pool, 6, 650).await?;

    let id = add_withdrawal(&pool, 6, 650).await?;
    assert!(decide_withdrawal(&pool, id, WithdrawalStatus::Rejected).await?.is_some());
    assert_eq!(get_user(&pool, 6).await?.expect("user should exist").balance, 650);
    assert!(get_pending_withdrawals(&pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_store_traits_over_sqlite() -> Result<()> {
    let store = SqliteStore::new(setup_test_db().await?);

    let added = store
        .append(&["first".to_string(), "  ".to_string(), "second".to_string()])
        .await?;
    assert_eq!(added, 2);
    assert_eq!(store.list_candidates().await?, vec!["first", "second"]);
    assert_eq!(CandidateStore::count(&store).await?, 2);
    CandidateStore::clear(&store).await?;
    assert_eq!(CandidateStore::count(&store).await?, 0);

    let pairs = vec![
        QaPair::new("What are your opening hours?", "From 9 to 18"),
        QaPair::new("Do you deliver on weekends?", "Yes, on Saturdays"),
    ];
    assert_eq!(store.insert_pairs(&pairs).await?, 2);
    let stored = store.list_pairs().await?;
    assert_eq!(stored, pairs);
    assert_eq!(store.count_pairs().await?, 2);
    store.clear_pairs().await?;
    assert_eq!(store.count_pairs().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_connection_store() -> Result<()> {
    let store = SqliteStore::new(setup_test_db().await?);

    assert_eq!(store.get_owner("conn-1").await?, None);
    store.set_owner("conn-1", 42).await?;
    assert_eq!(store.get_owner("conn-1").await?, Some(42));

    store.set_owner("conn-1", 43).await?;
    assert_eq!(store.get_owner("conn-1").await?, Some(43));

    assert!(store.delete("conn-1").await?);
    assert!(!store.delete("conn-1").await?);
    assert_eq!(store.get_owner("conn-1").await?, None);
    Ok(())
}
