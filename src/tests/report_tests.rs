#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::middleware::AuthUser;
    use crate::recorder;
    use crate::reports;
    use crate::tests::support::*;
    use crate::types::{ExportQuery, Role, SubmitScanRequest, User};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn actor(user: &User) -> AuthUser {
        AuthUser { id: user.id, username: user.username.clone(), role: user.role }
    }

    #[tokio::test]
    async fn test_summary_windows() {
        let store = memory_store().await;
        let store = store.as_ref();
        let admin = seed_user(store, "root", Role::Admin).await;
        let alice = seed_user(store, "alice", Role::User).await;
        let unit = seed_unit(store, "Q1", true).await;

        // Wednesday 2024-03-13 12:00; the week began Sunday the 10th
        let now = at(13, 12);
        seed_scan(store, &unit, &alice, true, at(13, 9)).await; // today
        seed_scan(store, &unit, &alice, false, at(11, 9)).await; // this week
        seed_scan(store, &unit, &admin, true, at(9, 9)).await; // last week, this month
        seed_scan(store, &unit, &alice, true, Utc.with_ymd_and_hms(2024, 2, 28, 9, 0, 0).unwrap()).await;

        let all = reports::summary(store, &actor(&admin), now).await.unwrap();
        assert_eq!((all.today.total, all.week.total, all.month.total), (1, 2, 3));
        assert_eq!((all.week.matched, all.week.not_match), (1, 1));

        let own = reports::summary(store, &actor(&alice), now).await.unwrap();
        assert_eq!((own.today.total, own.week.total, own.month.total), (1, 2, 2));
    }

    #[tokio::test]
    async fn test_daily_breakdown() {
        let store = memory_store().await;
        let store = store.as_ref();
        let admin = seed_user(store, "root", Role::Admin).await;
        let unit = seed_unit(store, "Q1", true).await;
        let now = at(13, 12);
        seed_scan(store, &unit, &admin, true, at(13, 1)).await;
        seed_scan(store, &unit, &admin, false, at(12, 23)).await;
        seed_scan(store, &unit, &admin, true, at(12, 0)).await;
        // Outside a 3-day window
        seed_scan(store, &unit, &admin, true, at(10, 5)).await;

        let days = reports::daily(store, &actor(&admin), 3, now).await.unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, at(13, 0).date_naive());
        assert_eq!(days[0].counts.total, 1);
        assert_eq!((days[1].counts.total, days[1].counts.matched, days[1].counts.not_match), (2, 1, 1));
        assert_eq!(days[2].counts.total, 0);
    }

    #[tokio::test]
    async fn test_user_performance_counts_the_week() {
        let store = memory_store().await;
        let store = store.as_ref();
        let admin = seed_user(store, "root", Role::Admin).await;
        let alice = seed_user(store, "alice", Role::User).await;
        let bob = seed_user(store, "bob", Role::User).await;
        let unit = seed_unit(store, "Q1", true).await;
        let now = at(13, 12);
        seed_scan(store, &unit, &alice, true, at(12, 8)).await;
        seed_scan(store, &unit, &alice, false, at(10, 0)).await;
        seed_scan(store, &unit, &alice, true, at(9, 23)).await;
        seed_scan(store, &unit, &admin, true, at(12, 8)).await;

        let perf = reports::user_performance(store, now).await.unwrap();
        assert_eq!(perf.len(), 2);
        let alice_row = perf.iter().find(|p| p.user_id == alice.id).unwrap();
        assert_eq!((alice_row.counts.total, alice_row.counts.matched), (2, 1));
        assert_eq!(alice_row.user_name, "alice name");
        let bob_row = perf.iter().find(|p| p.user_id == bob.id).unwrap();
        assert_eq!(bob_row.counts.total, 0);
    }

    #[tokio::test]
    async fn test_export_rows_cover_inclusive_range() {
        let store = memory_store().await;
        let store = store.as_ref();
        let admin = seed_user(store, "root", Role::Admin).await;
        let unit = seed_unit(store, "Q1", true).await;
        seed_scan(store, &unit, &admin, true, at(1, 0)).await;
        seed_scan(store, &unit, &admin, true, at(5, 23)).await;
        seed_scan(store, &unit, &admin, true, at(6, 0)).await;
        seed_scan(store, &unit, &admin, true, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()).await;

        let query = ExportQuery { start_date: Some("2024-03-01".into()), end_date: Some("2024-03-05".into()) };
        let rows = reports::export_rows(store, &query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].scanned_at > rows[1].scanned_at);

        let everything = reports::export_rows(store, &ExportQuery::default()).await.unwrap();
        assert_eq!(everything.len(), 4);
    }

    #[tokio::test]
    async fn test_recorder_submit_and_stats() {
        let store = memory_store().await;
        let store = store.as_ref();
        let alice = seed_user(store, "alice", Role::User).await;
        let bob = seed_user(store, "bob", Role::User).await;
        seed_unit(store, "Q1", true).await;

        let submit = |qr: &str, is_match: bool| SubmitScanRequest {
            qr_code: qr.to_string(),
            is_match,
            notes: String::new(),
        };
        let before = Utc::now();
        let record = recorder::submit(store, &actor(&alice), submit("  Q1 ", true)).await.unwrap();
        assert!(record.scanned_at >= before - Duration::milliseconds(1));
        assert_eq!(record.user.id, alice.id);
        recorder::submit(store, &actor(&bob), submit("Q1", false)).await.unwrap();

        let too_long = SubmitScanRequest { notes: "n".repeat(recorder::MAX_NOTES_LEN + 1), ..submit("Q1", true) };
        assert!(recorder::submit(store, &actor(&alice), too_long).await.is_err());

        let stats = recorder::stats(store, &actor(&alice), Utc::now()).await.unwrap();
        assert_eq!((stats.today.total, stats.today.matched), (1, 1));
    }
}
