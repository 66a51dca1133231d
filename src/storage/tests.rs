//! Tests for storage module

#[cfg(test)]
mod tests {
    use crate::storage::{Database, TradeQuery, TradeStore};
    use crate::types::{Enrichment, TradeRecord, TransactionCode};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn trade(ticker: &str, insider: &str, filed: u32, code: TransactionCode) -> TradeRecord {
        TradeRecord {
            filing_date: date(filed),
            trade_date: date(filed),
            ticker: ticker.to_string(),
            company_name: format!("{ticker} Corp"),
            industry: None,
            insider_name: insider.to_string(),
            insider_title: "Director".to_string(),
            transaction_type: code,
            price: dec!(10.50),
            quantity: 100,
            shares_owned_after: 1000,
            ownership_delta_pct: 10.0,
            transaction_value: dec!(1050.00),
            current_price: None,
            price_change_pct: None,
            is_cluster: false,
            cluster_size: 1,
            source_url: "https://www.sec.gov/doc.xml".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_read_back() {
        let db = Database::in_memory().await.unwrap();
        let written = db
            .upsert_trades(&[trade("ACME", "Doe Jane", 3, TransactionCode::Purchase)])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let rows = db.trades_since(date(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        let record = &rows[0].record;
        assert_eq!(record.ticker, "ACME");
        assert_eq!(record.price, dec!(10.5));
        assert_eq!(record.transaction_value, dec!(1050));
        assert_eq!(record.transaction_type, TransactionCode::Purchase);
        assert_eq!(record.filing_date, date(3));
        assert!(!record.is_cluster);
        assert_eq!(record.cluster_size, 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let batch = vec![
            trade("ACME", "Doe Jane", 3, TransactionCode::Purchase),
            trade("ACME", "Roe Richard", 3, TransactionCode::Purchase),
            trade("ACME", "Doe Jane", 3, TransactionCode::Sale),
        ];

        db.upsert_trades(&batch).await.unwrap();
        assert_eq!(db.count_trades().await.unwrap(), 3);

        db.upsert_trades(&batch).await.unwrap();
        assert_eq!(db.count_trades().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[trade("ACME", "Doe Jane", 3, TransactionCode::Purchase)])
            .await
            .unwrap();
        let id = db.trades_since(date(1)).await.unwrap()[0].id;

        let mut amended = trade("ACME", "Doe Jane", 3, TransactionCode::Purchase);
        amended.insider_title = "Chief Executive Officer".to_string();
        // Same value at a different scale is the same key
        amended.transaction_value = dec!(1050);
        db.upsert_trades(&[amended]).await.unwrap();

        let stored = db.get_trade(id).await.unwrap().unwrap();
        assert_eq!(db.count_trades().await.unwrap(), 1);
        assert_eq!(stored.record.insider_title, "Chief Executive Officer");
    }

    #[tokio::test]
    async fn test_upsert_keeps_enrichment_and_flags() {
        let db = Database::in_memory().await.unwrap();
        let t = trade("ACME", "Doe Jane", 3, TransactionCode::Purchase);
        db.upsert_trades(&[t.clone()]).await.unwrap();
        let id = db.trades_since(date(1)).await.unwrap()[0].id;

        db.mark_cluster(id, 3).await.unwrap();
        db.update_enrichment(
            "ACME",
            &Enrichment {
                industry: Some("Electronic Computers".to_string()),
                current_price: Some(dec!(12)),
                price_change_pct: Some(4.5),
            },
        )
        .await
        .unwrap();

        db.upsert_trades(&[t]).await.unwrap();

        let stored = db.get_trade(id).await.unwrap().unwrap().record;
        assert!(stored.is_cluster);
        assert_eq!(stored.cluster_size, 3);
        assert_eq!(stored.industry.as_deref(), Some("Electronic Computers"));
        assert_eq!(stored.current_price, Some(dec!(12)));
    }

    #[tokio::test]
    async fn test_enrichment_does_not_clear_existing_fields() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[
            trade("ACME", "Doe Jane", 3, TransactionCode::Purchase),
            trade("ACME", "Roe Richard", 4, TransactionCode::Purchase),
            trade("OTHR", "Doe Jane", 4, TransactionCode::Purchase),
        ])
        .await
        .unwrap();

        let updated = db
            .update_enrichment(
                "ACME",
                &Enrichment {
                    industry: Some("Electronic Computers".to_string()),
                    ..Enrichment::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        db.update_enrichment(
            "ACME",
            &Enrichment {
                current_price: Some(dec!(20)),
                price_change_pct: Some(-1.5),
                ..Enrichment::default()
            },
        )
        .await
        .unwrap();

        let rows = db.trades_since(date(1)).await.unwrap();
        for row in rows {
            if row.record.ticker == "ACME" {
                assert_eq!(row.record.industry.as_deref(), Some("Electronic Computers"));
                assert_eq!(row.record.current_price, Some(dec!(20)));
                assert_eq!(row.record.price_change_pct, Some(-1.5));
            } else {
                assert!(row.record.industry.is_none());
                assert!(row.record.current_price.is_none());
            }
        }

        assert_eq!(db.update_enrichment("ACME", &Enrichment::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trades_since_filters_and_orders() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[
            trade("ACME", "C", 20, TransactionCode::Purchase),
            trade("ACME", "A", 1, TransactionCode::Purchase),
            trade("ACME", "B", 10, TransactionCode::Purchase),
        ])
        .await
        .unwrap();

        let rows = db.trades_since(date(10)).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.record.insider_name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_reset_cluster_flags_respects_window() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[
            trade("ACME", "Old", 1, TransactionCode::Purchase),
            trade("ACME", "New", 15, TransactionCode::Purchase),
        ])
        .await
        .unwrap();
        for row in db.trades_since(date(1)).await.unwrap() {
            db.mark_cluster(row.id, 2).await.unwrap();
        }

        let reset = db.reset_cluster_flags_since(date(10)).await.unwrap();
        assert_eq!(reset, 1);

        for row in db.trades_since(date(1)).await.unwrap() {
            let expect_cluster = row.record.insider_name == "Old";
            assert_eq!(row.record.is_cluster, expect_cluster);
            assert_eq!(row.record.cluster_size, if expect_cluster { 2 } else { 1 });
        }
    }

    #[tokio::test]
    async fn test_query_filters() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[
            trade("ACME", "A", 1, TransactionCode::Purchase),
            trade("ACME", "B", 5, TransactionCode::Sale),
            trade("OTHR", "C", 9, TransactionCode::Purchase),
            trade("ACME", "D", 12, TransactionCode::Purchase),
        ])
        .await
        .unwrap();
        let clustered = db
            .query_trades(&TradeQuery {
                ticker: Some("ACME".to_string()),
                ..TradeQuery::default()
            })
            .await
            .unwrap();
        db.mark_cluster(clustered[0].id, 2).await.unwrap();

        let acme = db
            .query_trades(&TradeQuery {
                ticker: Some("acme".to_string()),
                ..TradeQuery::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = acme.iter().map(|r| r.record.insider_name.as_str()).collect();
        assert_eq!(names, vec!["D", "B", "A"]);

        let purchases = db
            .query_trades(&TradeQuery {
                transaction_type: Some(TransactionCode::Purchase),
                filed_from: Some(date(2)),
                filed_to: Some(date(10)),
                ..TradeQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].record.insider_name, "C");

        let clusters = db
            .query_trades(&TradeQuery {
                clusters_only: true,
                ..TradeQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].record.insider_name, "D");

        let limited = db
            .query_trades(&TradeQuery {
                limit: Some(2),
                ..TradeQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_placeholder_tickers() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_trades(&[
            trade("ACME", "A", 1, TransactionCode::Purchase),
            trade("NONE", "B", 1, TransactionCode::Purchase),
            trade("n/a", "C", 1, TransactionCode::Purchase),
            trade("", "D", 1, TransactionCode::Purchase),
        ])
        .await
        .unwrap();

        let removed = db.delete_placeholder_tickers().await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(db.count_trades().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.upsert_trades(&[]).await.unwrap(), 0);
        assert_eq!(db.count_trades().await.unwrap(), 0);
    }
}
