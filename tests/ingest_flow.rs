use chatcourier::{InboundMessage, IngestOutcome, Ingestor, MessageLedger};
use chrono::{Duration, TimeZone, Utc};

async fn ingestor(today_only: bool) -> (tempfile::TempDir, Ingestor) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("messages.db").display());
    let ledger = MessageLedger::connect(&url).await.unwrap();
    ledger.initialize().await.unwrap();
    (dir, Ingestor::new(ledger, today_only))
}

fn msg(id: Option<&str>, text: &str) -> InboundMessage {
    InboundMessage {
        id: id.map(str::to_string),
        chat: "agro-reports".into(),
        text: text.into(),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn each_message_is_recorded_once() {
    let (_dir, ingestor) = ingestor(false).await;
    let first = msg(Some("tg-7"), "Отд 1: сев 35 га");

    let outcome = ingestor.ingest(&first).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Saved { id: "tg-7".into() });
    assert!(outcome.is_new());

    let again = ingestor.ingest(&first).await.unwrap();
    assert_eq!(again, IngestOutcome::AlreadyProcessed { id: "tg-7".into() });

    let stored = ingestor.ledger().get("tg-7").await.unwrap().unwrap();
    assert_eq!(stored.text, "Отд 1: сев 35 га");
    assert_eq!(stored.processed_at, None);
}

#[tokio::test]
async fn messages_without_id_dedupe_by_content() {
    let (_dir, ingestor) = ingestor(false).await;

    let a = ingestor.ingest(&msg(None, "same text")).await.unwrap();
    let b = ingestor.ingest(&msg(None, "same text")).await.unwrap();
    let c = ingestor.ingest(&msg(None, "other text")).await.unwrap();

    assert!(a.is_new());
    assert_eq!(b, IngestOutcome::AlreadyProcessed { id: a.id().to_string() });
    assert!(c.is_new());
    assert_eq!(ingestor.ledger().count().await.unwrap(), 2);
}

#[tokio::test]
async fn today_only_skips_older_messages() {
    let (_dir, ingestor) = ingestor(true).await;

    let mut old = msg(Some("old"), "yesterday's report");
    old.timestamp = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
    let mut stale = msg(Some("stale"), "three days back");
    stale.timestamp = Utc::now() - Duration::days(3);

    assert_eq!(
        ingestor.ingest(&old).await.unwrap(),
        IngestOutcome::NotToday { id: "old".into() }
    );
    assert!(matches!(
        ingestor.ingest(&stale).await.unwrap(),
        IngestOutcome::NotToday { .. }
    ));
    assert!(ingestor.ingest(&msg(Some("now"), "fresh")).await.unwrap().is_new());
    assert!(!ingestor.ledger().is_processed("old").await.unwrap());
}
