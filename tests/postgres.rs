//! Runs the Postgres gateway against a live database named by
//! `INSPECTIONS_DB_CONNECTION_STRING`. Set `INSPECTIONS_TEST_INITIALIZE_DB=1`
//! to apply `migrations/` first. Run with `cargo test -- --ignored`.

use std::env;
use std::time::Duration;

use time::OffsetDateTime;

use inspections::columns;
use inspections::condition::Condition;
use inspections::config::get_variable;
use inspections::db::{create_pool, Db, PgDb};
use inspections::errors::InspectionError;
use inspections::inspection::Value;
use inspections::listing::{ListingFilter, ListingQuery, Pagination};
use inspections::mapping::{insertion, update};
use inspections::normalization::{normalize, RawSubmission};

#[tokio::test]
#[ignore]
async fn gateway_works_against_postgres() {
    dotenv::dotenv().ok();

    let db = prepare_db().await;

    // unique per run so that earlier rows never match the filters below
    let plate = format!("T{}", OffsetDateTime::now_utc().unix_timestamp_nanos() % 1_000_000_000);

    let id = test_creation(&db, &plate).await;
    test_listing(&db, &plate, id, 1).await;
    test_editing(&db, &plate, id).await;
    test_reporting(&db, id).await;
    test_deletion(&db, &plate, id).await;
    test_listing(&db, &plate, id, 0).await;
}

fn submission(plate: &str) -> RawSubmission {
    vec![
        ("inspection_date", "2021-03-15"),
        ("plate", plate),
        ("driver_name", "Juan Perez"),
        ("prepared_by", "Maria Gomez"),
        ("odometer", "120500"),
        ("review_date", "2021-06-01"),
        ("obs_level_oil", "slightly low"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

async fn test_creation(db: &PgDb, plate: &str) -> i32 {
    let before = OffsetDateTime::now_utc();

    let record = normalize(&submission(plate)).expect("normalize submission");
    let id = db
        .insert(insertion(&record, OffsetDateTime::now_utc()).expect("build insertion"))
        .await
        .expect("insert inspection");

    let stored = db
        .retrieve(id)
        .await
        .expect("retrieve inspection")
        .expect("find inspection");

    assert!(stored.active);
    assert!(stored.created_at >= before - Duration::from_secs(60));
    assert_eq!(stored.get("plate"), Some(&Value::Text(Some(plate.to_owned()))));
    assert_eq!(stored.get("odometer"), Some(&Value::Integer(Some(120_500))));
    assert_eq!(
        stored.get("obs_level_oil"),
        Some(&Value::Text(Some("slightly low".to_owned())))
    );

    for column in columns::condition_columns() {
        assert_eq!(
            stored.get(&column.name),
            Some(&Value::Condition(Condition::NotApplicable)),
            "{}",
            column.name
        );
    }

    for flag in &["defect_front", "defect_chassis", "driver_acceptance"] {
        assert_eq!(stored.get(flag), Some(&Value::Flag(false)), "{}", flag);
    }

    id
}

async fn test_editing(db: &PgDb, plate: &str, id: i32) {
    let before = db.retrieve(id).await.expect("retrieve").expect("find");

    let mut raw = submission(plate);
    raw.insert("defect_front".to_owned(), "on".to_owned());
    raw.insert("level_oil".to_owned(), "BAD".to_owned());
    let record = normalize(&raw).expect("normalize edit");

    for _ in 0..2 {
        let updated = db
            .update(update(&record, id).expect("build update"))
            .await
            .expect("update inspection");
        assert_eq!(updated, 1);
    }

    let after = db.retrieve(id).await.expect("retrieve").expect("find");

    assert_eq!(after.get("defect_front"), Some(&Value::Flag(true)));
    assert_eq!(after.get("level_oil"), Some(&Value::Condition(Condition::Bad)));
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.tally.bad, 1);
}

async fn test_listing(db: &PgDb, plate: &str, id: i32, expected: i64) {
    // lowercase to exercise ILIKE
    let filter = ListingFilter::parse(Some(&plate.to_lowercase()), Some("juan"), None, None)
        .expect("parse filter");
    let query = ListingQuery::build(filter, Pagination::new(1, 5).expect("paginate"))
        .expect("build listing");

    let listing = db.list(query).await.expect("list inspections");

    assert_eq!(listing.total, expected);
    assert_eq!(
        listing.inspections.iter().any(|i| i.id == id),
        expected > 0
    );
    assert_eq!(
        listing.stats.total,
        listing.stats.with_defects + listing.stats.without_defects
    );
}

async fn test_reporting(db: &PgDb, id: i32) {
    let rows = db.export().await.expect("export inspections");
    let row = rows.iter().find(|r| r.id == id).expect("find exported row");
    assert_eq!(row.odometer, Some(120_500));

    let dashboard = db.dashboard().await.expect("build dashboard");
    assert!(dashboard.totals.total_inspections >= 1);
    assert!(dashboard.totals.with_defects >= 1);
    assert!(dashboard.top_vehicles.len() <= 10);

    let status = db.status().await.expect("get database status");
    assert!(status.version.starts_with("PostgreSQL"));
}

async fn test_deletion(db: &PgDb, plate: &str, id: i32) {
    db.soft_delete(id).await.expect("delete inspection");

    assert!(db.retrieve(id).await.expect("retrieve").is_none());
    assert!(matches!(
        db.soft_delete(id).await,
        Err(InspectionError::NotFound(_))
    ));

    let record = normalize(&submission(plate)).expect("normalize submission");
    assert!(matches!(
        db.update(update(&record, id).expect("build update")).await,
        Err(InspectionError::NotFound(missing)) if missing == id
    ));
}

async fn prepare_db() -> PgDb {
    let connection_string = get_variable("INSPECTIONS_DB_CONNECTION_STRING");

    if env::var("INSPECTIONS_TEST_INITIALIZE_DB").unwrap_or_else(|_| "0".to_owned()) == "1" {
        let connection_string = connection_string.clone();

        tokio::task::spawn_blocking(move || initialize_db_for_test(&connection_string))
            .await
            .expect("initialize DB");
    }

    let pool = create_pool(&connection_string, 2, Duration::from_secs(10))
        .await
        .expect("create pool");

    PgDb::new(pool)
}

fn initialize_db_for_test(connection_string: &str) {
    use movine::Movine;
    use postgres::{Client, NoTls};

    let mut client = Client::connect(connection_string, NoTls)
        .expect("create postgres::Client from INSPECTIONS_DB_CONNECTION_STRING");
    let mut movine = Movine::new(&mut client);

    movine.set_migration_dir("migrations");
    movine.set_strict(true);

    if movine.status().is_err() {
        movine.initialize().expect("initialize movine");
    }

    movine.up().expect("run movine migrations");
}
