mod common;

use common::{deck_bytes, north_store_deck, text_shape, title_shape, write_deck, FakeDrive, SlideSpec};
use deck_vault::organize::{organize_deck, OrganizeError};
use deck_vault::report::{scan_tree, SOURCE_COLUMN};
use deck_vault::uploader::UploadAction;

#[tokio::test]
async fn test_deck_is_filed_under_zone_and_market() {
    let drive = FakeDrive::new();
    let parent = drive.add_root("Decks");
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("North Store.pptx");
    std::fs::write(&local, north_store_deck()).unwrap();

    let report = organize_deck(&drive, &local, &parent).await.unwrap();

    assert_eq!(report.zone.as_deref(), Some("North"));
    assert_eq!(report.market, "North 1_Delhi_Market");
    let zone_id = report.zone_folder_id.clone().unwrap();
    assert_eq!(drive.names_in(&parent), ["North"]);
    assert_eq!(drive.names_in(&zone_id), ["North 1_Delhi_Market"]);
    assert_eq!(drive.names_in(&report.market_folder_id), ["North Store.pptx"]);
    assert!(matches!(report.upload, UploadAction::Created(_)));

    let again = organize_deck(&drive, &local, &parent).await.unwrap();
    assert!(matches!(again.upload, UploadAction::Replaced(_)));
    assert_eq!(again.market_folder_id, report.market_folder_id);
    assert_eq!(drive.names_in(&report.market_folder_id).len(), 1);
    assert_eq!(drive.calls().create_folder, 2);
}

#[tokio::test]
async fn test_deck_without_market_creates_nothing() {
    let drive = FakeDrive::new();
    let parent = drive.add_root("Decks");
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("Loose.pptx");
    write_deck(&local, &[SlideSpec::new(vec![text_shape(&["Quarterly review"])])]);

    let err = organize_deck(&drive, &local, &parent).await.unwrap_err();

    assert!(matches!(err, OrganizeError::MissingMarket(ref name) if name == "Loose.pptx"));
    assert_eq!(drive.calls().create_folder, 0);
    assert!(drive.names_in(&parent).is_empty());
}

#[tokio::test]
async fn test_report_writes_one_row_per_deck() {
    let drive = FakeDrive::new();
    let root = drive.add_root("Catchments");
    let east = drive.add_folder("East", &root);
    let west = drive.add_folder("West", &root);

    let terms = SlideSpec::new(vec![
        title_shape("Commercial Terms"),
        text_shape(&["Catchment Name : Salt Lake", "Store Size: 900 sq.ft", "LAT: 22.58 LON: 88.41"]),
    ]);
    let cover = SlideSpec::new(vec![text_shape(&["East catchment"])]);
    drive.add_deck("salt-lake.pptx", &east, deck_bytes(&[cover, terms]));
    drive.add_deck("no-terms.pptx", &east, deck_bytes(&[SlideSpec::new(vec![text_shape(&["Agenda"])])]));
    drive.add_deck("broken.pptx", &west, b"not a deck".to_vec());

    let scratch = tempfile::tempdir().unwrap();
    let mut writer = csv::Writer::from_writer(Vec::new());
    let summary = scan_tree(&drive, &root, scratch.path(), &mut writer).await.unwrap();

    assert_eq!(summary.decks, 3);
    assert_eq!(summary.walk.actionable, 2);
    assert_eq!(summary.incomplete, 3);

    let csv = String::from_utf8(writer.into_inner().ok().unwrap()).unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], SOURCE_COLUMN);
    assert_eq!(&headers[1], "Catchment Name");

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.len() == headers.len()));

    let salt_lake = rows.iter().find(|r| &r[0] == "salt-lake.pptx").unwrap();
    assert_eq!(&salt_lake[1], "Salt Lake");
    assert_eq!(&salt_lake[2], "900 sq.ft");
    assert_eq!(&salt_lake[headers.len() - 2], "22.58");

    let no_terms = rows.iter().find(|r| &r[0] == "no-terms.pptx").unwrap();
    assert!(no_terms[1].contains("not found"));
    let broken = rows.iter().find(|r| &r[0] == "broken.pptx").unwrap();
    assert!(broken[1].starts_with("[ERROR: Cannot open PPTX"));

    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_report_stops_on_revoked_credentials() {
    let drive = FakeDrive::new();
    let root = drive.add_root("Catchments");
    drive.revoke();

    let scratch = tempfile::tempdir().unwrap();
    let mut writer = csv::Writer::from_writer(Vec::new());
    assert!(scan_tree(&drive, &root, scratch.path(), &mut writer).await.is_err());
}
