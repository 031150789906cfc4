//! X-Server driver against a mocked ILS.

use libris_core::AuthError;
use libris_ils::{
    AvailabilityRules, HoldingStatus, IlsDriver, IlsError, IlsTransport, ProfileUpdate,
    TransportConfig, XServerConfig, XServerDriver,
};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn driver(server: &MockServer) -> XServerDriver {
    let config = XServerConfig {
        base_url: Url::parse(&format!("{}/X", server.uri())).unwrap(),
        patron_library: "USR00".into(),
        bib_library: "BIB01".into(),
        max_new_items: 2,
        rules: AvailabilityRules::default(),
    };
    XServerDriver::new(config, IlsTransport::new(&TransportConfig::default()).unwrap())
}

fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body)
}

#[tokio::test]
async fn test_authenticate_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/X"))
        .and(query_param("op", "bor-auth"))
        .and(query_param("bor_id", "B0042"))
        .and(query_param("verification", "s3cret"))
        .respond_with(xml(
            "<bor-auth><z303><z303-id>ID0042</z303-id><z303-name>Doe, Jane</z303-name></z303>\
             <z305><z305-bor-status>Adult</z305-bor-status></z305></bor-auth>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let profile = driver(&server)
        .authenticate_patron("B0042", "s3cret")
        .await
        .unwrap();
    assert_eq!(profile.id, "ID0042");
    assert_eq!(profile.group.as_deref(), Some("Adult"));
}

#[tokio::test]
async fn test_authenticate_error_element_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "bor-auth"))
        .respond_with(xml("<bor-auth><error>Error in Verification</error></bor-auth>"))
        .mount(&server)
        .await;

    let err = driver(&server)
        .authenticate_patron("B0042", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn test_authenticate_outage_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "bor-auth"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = driver(&server)
        .authenticate_patron("B0042", "s3cret")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TransportFailure(_)));
}

#[tokio::test]
async fn test_authenticate_blank_does_not_call_ils() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(xml("<bor-auth/>"))
        .expect(0)
        .mount(&server)
        .await;

    let err = driver(&server).authenticate_patron(" ", "x").await.unwrap_err();
    assert_eq!(err, AuthError::Blank);
}

#[tokio::test]
async fn test_fetch_holdings_resolves_availability() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "item-data"))
        .and(query_param("doc_number", "000123"))
        .respond_with(xml(
            "<item-data>\
               <item><sub-library>Main Library</sub-library><z30-sub-library-code>MAIN</z30-sub-library-code>\
                 <z30-call-no>QA76 .R87</z30-call-no><loan-status>On Shelf</loan-status></item>\
               <item><sub-library>Main Library</sub-library><z30-sub-library-code>MAIN</z30-sub-library-code>\
                 <loan-status>On Loan</loan-status><due-date>13/jul/2012</due-date><hold-allowed>Y</hold-allowed></item>\
               <item><sub-library>Annex</sub-library><loan-status>On Shelf</loan-status>\
                 <z30-item-status>Missing</z30-item-status></item>\
             </item-data>",
        ))
        .mount(&server)
        .await;

    let holdings = driver(&server).fetch_holdings("000123", None).await.unwrap();
    assert_eq!(holdings.len(), 3);
    assert_eq!(holdings[0].status, HoldingStatus::Available);
    assert_eq!(holdings[0].call_number.as_deref(), Some("QA76 .R87"));
    assert_eq!(holdings[1].status, HoldingStatus::OnLoan);
    assert_eq!(holdings[1].due_date.unwrap().to_string(), "2012-07-13");
    assert!(holdings[1].is_holdable);
    assert_eq!(holdings[2].location_code, "Annex");
    assert_eq!(holdings[2].status, HoldingStatus::Unavailable);
}

#[tokio::test]
async fn test_fetch_holdings_bad_date_is_error() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "item-data"))
        .respond_with(xml(
            "<item-data><item><sub-library>Main</sub-library><due-date>not-a-date</due-date></item></item-data>",
        ))
        .mount(&server)
        .await;

    let err = driver(&server).fetch_holdings("1", None).await.unwrap_err();
    assert!(matches!(err, IlsError::DateFormat(_)));
}

#[tokio::test]
async fn test_update_profile_success_messages_are_not_errors() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "update-bor"))
        .and(query_param("update_flag", "Y"))
        .respond_with(xml(
            "<update-bor><error>Succeeded to REWRITE table z303. cur-id ID0042</error>\
             <error>Succeeded to WRITE table z308. cur-id ID0042</error></update-bor>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    driver(&server)
        .update_profile("ID0042", &ProfileUpdate::default().with_barcode("B0042"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_profile_rejection() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "update-bor"))
        .respond_with(xml(
            "<update-bor><error>Succeeded to REWRITE table z303.</error>\
             <error>Duplicate key in z308</error></update-bor>",
        ))
        .mount(&server)
        .await;

    let err = driver(&server)
        .update_profile("ID0042", &ProfileUpdate::default().with_barcode("B0042"))
        .await
        .unwrap_err();
    match err {
        IlsError::Rejected { message, .. } => assert_eq!(message, "Duplicate key in z308"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_update_profile_empty_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(xml("<update-bor/>"))
        .expect(0)
        .mount(&server)
        .await;

    driver(&server)
        .update_profile("ID0042", &ProfileUpdate::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_find_new_items_caps_and_presents() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "find"))
        .respond_with(xml(
            "<find><set_number>000777</set_number><no_records>000000005</no_records></find>",
        ))
        .mount(&server)
        .await;
    Mock::given(query_param("op", "present"))
        .and(query_param("set_number", "000777"))
        .and(query_param("set_entry", "000000001-000000002"))
        .respond_with(xml(
            "<present><record><doc_number>000000101</doc_number></record>\
             <record><doc_number>000000102</doc_number></record></present>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let ids = driver(&server).find_new_items(14).await.unwrap();
    assert_eq!(ids, vec!["000000101", "000000102"]);
}

#[tokio::test]
async fn test_find_new_items_empty_set() {
    let server = MockServer::start().await;
    Mock::given(query_param("op", "find"))
        .respond_with(xml("<find><error>empty set</error></find>"))
        .mount(&server)
        .await;

    assert!(driver(&server).find_new_items(14).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_patron_unsupported() {
    let server = MockServer::start().await;
    let err = driver(&server)
        .create_patron(&libris_ils::PatronProfile::new(""), "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, IlsError::Unsupported { dialect: "xserver", .. }));
}
