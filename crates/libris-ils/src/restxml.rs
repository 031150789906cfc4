//! Dialect B: REST/XML ILS.
//!
//! Resource-oriented endpoints under a base URL, API key in the `apikey`
//! query parameter, XML bodies. A 2xx answer with a body only counts as
//! success when its `reply-code` (if present) is `0000`.

use crate::dates::parse_optional_date;
use crate::driver::{auth_failure, IlsDriver, REPLY_ERROR_STATUS};
use crate::error::{IlsError, IlsResult};
use crate::holding::{AvailabilityRules, Holding, RawItem};
use crate::profile::{Address, PatronProfile, ProfileUpdate};
use crate::transport::{join_path, IlsResponse, IlsTransport};
use crate::xml::{escape, text_element, XmlElement};
use async_trait::async_trait;
use libris_core::{AuthError, ConfigError, ConfigSection};
use reqwest::Method;
use tracing::{debug, instrument, warn};
use url::Url;

const DIALECT: &str = "restxml";

/// Reply code meaning success.
pub const REPLY_OK: &str = "0000";

/// Header carrying the patron password for `op=auth`.
pub const PASSWORD_HEADER: &str = "Exl-User-Pw";

const BARCODE_ID_TYPE: &str = "BARCODE";

/// Dialect B configuration.
#[derive(Debug, Clone)]
pub struct RestXmlConfig {
    /// API root, e.g. `https://ils.example.org/api/v1`.
    pub base_url: Url,
    pub api_key: String,
    pub rules: AvailabilityRules,
}

impl RestXmlConfig {
    /// Read `url`, `api_key` and the availability lists from a section.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let raw_url = section.require("url")?;
        let base_url = Url::parse(raw_url).map_err(|e| ConfigError::InvalidValue {
            section: section.name().to_string(),
            key: "url".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            api_key: section.require("api_key")?.to_string(),
            rules: AvailabilityRules::from_section(section)?,
        })
    }
}

/// REST/XML driver.
#[derive(Debug, Clone)]
pub struct RestXmlDriver {
    config: RestXmlConfig,
    transport: IlsTransport,
}

impl RestXmlDriver {
    #[must_use]
    pub fn new(config: RestXmlConfig, transport: IlsTransport) -> Self {
        Self { config, transport }
    }

    fn url(&self, segments: &[&str], params: &[(&str, &str)]) -> IlsResult<Url> {
        let mut url = join_path(&self.config.base_url, segments)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("apikey", &self.config.api_key);
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        params: &[(&str, &str)],
        body: Option<String>,
    ) -> IlsResult<Option<XmlElement>> {
        let url = self.url(segments, params)?;
        let response = self.transport.send(method, url, body, &[]).await?;
        check_reply(response)
    }
}

/// Enforce the success rules on an answer and hand back its document.
fn check_reply(response: IlsResponse) -> IlsResult<Option<XmlElement>> {
    if !response.is_success() {
        let message = response
            .document
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(IlsError::Rejected {
            status: response.status,
            message,
        });
    }
    if let Some(doc) = &response.document {
        if let Some(code) = doc.child_text("reply-code") {
            if code != REPLY_OK {
                return Err(IlsError::Rejected {
                    status: REPLY_ERROR_STATUS,
                    message: error_message(doc).unwrap_or_else(|| format!("reply-code {code}")),
                });
            }
        }
    }
    Ok(response.document)
}

fn error_message(doc: &XmlElement) -> Option<String> {
    doc.child_text("reply-text")
        .or_else(|| doc.path_text("errorList/error/errorMessage"))
        .map(String::from)
}

#[async_trait]
impl IlsDriver for RestXmlDriver {
    fn dialect(&self) -> &'static str {
        DIALECT
    }

    #[instrument(skip(self, secret), fields(dialect = DIALECT))]
    async fn authenticate_patron(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<PatronProfile, AuthError> {
        let username = username.trim();
        if username.is_empty() || secret.trim().is_empty() {
            return Err(AuthError::Blank);
        }

        let url = self
            .url(&["users", username], &[("op", "auth")])
            .map_err(auth_failure)?;
        let response = self
            .transport
            .send(Method::POST, url, None, &[(PASSWORD_HEADER, secret)])
            .await
            .map_err(auth_failure)?;

        match response.status {
            200..=299 => {
                let code = response
                    .document
                    .as_ref()
                    .and_then(|doc| doc.child_text("reply-code"));
                if code.is_some_and(|c| c != REPLY_OK) {
                    debug!(reply_code = ?code, "Authentication refused by reply code");
                    return Err(AuthError::InvalidCredentials);
                }
            }
            400 | 401 | 403 | 404 => {
                debug!(status = response.status, "Authentication refused");
                return Err(AuthError::InvalidCredentials);
            }
            other => {
                warn!(status = other, "Unexpected authentication answer");
                return Err(AuthError::TransportFailure(format!(
                    "unexpected HTTP {other} from authentication"
                )));
            }
        }

        self.fetch_profile(username).await.map_err(|e| {
            warn!(error = %e, "Profile lookup after authentication failed");
            AuthError::TransportFailure(e.to_string())
        })
    }

    #[instrument(skip(self), fields(dialect = DIALECT))]
    async fn fetch_profile(&self, external_id: &str) -> IlsResult<PatronProfile> {
        let doc = self
            .request(Method::GET, &["users", external_id], &[("view", "full")], None)
            .await?
            .ok_or_else(|| IlsError::MalformedResponse("user reply with empty body".into()))?;
        decode_user(&doc)
    }

    #[instrument(skip(self, patron), fields(dialect = DIALECT))]
    async fn fetch_holdings(
        &self,
        record_id: &str,
        patron: Option<&PatronProfile>,
    ) -> IlsResult<Vec<Holding>> {
        let params: Vec<(&str, &str)> = patron
            .map(|p| ("user_id", p.id.as_str()))
            .into_iter()
            .collect();
        let Some(doc) = self
            .request(Method::GET, &["bibs", record_id, "holdings"], &params, None)
            .await?
        else {
            return Ok(Vec::new());
        };

        let holdings = doc
            .children_named("item")
            .map(|item| decode_item(item).map(|raw| self.config.rules.resolve(raw)))
            .collect::<IlsResult<Vec<_>>>()?;
        debug!(count = holdings.len(), "holdings decoded");
        Ok(holdings)
    }

    #[instrument(skip(self, update), fields(dialect = DIALECT))]
    async fn update_profile(&self, external_id: &str, update: &ProfileUpdate) -> IlsResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let body = build_update_xml(external_id, update);
        self.request(Method::PUT, &["users", external_id], &[], Some(body))
            .await
            .inspect_err(|e| warn!(error = %e, "Profile write-back failed"))?;
        debug!("Profile write-back succeeded");
        Ok(())
    }

    #[instrument(skip(self), fields(dialect = DIALECT))]
    async fn find_new_items(&self, days_old: u32) -> IlsResult<Vec<String>> {
        let days = days_old.to_string();
        let Some(doc) = self
            .request(Method::GET, &["bibs", "new"], &[("days", days.as_str())], None)
            .await?
        else {
            return Ok(Vec::new());
        };
        Ok(doc
            .children_named("bib")
            .filter_map(|bib| bib.child_text("mms_id"))
            .map(String::from)
            .collect())
    }

    #[instrument(skip(self, profile, secret), fields(dialect = DIALECT))]
    async fn create_patron(&self, profile: &PatronProfile, secret: &str) -> IlsResult<String> {
        let body = build_create_xml(profile, secret);
        let doc = self
            .request(Method::POST, &["users"], &[], Some(body))
            .await?
            .ok_or_else(|| IlsError::MalformedResponse("create reply with empty body".into()))?;
        let user = decode_user(&doc)?;
        debug!(external_id = %user.id, "Patron created in ILS");
        Ok(user.id)
    }
}

fn decode_user(doc: &XmlElement) -> IlsResult<PatronProfile> {
    let user = if doc.name == "user" {
        doc
    } else {
        doc.child("user")
            .ok_or_else(|| IlsError::MalformedResponse(format!("<{}> is not a user", doc.name)))?
    };
    let id = user
        .child_text("primary_id")
        .ok_or_else(|| IlsError::MalformedResponse("user without primary_id".into()))?;

    let mut profile = PatronProfile::new(id);
    profile.first_name = user.child_text("first_name").map(String::from);
    profile.last_name = user.child_text("last_name").map(String::from);
    profile.group = user.child_text("user_group").map(String::from);
    profile.expiry_date = parse_optional_date(user.child_text("expiry_date"))?;
    profile.loan_history_opt_in = user
        .child_text("loan_history_opt_in")
        .map(|v| v.eq_ignore_ascii_case("true"));

    if let Some(contact) = user.child("contact_info") {
        if let Some(addresses) = contact.child("addresses") {
            for address in addresses.children_named("address") {
                profile.addresses.push(Address {
                    lines: (1..=5)
                        .filter_map(|n| address.child_text(&format!("line{n}")))
                        .map(String::from)
                        .collect(),
                    city: address.child_text("city").map(String::from),
                    postal_code: address.child_text("postal_code").map(String::from),
                    country: address.child_text("country").map(String::from),
                    preferred: is_preferred(address),
                });
            }
            profile.addresses.sort_by_key(|a| !a.preferred);
        }
        if let Some(emails) = contact.child("emails") {
            profile.emails = preferred_first(emails.children_named("email"), "email_address");
        }
        if let Some(phones) = contact.child("phones") {
            profile.phones = preferred_first(phones.children_named("phone"), "phone_number");
        }
    }

    if let Some(identifiers) = user.child("user_identifiers") {
        for identifier in identifiers.children_named("user_identifier") {
            let (Some(id_type), Some(value)) =
                (identifier.child_text("id_type"), identifier.child_text("value"))
            else {
                continue;
            };
            if id_type.eq_ignore_ascii_case(BARCODE_ID_TYPE) && profile.barcode.is_none() {
                profile.barcode = Some(value.to_string());
            } else {
                profile.extra.insert(
                    format!("identifier.{}", id_type.to_lowercase()),
                    value.to_string(),
                );
            }
        }
    }

    if let Some(blocks) = user.child("user_blocks") {
        for block in blocks.children_named("user_block") {
            let active = block
                .child_text("block_status")
                .map_or(true, |s| s.eq_ignore_ascii_case("ACTIVE"));
            if !active {
                continue;
            }
            if let Some(reason) = block
                .child_text("block_description")
                .or_else(|| block.child_text("block_type"))
            {
                profile.blocks.push(reason.to_string());
            }
        }
    }

    for key in ["preferred_language", "job_category", "account_type", "status"] {
        if let Some(value) = user.child_text(key) {
            profile.extra.insert(key.to_string(), value.to_string());
        }
    }

    Ok(profile)
}

fn is_preferred(element: &XmlElement) -> bool {
    element
        .attr("preferred")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn preferred_first<'a>(
    entries: impl Iterator<Item = &'a XmlElement>,
    value_name: &str,
) -> Vec<String> {
    let mut values: Vec<(bool, String)> = entries
        .filter_map(|e| e.child_text(value_name).map(|v| (is_preferred(e), v.to_string())))
        .collect();
    values.sort_by_key(|(preferred, _)| !preferred);
    values.into_iter().map(|(_, v)| v).collect()
}

fn decode_item(item: &XmlElement) -> IlsResult<RawItem> {
    let location = item.child("location");
    let location_name = location.and_then(XmlElement::text).map(String::from);
    Ok(RawItem {
        location_code: location
            .and_then(|l| l.attr("code"))
            .or(location_name.as_deref())
            .unwrap_or_default()
            .to_string(),
        location_name,
        call_number: item.child_text("call_number").map(String::from),
        collection_code: item.child_text("collection").map(String::from),
        status: item.child_text("base_status").unwrap_or_default().to_string(),
        item_status: item.child_text("policy").map(String::from),
        due_date: parse_optional_date(item.child_text("due_date"))?,
        barcode: item.child_text("barcode").map(String::from),
        request_allowed: item
            .child_text("requestable")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        notes: item
            .children_named("public_note")
            .filter_map(XmlElement::text)
            .map(String::from)
            .collect(),
        summary: item.child_text("summary").map(String::from),
    })
}

fn identifiers_xml(barcode: &str) -> String {
    format!(
        "<user_identifiers><user_identifier>{}{}</user_identifier></user_identifiers>",
        text_element("id_type", BARCODE_ID_TYPE),
        text_element("value", barcode)
    )
}

fn build_update_xml(external_id: &str, update: &ProfileUpdate) -> String {
    let mut xml = String::from("<user>");
    xml.push_str(&text_element("primary_id", external_id));
    if let Some(barcode) = &update.barcode {
        xml.push_str(&identifiers_xml(barcode));
    }
    if update.email.is_some() || update.phone.is_some() {
        xml.push_str("<contact_info>");
        if let Some(email) = &update.email {
            xml.push_str(&format!(
                "<emails><email preferred=\"true\">{}</email></emails>",
                text_element("email_address", email)
            ));
        }
        if let Some(phone) = &update.phone {
            xml.push_str(&format!(
                "<phones><phone preferred=\"true\">{}</phone></phones>",
                text_element("phone_number", phone)
            ));
        }
        xml.push_str("</contact_info>");
    }
    if let Some(password) = &update.password {
        xml.push_str(&text_element("password", password));
    }
    xml.push_str("</user>");
    xml
}

fn build_create_xml(profile: &PatronProfile, secret: &str) -> String {
    let mut xml = String::from("<user>");
    if !profile.id.is_empty() {
        xml.push_str(&text_element("primary_id", &profile.id));
    }
    for (name, value) in [
        ("first_name", profile.first_name.as_deref()),
        ("last_name", profile.last_name.as_deref()),
        ("user_group", profile.group.as_deref()),
    ] {
        if let Some(value) = value {
            xml.push_str(&text_element(name, value));
        }
    }
    if let Some(expiry) = profile.expiry_date {
        xml.push_str(&text_element("expiry_date", &format!("{}Z", expiry.format("%Y-%m-%d"))));
    }
    if let Some(barcode) = &profile.barcode {
        xml.push_str(&identifiers_xml(barcode));
    }
    xml.push_str("<contact_info><emails>");
    for (i, email) in profile.emails.iter().enumerate() {
        xml.push_str(&format!(
            "<email preferred=\"{}\">{}</email>",
            i == 0,
            text_element("email_address", email)
        ));
    }
    xml.push_str("</emails><phones>");
    for (i, phone) in profile.phones.iter().enumerate() {
        xml.push_str(&format!(
            "<phone preferred=\"{}\">{}</phone>",
            i == 0,
            text_element("phone_number", phone)
        ));
    }
    xml.push_str("</phones></contact_info>");
    xml.push_str(&format!("<password>{}</password>", escape(secret)));
    xml.push_str("</user>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const USER: &str = r#"<user>
        <primary_id>6100</primary_id>
        <first_name>Jane</first_name>
        <last_name>Doe</last_name>
        <user_group desc="Undergraduate">UGRAD</user_group>
        <expiry_date>2026-12-31Z</expiry_date>
        <preferred_language>en</preferred_language>
        <contact_info>
            <addresses>
                <address preferred="false"><line1>PO Box 7</line1><city>Springfield</city></address>
                <address preferred="true"><line1>1 Main St</line1><line2>Apt 2</line2><postal_code>12345</postal_code><country>US</country></address>
            </addresses>
            <emails>
                <email preferred="false"><email_address>old@example.org</email_address></email>
                <email preferred="true"><email_address>jane@example.org</email_address></email>
            </emails>
            <phones><phone preferred="true"><phone_number>555-0100</phone_number></phone></phones>
        </contact_info>
        <user_identifiers>
            <user_identifier><id_type>BARCODE</id_type><value>B6100</value></user_identifier>
            <user_identifier><id_type>UNIV_ID</id_type><value>U-77</value></user_identifier>
        </user_identifiers>
        <user_blocks>
            <user_block><block_type>FINE</block_type><block_description>Unpaid fines</block_description><block_status>ACTIVE</block_status></user_block>
            <user_block><block_description>Old block</block_description><block_status>INACTIVE</block_status></user_block>
        </user_blocks>
    </user>"#;

    #[test]
    fn test_decode_user() {
        let doc = XmlElement::parse(USER).unwrap();
        let profile = decode_user(&doc).unwrap();

        assert_eq!(profile.id, "6100");
        assert_eq!(profile.display_name(), "Jane Doe");
        assert_eq!(profile.group.as_deref(), Some("UGRAD"));
        assert_eq!(profile.expiry_date, NaiveDate::from_ymd_opt(2026, 12, 31));
        assert_eq!(profile.barcode.as_deref(), Some("B6100"));
        assert_eq!(profile.emails, vec!["jane@example.org", "old@example.org"]);
        assert_eq!(profile.phones, vec!["555-0100"]);
        assert_eq!(profile.addresses.len(), 2);
        assert!(profile.addresses[0].preferred);
        assert_eq!(profile.addresses[0].lines, vec!["1 Main St", "Apt 2"]);
        assert_eq!(profile.addresses[1].city.as_deref(), Some("Springfield"));
        assert_eq!(profile.blocks, vec!["Unpaid fines"]);
        assert_eq!(profile.extra.get("identifier.univ_id").map(String::as_str), Some("U-77"));
        assert_eq!(profile.extra.get("preferred_language").map(String::as_str), Some("en"));
    }

    #[test]
    fn test_check_reply_codes() {
        let ok = IlsResponse {
            status: 200,
            raw: String::new(),
            document: Some(XmlElement::parse("<r><reply-code>0000</reply-code></r>").unwrap()),
        };
        assert!(check_reply(ok).unwrap().is_some());

        let refused = IlsResponse {
            status: 200,
            raw: String::new(),
            document: Some(
                XmlElement::parse("<r><reply-code>0012</reply-code><reply-text>No such user</reply-text></r>")
                    .unwrap(),
            ),
        };
        match check_reply(refused) {
            Err(IlsError::Rejected { status, message }) => {
                assert_eq!(status, REPLY_ERROR_STATUS);
                assert_eq!(message, "No such user");
            }
            other => panic!("unexpected {other:?}"),
        }

        let conflict = IlsResponse {
            status: 409,
            raw: String::new(),
            document: None,
        };
        assert_eq!(check_reply(conflict).unwrap_err().upstream_status(), Some(409));

        let empty = IlsResponse {
            status: 204,
            raw: String::new(),
            document: None,
        };
        assert!(check_reply(empty).unwrap().is_none());
    }

    #[test]
    fn test_update_xml_only_carries_changed_fields() {
        let xml = build_update_xml("6100", &ProfileUpdate::default().with_barcode("B1"));
        let doc = XmlElement::parse(&xml).unwrap();
        assert_eq!(doc.child_text("primary_id"), Some("6100"));
        assert_eq!(
            doc.path_text("user_identifiers/user_identifier/value"),
            Some("B1")
        );
        assert!(doc.child("contact_info").is_none());
        assert!(doc.child("password").is_none());
    }

    #[test]
    fn test_create_xml_is_well_formed() {
        let mut profile = PatronProfile::new("");
        profile.first_name = Some("Ann & Co".into());
        profile.emails = vec!["a@example.org".into()];
        profile.expiry_date = NaiveDate::from_ymd_opt(2027, 1, 1);
        let xml = build_create_xml(&profile, "p<w");
        let doc = XmlElement::parse(&xml).unwrap();
        assert!(doc.child("primary_id").is_none());
        assert_eq!(doc.child_text("first_name"), Some("Ann & Co"));
        assert_eq!(doc.child_text("password"), Some("p<w"));
        assert_eq!(doc.child_text("expiry_date"), Some("2027-01-01Z"));
    }
}
