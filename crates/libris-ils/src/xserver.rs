//! Dialect A: X-Server style ILS.
//!
//! Every call is `GET {base}?op=<op>&...` and answers with an XML document
//! named after the operation. Failure is signalled by a top-level `<error>`
//! element, whatever the HTTP status. `update-bor` reports success in that
//! same element ("Succeeded to REWRITE table ..."), so its errors are
//! filtered by prefix.

use crate::dates::parse_optional_date;
use crate::driver::{auth_failure, IlsDriver, REPLY_ERROR_STATUS};
use crate::error::{IlsError, IlsResult};
use crate::holding::{AvailabilityRules, Holding, RawItem};
use crate::profile::{Address, PatronProfile, ProfileUpdate};
use crate::transport::IlsTransport;
use crate::xml::{text_element, XmlElement};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use libris_core::{AuthError, ConfigError, ConfigSection};
use reqwest::Method;
use tracing::{debug, instrument, warn};
use url::Url;

const DIALECT: &str = "xserver";

/// Reply text of `find` when nothing matched.
const EMPTY_SET: &str = "empty set";

/// Prefix of informational messages in `update-bor` replies.
const UPDATE_SUCCEEDED: &str = "Succeeded";

/// Dialect A configuration.
#[derive(Debug, Clone)]
pub struct XServerConfig {
    /// X-Server endpoint, e.g. `https://ils.example.org/X`.
    pub base_url: Url,
    /// Administrative library holding patron records.
    pub patron_library: String,
    /// Bibliographic base for item and search operations.
    pub bib_library: String,
    /// Upper bound on records returned by `find_new_items`.
    pub max_new_items: u32,
    pub rules: AvailabilityRules,
}

impl XServerConfig {
    /// Read `url`, `patron_library`, `bib_library`, `max_new_items` and the
    /// availability lists from a section.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let raw_url = section.require("url")?;
        let base_url = Url::parse(raw_url).map_err(|e| ConfigError::InvalidValue {
            section: section.name().to_string(),
            key: "url".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            patron_library: section.get_or("patron_library", "USR00").to_string(),
            bib_library: section.get_or("bib_library", "BIB01").to_string(),
            max_new_items: section.get_parsed("max_new_items", 100)?,
            rules: AvailabilityRules::from_section(section)?,
        })
    }
}

/// X-Server driver.
#[derive(Debug, Clone)]
pub struct XServerDriver {
    config: XServerConfig,
    transport: IlsTransport,
}

impl XServerDriver {
    #[must_use]
    pub fn new(config: XServerConfig, transport: IlsTransport) -> Self {
        Self { config, transport }
    }

    async fn call(&self, op: &str, params: &[(&str, &str)]) -> IlsResult<XmlElement> {
        let mut url = self.config.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        let response = self.transport.send(Method::GET, url, None, &[]).await?;
        if !response.is_success() {
            return Err(IlsError::Rejected {
                status: response.status,
                message: format!("{op} answered HTTP {}", response.status),
            });
        }
        response.document.ok_or_else(|| {
            IlsError::MalformedResponse(format!("{op} answered with an empty body"))
        })
    }

    /// Call an operation and turn a top-level `<error>` into a rejection.
    async fn call_checked(&self, op: &str, params: &[(&str, &str)]) -> IlsResult<XmlElement> {
        let doc = self.call(op, params).await?;
        if let Some(message) = doc.child_text("error") {
            return Err(IlsError::Rejected {
                status: REPLY_ERROR_STATUS,
                message: message.to_string(),
            });
        }
        Ok(doc)
    }
}

#[async_trait]
impl IlsDriver for XServerDriver {
    fn dialect(&self) -> &'static str {
        DIALECT
    }

    #[instrument(skip(self, secret), fields(dialect = DIALECT))]
    async fn authenticate_patron(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<PatronProfile, AuthError> {
        if username.trim().is_empty() || secret.trim().is_empty() {
            return Err(AuthError::Blank);
        }

        let doc = self
            .call_checked(
                "bor-auth",
                &[
                    ("library", self.config.patron_library.as_str()),
                    ("bor_id", username.trim()),
                    ("verification", secret),
                ],
            )
            .await
            .map_err(auth_failure)?;

        decode_bor_info(&doc).map_err(|e| {
            warn!(error = %e, "bor-auth reply could not be decoded");
            AuthError::TransportFailure(e.to_string())
        })
    }

    #[instrument(skip(self), fields(dialect = DIALECT))]
    async fn fetch_profile(&self, external_id: &str) -> IlsResult<PatronProfile> {
        let doc = self
            .call_checked(
                "bor-info",
                &[
                    ("library", self.config.patron_library.as_str()),
                    ("bor_id", external_id),
                    ("loans", "N"),
                    ("cash", "N"),
                    ("hold", "N"),
                ],
            )
            .await?;
        decode_bor_info(&doc)
    }

    #[instrument(skip(self, _patron), fields(dialect = DIALECT))]
    async fn fetch_holdings(
        &self,
        record_id: &str,
        _patron: Option<&PatronProfile>,
    ) -> IlsResult<Vec<Holding>> {
        let doc = self
            .call_checked(
                "item-data",
                &[("base", self.config.bib_library.as_str()), ("doc_number", record_id)],
            )
            .await?;

        let holdings = doc
            .children_named("item")
            .map(|item| decode_item(item).map(|raw| self.config.rules.resolve(raw)))
            .collect::<IlsResult<Vec<_>>>()?;
        debug!(count = holdings.len(), "item-data decoded");
        Ok(holdings)
    }

    #[instrument(skip(self, update), fields(dialect = DIALECT))]
    async fn update_profile(&self, external_id: &str, update: &ProfileUpdate) -> IlsResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let request = build_update_request(external_id, update);
        let doc = self
            .call(
                "update-bor",
                &[
                    ("library", self.config.patron_library.as_str()),
                    ("update_flag", "Y"),
                    ("xml_full_req", request.as_str()),
                ],
            )
            .await?;

        let failures: Vec<&str> = doc
            .children_named("error")
            .filter_map(XmlElement::text)
            .filter(|msg| !msg.starts_with(UPDATE_SUCCEEDED))
            .collect();
        if failures.is_empty() {
            debug!("update-bor succeeded");
            Ok(())
        } else {
            warn!(errors = ?failures, "update-bor rejected");
            Err(IlsError::Rejected {
                status: REPLY_ERROR_STATUS,
                message: failures.join("; "),
            })
        }
    }

    #[instrument(skip(self), fields(dialect = DIALECT))]
    async fn find_new_items(&self, days_old: u32) -> IlsResult<Vec<String>> {
        let request = new_items_request(Utc::now().date_naive(), days_old);
        let found = self
            .call(
                "find",
                &[
                    ("base", self.config.bib_library.as_str()),
                    ("request", request.as_str()),
                ],
            )
            .await?;

        if let Some(message) = found.child_text("error") {
            if message.eq_ignore_ascii_case(EMPTY_SET) {
                return Ok(Vec::new());
            }
            return Err(IlsError::Rejected {
                status: REPLY_ERROR_STATUS,
                message: message.to_string(),
            });
        }

        let set_number = found
            .child_text("set_number")
            .ok_or_else(|| IlsError::MalformedResponse("find reply without set_number".into()))?;
        let total: u32 = found
            .child_text("no_records")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| IlsError::MalformedResponse("find reply without no_records".into()))?;
        let count = total.min(self.config.max_new_items);
        if count == 0 {
            return Ok(Vec::new());
        }

        let entries = format!("{:09}-{:09}", 1, count);
        let presented = self
            .call_checked(
                "present",
                &[("set_number", set_number), ("set_entry", entries.as_str())],
            )
            .await?;

        Ok(presented
            .children_named("record")
            .filter_map(|r| r.child_text("doc_number"))
            .map(String::from)
            .collect())
    }
}

/// Decode the patron part of a `bor-auth` or `bor-info` reply.
fn decode_bor_info(doc: &XmlElement) -> IlsResult<PatronProfile> {
    let z303 = doc
        .child("z303")
        .ok_or_else(|| IlsError::MalformedResponse("patron reply without z303".into()))?;
    let id = z303
        .child_text("z303-id")
        .ok_or_else(|| IlsError::MalformedResponse("patron reply without z303-id".into()))?;

    let mut profile = PatronProfile::new(id);

    if let Some(name) = z303.child_text("z303-name") {
        match name.split_once(',') {
            Some((last, first)) => {
                profile.last_name = Some(last.trim().to_string());
                profile.first_name = Some(first.trim().to_string()).filter(|s| !s.is_empty());
            }
            None => profile.last_name = Some(name.to_string()),
        }
    }
    profile.loan_history_opt_in = z303
        .child_text("z303-loan-history")
        .map(|v| v.eq_ignore_ascii_case("Y"));
    if let Some(birth) = z303.child_text("z303-birth-date") {
        profile.extra.insert("birth_date".into(), birth.to_string());
    }
    if let Some(language) = z303.child_text("z303-con-lng") {
        profile.extra.insert("language".into(), language.to_string());
    }

    // Address type 01 is the permanent address and comes first.
    let mut z304s: Vec<&XmlElement> = doc.children_named("z304").collect();
    z304s.sort_by_key(|a| a.child_text("z304-address-type") != Some("01"));
    for z304 in z304s {
        let lines: Vec<String> = (1..=4)
            .filter_map(|n| z304.child_text(&format!("z304-address-{n}")))
            .map(String::from)
            .collect();
        let postal_code = z304.child_text("z304-zip").map(String::from);
        if !lines.is_empty() || postal_code.is_some() {
            profile.addresses.push(Address {
                lines,
                city: None,
                postal_code,
                country: None,
                preferred: z304.child_text("z304-address-type") == Some("01"),
            });
        }
        if let Some(email) = z304.child_text("z304-email-address") {
            push_unique(&mut profile.emails, email);
        }
        for key in ["z304-telephone", "z304-telephone-2"] {
            if let Some(phone) = z304.child_text(key) {
                push_unique(&mut profile.phones, phone);
            }
        }
    }

    if let Some(z305) = doc.child("z305") {
        profile.group = z305.child_text("z305-bor-status").map(String::from);
        profile.expiry_date = parse_optional_date(z305.child_text("z305-expiry-date"))?;
        if let Some(bor_type) = z305.child_text("z305-bor-type") {
            profile.extra.insert("borrower_type".into(), bor_type.to_string());
        }
        collect_blocks(z305, "z305", &mut profile.blocks);
    }
    collect_blocks(z303, "z303", &mut profile.blocks);

    profile.barcode = doc
        .children_named("z308")
        .find(|z308| z308.child_text("z308-key-type") == Some("01"))
        .and_then(|z308| z308.child_text("z308-key-data"))
        .map(String::from);

    Ok(profile)
}

/// Delinquency codes `<prefix>-delinq-1..3`; `00` means no block.
fn collect_blocks(record: &XmlElement, prefix: &str, blocks: &mut Vec<String>) {
    for n in 1..=3 {
        let Some(code) = record.child_text(&format!("{prefix}-delinq-{n}")) else {
            continue;
        };
        if code == "00" {
            continue;
        }
        let reason = record
            .child_text(&format!("{prefix}-delinq-n-{n}"))
            .unwrap_or(code);
        push_unique(blocks, reason);
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn decode_item(item: &XmlElement) -> IlsResult<RawItem> {
    let location_name = item.child_text("sub-library").map(String::from);
    Ok(RawItem {
        location_code: item
            .child_text("z30-sub-library-code")
            .or(location_name.as_deref())
            .unwrap_or_default()
            .to_string(),
        location_name,
        call_number: item.child_text("z30-call-no").map(String::from),
        collection_code: item.child_text("z30-collection").map(String::from),
        status: item.child_text("loan-status").unwrap_or_default().to_string(),
        item_status: item.child_text("z30-item-status").map(String::from),
        due_date: parse_optional_date(item.child_text("due-date"))?,
        barcode: item.child_text("barcode").map(String::from),
        request_allowed: item
            .child_text("hold-allowed")
            .is_some_and(|v| v.eq_ignore_ascii_case("Y")),
        notes: item
            .children_named("z30-note-opac")
            .filter_map(XmlElement::text)
            .map(String::from)
            .collect(),
        summary: item.child_text("z30-description").map(String::from),
    })
}

fn build_update_request(external_id: &str, update: &ProfileUpdate) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><p-file-20><patron-record><z303>");
    xml.push_str(&text_element("match-id-type", "00"));
    xml.push_str(&text_element("match-id", external_id));
    xml.push_str(&text_element("record-action", "X"));
    xml.push_str("</z303>");

    if update.email.is_some() || update.phone.is_some() {
        xml.push_str("<z304>");
        xml.push_str(&text_element("record-action", "U"));
        xml.push_str(&text_element("z304-id", external_id));
        xml.push_str(&text_element("z304-sequence", "01"));
        xml.push_str(&text_element("z304-address-type", "01"));
        if let Some(email) = &update.email {
            xml.push_str(&text_element("z304-email-address", email));
        }
        if let Some(phone) = &update.phone {
            xml.push_str(&text_element("z304-telephone", phone));
        }
        xml.push_str("</z304>");
    }

    if let Some(barcode) = &update.barcode {
        xml.push_str("<z308>");
        xml.push_str(&text_element("record-action", "A"));
        xml.push_str(&text_element("z308-key-type", "01"));
        xml.push_str(&text_element("z308-key-data", barcode));
        xml.push_str(&text_element("z308-id", external_id));
        xml.push_str("</z308>");
    }

    if let Some(password) = &update.password {
        xml.push_str("<z308>");
        xml.push_str(&text_element("record-action", "U"));
        xml.push_str(&text_element("z308-key-type", "00"));
        xml.push_str(&text_element("z308-key-data", external_id));
        xml.push_str(&text_element("z308-verification", password));
        xml.push_str(&text_element("z308-id", external_id));
        xml.push_str("</z308>");
    }

    xml.push_str("</patron-record></p-file-20>");
    xml
}

/// CCL request for records written in the last `days_old` days.
fn new_items_request(today: NaiveDate, days_old: u32) -> String {
    let since = today
        .checked_sub_days(Days::new(u64::from(days_old)))
        .unwrap_or(NaiveDate::MIN);
    format!("WND={}->{}", since.format("%Y%m%d"), today.format("%Y%m%d"))
}
