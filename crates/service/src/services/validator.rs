//! Request validation for address writes and list queries.
//!
//! Request bodies deserialize into [`AddressRequest`] (every field a string,
//! every field optional). [`AddressRequest::validate`] sanitizes the free-text
//! fields, checks each field against its rules and collects every failure
//! before returning, so the caller sees all problems at once.

use std::sync::LazyLock;

use address_book_core::{
    AddressFilter, AddressId, AddressKind, CountryId, DefaultRole, RegionId, sanitize,
};
use regex::Regex;
use serde::Deserialize;

use super::error::{AddressError, FieldError};

/// Page size used when none (or too large a one) is requested.
pub const DEFAULT_LIMIT: usize = 10;
/// Largest page size honoured as requested.
pub const MAX_LIMIT: usize = 50;

const PHONE_LENGTH: usize = 13;
const POSTCODE_LENGTH: usize = 6;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d+$").expect("Invalid regex"));

/// Body of `POST /address` and `PUT /address/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressRequest {
    #[serde(alias = "firstname")]
    pub first_name: Option<String>,
    #[serde(alias = "lastname")]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub address_region: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub sms_opt: Option<String>,
    pub is_office: Option<String>,
}

/// A request that passed validation.
///
/// Optional fields are `None` when the request left them out or empty; an
/// update keeps the stored value for those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress {
    pub first_name: String,
    pub last_name: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub region_id: RegionId,
    pub country_id: Option<CountryId>,
    pub postcode: String,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub sms_opt: Option<bool>,
    pub address_type: Option<AddressKind>,
}

impl ValidatedAddress {
    /// Free text scored by the quality heuristic.
    #[must_use]
    pub fn scored_text(&self) -> String {
        match &self.address2 {
            Some(line) => format!("{} {line}", self.address1),
            None => self.address1.clone(),
        }
    }
}

/// Collects field errors while checking values.
#[derive(Debug, Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn required(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        if value.is_none() {
            self.fail(field, "is required");
        }
        value
    }

    fn phone(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        let value = value?;
        if !PHONE_RE.is_match(value) {
            self.fail(field, "must be of the form +digits");
            return None;
        }
        if value.len() != PHONE_LENGTH {
            self.fail(field, "length should be 10 digits excluding country code");
            return None;
        }
        Some(value.to_owned())
    }

    fn postcode(&mut self, value: Option<&str>) -> Option<String> {
        let value = value?;
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            self.fail("postcode", "must be a number");
            return None;
        }
        if value.len() != POSTCODE_LENGTH {
            self.fail("postcode", "must be 6 digits");
            return None;
        }
        Some(value.to_owned())
    }

    fn integral(&mut self, field: &'static str, value: Option<&str>) -> Option<i32> {
        let value = value?;
        match value.parse::<i32>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.fail(field, "must be an integer");
                None
            }
        }
    }

    fn flag(&mut self, field: &'static str, value: Option<&str>) -> Option<bool> {
        match value? {
            "0" => Some(false),
            "1" => Some(true),
            _ => {
                self.fail(field, "should be 0 or 1");
                None
            }
        }
    }
}

/// Trimmed value, `None` when absent or blank.
fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn cleaned(value: Option<&String>, clean: fn(&str) -> String) -> Option<String> {
    present(value).map(clean).filter(|v| !v.is_empty())
}

impl AddressRequest {
    /// Sanitize and check every field.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` listing every failing field.
    pub fn validate(&self) -> Result<ValidatedAddress, AddressError> {
        let mut check = Checker::default();

        let first_name = check.required(
            "first_name",
            cleaned(self.first_name.as_ref(), sanitize::name),
        );
        let last_name = cleaned(self.last_name.as_ref(), sanitize::name);
        let address1 = check.required("address1", cleaned(self.address1.as_ref(), sanitize::text));
        let address2 = cleaned(self.address2.as_ref(), sanitize::text);
        let city = check.required("city", cleaned(self.city.as_ref(), sanitize::text));

        let postcode_raw = present(self.postcode.as_ref());
        if postcode_raw.is_none() {
            check.fail("postcode", "is required");
        }
        let postcode = check.postcode(postcode_raw);

        let region_raw = present(self.address_region.as_ref());
        if region_raw.is_none() {
            check.fail("address_region", "is required");
        }
        let region = check.integral("address_region", region_raw);
        let country = check.integral("country", present(self.country.as_ref()));

        let phone = check.phone("phone", present(self.phone.as_ref()));
        let alt_phone = check.phone("alt_phone", present(self.alt_phone.as_ref()));
        let sms_opt = check.flag("sms_opt", present(self.sms_opt.as_ref()));
        let is_office = check.flag("is_office", present(self.is_office.as_ref()));

        match (first_name, address1, city, postcode, region) {
            (Some(first_name), Some(address1), Some(city), Some(postcode), Some(region))
                if check.errors.is_empty() =>
            {
                Ok(ValidatedAddress {
                    first_name,
                    last_name,
                    address1,
                    address2,
                    city,
                    region_id: RegionId::new(region),
                    country_id: country.map(CountryId::new),
                    postcode,
                    phone,
                    alt_phone,
                    sms_opt,
                    address_type: is_office.map(|office| {
                        if office {
                            AddressKind::Office
                        } else {
                            AddressKind::Home
                        }
                    }),
                })
            }
            _ => Err(AddressError::Validation(check.errors)),
        }
    }
}

/// Pagination window of a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Parse `limit` and `offset` query values.
    ///
    /// A `limit` above [`MAX_LIMIT`] falls back to [`DEFAULT_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` for non-numeric or negative values.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Result<Self, AddressError> {
        let mut page = Self::default();

        if let Some(raw) = limit.filter(|v| !v.is_empty()) {
            let limit: usize = raw
                .parse()
                .map_err(|_| AddressError::invalid("limit", "Limit must be a valid number"))?;
            if limit <= MAX_LIMIT {
                page.limit = limit;
            }
        }

        if let Some(raw) = offset.filter(|v| !v.is_empty()) {
            page.offset = raw
                .parse()
                .map_err(|_| AddressError::invalid("offset", "Offset must be a number"))?;
        }

        Ok(page)
    }
}

/// Parse the `{type}` segment of a list path.
///
/// # Errors
///
/// Returns `AddressError::Validation` for anything but the four filters.
pub fn parse_filter(raw: &str) -> Result<AddressFilter, AddressError> {
    raw.parse().map_err(|_| {
        AddressError::invalid(
            "type",
            "Invalid address type. Possible types are billing, shipping, other, all",
        )
    })
}

/// Parse the `{type}` segment of a set-default path.
///
/// # Errors
///
/// Returns `AddressError::Validation` unless the value is a default role.
pub fn parse_role(raw: &str) -> Result<DefaultRole, AddressError> {
    raw.parse().map_err(|_| {
        AddressError::invalid("type", "Address Type can be only be billing or shipping")
    })
}

/// Parse the `{id}` path segment.
///
/// # Errors
///
/// Returns `AddressError::Validation` if the id is not an integer.
pub fn parse_address_id(raw: &str) -> Result<AddressId, AddressError> {
    raw.parse::<i32>()
        .map(AddressId::new)
        .map_err(|_| AddressError::invalid("id", "Id is missing or not a number"))
}

/// Default promotion requested by `?default=1[&default_type=billing]`.
///
/// Without `default_type` the shipping role is requested.
///
/// # Errors
///
/// Returns `AddressError::Validation` for an unknown `default_type`.
pub fn parse_default(
    default: Option<&str>,
    default_type: Option<&str>,
) -> Result<Option<DefaultRole>, AddressError> {
    if default != Some("1") {
        return Ok(None);
    }
    match default_type.filter(|v| !v.is_empty()) {
        None => Ok(Some(DefaultRole::Shipping)),
        Some(raw) => parse_role(raw).map(Some),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> AddressRequest {
        AddressRequest {
            first_name: Some("Zoë".to_owned()),
            last_name: Some("D'Souza".to_owned()),
            phone: Some("+919876543210".to_owned()),
            address1: Some("Flat 4B, Sea View".to_owned()),
            address2: Some("Linking Rd".to_owned()),
            city: Some("Mumbai".to_owned()),
            address_region: Some("12".to_owned()),
            postcode: Some("400050".to_owned()),
            sms_opt: Some("1".to_owned()),
            is_office: Some("0".to_owned()),
            ..AddressRequest::default()
        }
    }

    fn fields(err: AddressError) -> Vec<&'static str> {
        match err {
            AddressError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request() {
        let address = complete().validate().unwrap();
        assert_eq!(address.first_name, "Zoe");
        assert_eq!(address.last_name.as_deref(), Some("D Souza"));
        assert_eq!(address.region_id, RegionId::new(12));
        assert_eq!(address.country_id, None);
        assert_eq!(address.sms_opt, Some(true));
        assert_eq!(address.address_type, Some(AddressKind::Home));
        assert_eq!(address.scored_text(), "Flat 4B, Sea View Linking Rd");
    }

    #[test]
    fn test_accepts_legacy_name_keys() {
        let request: AddressRequest =
            serde_json::from_str(r#"{"firstname":"Asha","lastname":"Rao"}"#).unwrap();
        assert_eq!(request.first_name.as_deref(), Some("Asha"));
        assert_eq!(request.last_name.as_deref(), Some("Rao"));
    }

    #[test]
    fn test_reports_every_missing_field() {
        let err = AddressRequest::default().validate().unwrap_err();
        assert_eq!(
            fields(err),
            vec!["first_name", "address1", "city", "postcode", "address_region"]
        );
    }

    #[test]
    fn test_name_sanitized_to_nothing_is_missing() {
        let request = AddressRequest {
            first_name: Some("@@@".to_owned()),
            ..complete()
        };
        assert_eq!(fields(request.validate().unwrap_err()), vec!["first_name"]);
    }

    #[test]
    fn test_phone_rules() {
        let short = AddressRequest {
            phone: Some("+9198765".to_owned()),
            ..complete()
        };
        assert_eq!(fields(short.validate().unwrap_err()), vec!["phone"]);

        let letters = AddressRequest {
            alt_phone: Some("+91abcdefghij".to_owned()),
            ..complete()
        };
        assert_eq!(fields(letters.validate().unwrap_err()), vec!["alt_phone"]);
    }

    #[test]
    fn test_postcode_and_flags() {
        let request = AddressRequest {
            postcode: Some("4000".to_owned()),
            sms_opt: Some("2".to_owned()),
            is_office: Some("yes".to_owned()),
            country: Some("IN".to_owned()),
            ..complete()
        };
        assert_eq!(
            fields(request.validate().unwrap_err()),
            vec!["postcode", "country", "sms_opt", "is_office"]
        );
    }

    #[test]
    fn test_blank_optional_fields_are_none() {
        let request = AddressRequest {
            last_name: Some("  ".to_owned()),
            address2: Some(String::new()),
            phone: Some(String::new()),
            ..complete()
        };
        let address = request.validate().unwrap();
        assert_eq!(address.last_name, None);
        assert_eq!(address.address2, None);
        assert_eq!(address.phone, None);
        assert_eq!(address.scored_text(), "Flat 4B, Sea View");
    }

    #[test]
    fn test_page_defaults_and_cap() {
        assert_eq!(Page::parse(None, None).unwrap(), Page::default());
        assert_eq!(Page::parse(Some("1000"), None).unwrap().limit, DEFAULT_LIMIT);
        assert_eq!(Page::parse(Some("50"), Some("3")).unwrap(), Page { limit: 50, offset: 3 });
        assert_eq!(Page::parse(Some(""), Some("")).unwrap(), Page::default());
    }

    #[test]
    fn test_page_rejects_garbage() {
        assert_eq!(fields(Page::parse(Some("ten"), None).unwrap_err()), vec!["limit"]);
        assert_eq!(fields(Page::parse(None, Some("-1")).unwrap_err()), vec!["offset"]);
    }

    #[test]
    fn test_path_parsers() {
        assert_eq!(parse_filter("other").unwrap(), AddressFilter::Other);
        assert!(parse_filter("work").is_err());
        assert_eq!(parse_role("billing").unwrap(), DefaultRole::Billing);
        assert!(parse_role("other").is_err());
        assert_eq!(parse_address_id("42").unwrap(), AddressId::new(42));
        assert!(parse_address_id("4x").is_err());
    }

    #[test]
    fn test_parse_default() {
        assert_eq!(parse_default(None, None).unwrap(), None);
        assert_eq!(parse_default(Some("0"), Some("billing")).unwrap(), None);
        assert_eq!(
            parse_default(Some("1"), None).unwrap(),
            Some(DefaultRole::Shipping)
        );
        assert_eq!(
            parse_default(Some("1"), Some("billing")).unwrap(),
            Some(DefaultRole::Billing)
        );
        assert!(parse_default(Some("1"), Some("other")).is_err());
    }
}
