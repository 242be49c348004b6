// src/pkpass/descriptor.rs

//! Pass descriptor (`pass.json`)
//!
//! A store-card pass built from a [`PassStyle`], which comes from
//! configuration and is shared by every pass, plus the per-pass values in
//! [`PassValues`]. Field order in the serialized JSON follows struct
//! declaration order.

use serde::{Deserialize, Serialize};

/// Archive path of the descriptor entry
pub const DESCRIPTOR_NAME: &str = "pass.json";

pub const FORMAT_VERSION: u32 = 1;
pub const BARCODE_FORMAT_QR: &str = "PKBarcodeFormatQR";
pub const BARCODE_ENCODING: &str = "iso-8859-1";

/// Display name used when a request does not provide one
pub const DEFAULT_HOLDER_NAME: &str = "Customer";

/// Pass-wide presentation and identity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassStyle {
    pub pass_type_identifier: String,
    pub team_identifier: String,
    /// Base URL wallet clients call for updates and registrations
    pub web_service_url: String,
    pub organization_name: String,
    pub description: String,
    pub logo_text: String,
    pub foreground_color: String,
    pub background_color: String,
    pub currency_code: String,
    pub balance_label: String,
    pub holder_label: String,
    pub links_label: String,
    pub links_text: String,
}

impl Default for PassStyle {
    fn default() -> Self {
        Self {
            pass_type_identifier: String::new(),
            team_identifier: String::new(),
            web_service_url: String::new(),
            organization_name: "The Flying Dutchman".to_string(),
            description: "Loyalty Card".to_string(),
            logo_text: "The Flying Dutchman".to_string(),
            foreground_color: "rgb(0,0,0)".to_string(),
            background_color: "rgb(255,182,193)".to_string(),
            currency_code: "EUR".to_string(),
            balance_label: "€ AVAILABLE".to_string(),
            holder_label: "CARD OF".to_string(),
            links_label: "Useful Links".to_string(),
            links_text: "Tap the button on the back for more.".to_string(),
        }
    }
}

/// Per-pass values
#[derive(Debug, Clone, PartialEq)]
pub struct PassValues<'a> {
    pub serial: &'a str,
    pub holder_name: &'a str,
    pub balance: f64,
    pub authentication_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PassDescriptor<'a> {
    format_version: u32,
    pass_type_identifier: &'a str,
    serial_number: &'a str,
    team_identifier: &'a str,
    #[serde(rename = "webServiceURL")]
    web_service_url: &'a str,
    authentication_token: &'a str,
    organization_name: &'a str,
    description: &'a str,
    logo_text: &'a str,
    foreground_color: &'a str,
    background_color: &'a str,
    barcode: Barcode<'a>,
    store_card: StoreCard<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Barcode<'a> {
    message: &'a str,
    format: &'a str,
    message_encoding: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreCard<'a> {
    primary_fields: Vec<Field<'a>>,
    secondary_fields: Vec<Field<'a>>,
    back_fields: Vec<Field<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Field<'a> {
    key: &'a str,
    label: &'a str,
    value: FieldValue<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl PassStyle {
    /// Serialize `pass.json` for one pass
    pub fn render(&self, values: &PassValues<'_>) -> Result<Vec<u8>, serde_json::Error> {
        let descriptor = PassDescriptor {
            format_version: FORMAT_VERSION,
            pass_type_identifier: &self.pass_type_identifier,
            serial_number: values.serial,
            team_identifier: &self.team_identifier,
            web_service_url: &self.web_service_url,
            authentication_token: values.authentication_token,
            organization_name: &self.organization_name,
            description: &self.description,
            logo_text: &self.logo_text,
            foreground_color: &self.foreground_color,
            background_color: &self.background_color,
            barcode: Barcode {
                message: values.serial,
                format: BARCODE_FORMAT_QR,
                message_encoding: BARCODE_ENCODING,
            },
            store_card: StoreCard {
                primary_fields: vec![Field {
                    key: "balance",
                    label: &self.balance_label,
                    value: FieldValue::Number(values.balance),
                    currency_code: Some(&self.currency_code),
                }],
                secondary_fields: vec![Field {
                    key: "name",
                    label: &self.holder_label,
                    value: FieldValue::Text(values.holder_name),
                    currency_code: None,
                }],
                back_fields: vec![Field {
                    key: "links",
                    label: &self.links_label,
                    value: FieldValue::Text(&self.links_text),
                    currency_code: None,
                }],
            },
        };
        serde_json::to_vec(&descriptor)
    }
}
